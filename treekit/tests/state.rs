//! Integration tests for persisted view state.

mod common;

use treekit::{FocusableSelection, SelectionState, SelectionType, TreeError, TreeModelState};

use common::{Fixture, ids, node};

#[tokio::test]
async fn test_restore_reproduces_selection_and_focus() {
    let fixture = Fixture::new();
    let model = fixture.model().await;
    model.expand_node(Some(&node(&model, "src"))).await.unwrap();
    model.select_node(&node(&model, "src/lib.rs"));
    model.select_range(&node(&model, "docs"));
    model.toggle_node(&node(&model, "README.md"));

    let saved = model.store_state().to_json().unwrap();
    let selected = ids(&model.selected_nodes());

    let restored = fixture.model().await;
    restored
        .expand_node(Some(&node(&restored, "src")))
        .await
        .unwrap();
    restored
        .restore_state(TreeModelState::from_json(saved).unwrap())
        .unwrap();

    assert_eq!(ids(&restored.selected_nodes()), selected);
    assert_eq!(
        restored.get_focused_node().unwrap().id().as_str(),
        "README.md"
    );
    assert!(node(&restored, "src/main.rs").is_selected());
}

#[tokio::test]
async fn test_restore_drops_missing_nodes() {
    let fixture = Fixture::new();
    let model = fixture.model().await;
    let state = TreeModelState::new(
        SelectionState::from_stack(vec![
            FocusableSelection::new("docs", SelectionType::Toggle, Some("docs".into())),
            FocusableSelection::new("gone", SelectionType::Toggle, Some("gone".into())),
        ])
        .unwrap(),
    );

    model.restore_state(state).unwrap();

    assert_eq!(ids(&model.selected_nodes()), ["docs"]);
    assert_eq!(model.get_focused_node().unwrap().id().as_str(), "docs");
    assert_eq!(model.store_state().selection.stack().len(), 1);
}

#[tokio::test]
async fn test_restore_rejects_default_entries() {
    let model = Fixture::new().model().await;
    model.select_node(&node(&model, "README.md"));

    let state: TreeModelState = serde_json::from_value(serde_json::json!({
        "version": 1,
        "selection": {
            "selectionStack": [
                { "node": "docs", "type": "DEFAULT" },
                { "node": "src", "type": "TOGGLE" }
            ]
        }
    }))
    .unwrap();
    let err = model.restore_state(state).unwrap_err();

    assert!(matches!(err, TreeError::InvariantViolation(_)));
    assert_eq!(ids(&model.selected_nodes()), ["README.md"]);
}

#[tokio::test]
async fn test_restore_rejects_other_versions() {
    let model = Fixture::new().model().await;
    let mut state = model.store_state();
    state.version = 7;

    let err = model.restore_state(state).unwrap_err();
    assert!(matches!(
        err,
        TreeError::UnsupportedStateVersion { found: 7, .. }
    ));
}

#[tokio::test]
async fn test_empty_state_clears_selection() {
    let model = Fixture::new().model().await;
    let empty = model.store_state();
    model.select_node(&node(&model, "docs"));

    model.restore_state(empty).unwrap();
    assert!(model.selected_nodes().is_empty());
    assert!(model.get_focused_node().is_none());
}
