//! Integration tests for busy markers.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use treekit::{CancellationToken, Subscription, Tree, TreeConfig};

use common::{Fixture, root};

async fn tree(fixture: &Fixture, config: TreeConfig) -> Tree {
    let tree = fixture.tree_with(config);
    tree.set_root(Some(root())).await.unwrap();
    tree
}

fn record(tree: &Tree) -> (Arc<Mutex<Vec<(String, u32)>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscription = {
        let events = Arc::clone(&events);
        tree.on_did_change_busy().subscribe(move |node| {
            events
                .lock()
                .unwrap()
                .push((node.id().to_string(), node.busy()));
        })
    };
    (events, subscription)
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_delay_never_activates() {
    let fixture = Fixture::new();
    let tree = tree(&fixture, TreeConfig::default()).await;
    let (events, _busy) = record(&tree);
    let src = tree.get_node("src").unwrap();

    let token = CancellationToken::new();
    tree.mark_as_busy(&src, Duration::from_millis(50), token.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(events.lock().unwrap().is_empty());
    assert_eq!(tree.get_node("src").unwrap().busy(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_activation_fires_once_then_cancel_deactivates() {
    let fixture = Fixture::new();
    let tree = tree(&fixture, TreeConfig::default()).await;
    let (events, _busy) = record(&tree);
    let src = tree.get_node("src").unwrap();

    let token = CancellationToken::new();
    tree.mark_as_busy(&src, Duration::from_millis(50), token.clone());
    tokio::time::sleep(Duration::from_millis(49)).await;
    assert_eq!(tree.get_node("src").unwrap().busy(), 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(tree.get_node("src").unwrap().busy(), 1);
    assert_eq!(*events.lock().unwrap(), vec![("src".to_string(), 1)]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(events.lock().unwrap().len(), 1);

    token.cancel();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(tree.get_node("src").unwrap().busy(), 0);
    assert_eq!(
        *events.lock().unwrap(),
        vec![("src".to_string(), 1), ("src".to_string(), 0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_refresh_marks_composite_busy() {
    let fixture = Fixture::new();
    let config = TreeConfig::default().with_refresh_busy_delay(Duration::from_millis(100));
    let tree = tree(&fixture, config).await;
    let (events, _busy) = record(&tree);

    fixture.close_gate();
    let refresh = {
        let tree = tree.clone();
        tokio::spawn(async move { tree.refresh(None).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(tree.root().unwrap().is_busy());

    fixture.release();
    refresh.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(!tree.root().unwrap().is_busy());
    assert_eq!(
        *events.lock().unwrap(),
        vec![("root".to_string(), 1), ("root".to_string(), 0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fast_refresh_never_marks_busy() {
    let fixture = Fixture::new();
    let tree = tree(&fixture, TreeConfig::default()).await;
    let (events, _busy) = record(&tree);

    tree.refresh(None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_marker_on_removed_node_does_nothing() {
    let fixture = Fixture::new();
    let tree = tree(&fixture, TreeConfig::default()).await;
    let (events, _busy) = record(&tree);
    let src = tree.get_node("src").unwrap();

    tree.mark_as_busy(&src, Duration::from_millis(50), CancellationToken::new());
    fixture.set_children("root", Vec::new());
    tree.refresh(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(events.lock().unwrap().is_empty());
}
