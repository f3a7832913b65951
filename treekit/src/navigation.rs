//! Back/forward history of tree roots.

use crate::node::NodeRef;

/// Configuration for navigation history.
///
/// # Example
///
/// ```
/// use treekit::NavigationConfig;
///
/// let config = NavigationConfig::default().with_history_limit(50);
/// assert_eq!(config.history_limit, Some(50));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NavigationConfig {
    /// Maximum number of entries kept on the back stack. Oldest entries are
    /// dropped first.
    ///
    /// Default: unlimited
    pub history_limit: Option<usize>,
}

impl NavigationConfig {
    /// Creates a new configuration with unlimited history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of roots kept on the back stack.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }
}

/// Two stacks of previously active roots.
///
/// The history only records references; switching roots is done by the
/// model, which also decides whether a recorded root is still usable.
#[derive(Debug, Clone, Default)]
pub struct NavigationHistory {
    back: Vec<NodeRef>,
    forward: Vec<NodeRef>,
    config: NavigationConfig,
}

impl NavigationHistory {
    /// Creates an empty history.
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            back: Vec::new(),
            forward: Vec::new(),
            config,
        }
    }

    /// Whether a previous root is recorded.
    pub fn can_navigate_backward(&self) -> bool {
        !self.back.is_empty()
    }

    /// Whether a root left by stepping backward is recorded.
    pub fn can_navigate_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Record `current` before navigating somewhere new. Clears the forward
    /// stack.
    pub fn push(&mut self, current: NodeRef) {
        self.forward.clear();
        self.push_back(current);
    }

    /// The root [`step_backward`](Self::step_backward) would return.
    pub fn peek_backward(&self) -> Option<&NodeRef> {
        self.back.last()
    }

    /// The root [`step_forward`](Self::step_forward) would return.
    pub fn peek_forward(&self) -> Option<&NodeRef> {
        self.forward.last()
    }

    /// Pop the back stack, recording `current` on the forward stack.
    pub fn step_backward(&mut self, current: Option<NodeRef>) -> Option<NodeRef> {
        let target = self.back.pop()?;
        self.forward.extend(current);
        Some(target)
    }

    /// Pop the forward stack, recording `current` on the back stack.
    pub fn step_forward(&mut self, current: Option<NodeRef>) -> Option<NodeRef> {
        let target = self.forward.pop()?;
        if let Some(current) = current {
            self.push_back(current);
        }
        Some(target)
    }

    /// Forget all recorded roots.
    pub fn clear(&mut self) {
        self.back.clear();
        self.forward.clear();
    }

    fn push_back(&mut self, node: NodeRef) {
        self.back.push(node);
        if let Some(limit) = self.config.history_limit
            && self.back.len() > limit
        {
            let excess = self.back.len() - limit;
            self.back.drain(..excess);
        }
    }
}
