//! Tree configuration

use std::time::Duration;

/// Configuration for refresh behavior.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use treekit::TreeConfig;
///
/// let config = TreeConfig::default()
///     .with_refresh_busy_delay(Duration::from_millis(250))
///     .with_refresh_expanded_children(false);
/// ```
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// How long a refresh may run before its composite is marked busy.
    ///
    /// Default: 800 ms
    pub refresh_busy_delay: Duration,

    /// Refresh already-expanded composite children whenever their parent
    /// is refreshed. The parent refresh completes only after they do.
    ///
    /// Default: true
    pub refresh_expanded_children: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            refresh_busy_delay: Duration::from_millis(800),
            refresh_expanded_children: true,
        }
    }
}

impl TreeConfig {
    /// Creates a new tree config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the busy delay applied to refreshes.
    pub fn with_refresh_busy_delay(mut self, delay: Duration) -> Self {
        self.refresh_busy_delay = delay;
        self
    }

    /// Enables or disables refreshing expanded children.
    pub fn with_refresh_expanded_children(mut self, enabled: bool) -> Self {
        self.refresh_expanded_children = enabled;
        self
    }
}
