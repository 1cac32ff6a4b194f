//! Registry configuration

use crate::history::DEFAULT_HISTORY_CAPACITY;

use super::subscriber::DEFAULT_MAILBOX_CAPACITY;

/// Capacities applied to every stream created by a registry
///
/// Both limits are fixed for the lifetime of the registry. Zero is clamped
/// to one.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Lines retained per stream for replay to late subscribers
    pub history_capacity: usize,

    /// Lines buffered per subscriber before new lines are dropped
    pub mailbox_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-stream history capacity
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.history_capacity, 5000);
        assert_eq!(config.mailbox_capacity, 5000);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .history_capacity(100)
            .mailbox_capacity(10);

        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.mailbox_capacity, 10);
    }

    #[test]
    fn test_builder_zero_clamped() {
        let config = RegistryConfig::default()
            .history_capacity(0)
            .mailbox_capacity(0);

        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.mailbox_capacity, 1);
    }
}
