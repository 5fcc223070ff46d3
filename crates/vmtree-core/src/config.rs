#![forbid(unsafe_code)]

//! Per-node behaviour switches.

/// Configuration applied to a single [`Node`](crate::Node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Set the dirty flag on changes of non-exempt properties.
    pub track_dirty: bool,
    /// Relay child "changed" events to this node's `Children` property.
    pub forward_child_changes: bool,
    /// Evaluate a property as soon as a rule is registered for it.
    pub validate_on_register: bool,
    /// Joins messages in aggregate error strings.
    pub error_separator: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            track_dirty: true,
            forward_child_changes: true,
            validate_on_register: true,
            error_separator: "\n".to_owned(),
        }
    }
}

impl NodeConfig {
    #[must_use]
    pub fn with_track_dirty(mut self, enabled: bool) -> Self {
        self.track_dirty = enabled;
        self
    }

    #[must_use]
    pub fn with_forward_child_changes(mut self, enabled: bool) -> Self {
        self.forward_child_changes = enabled;
        self
    }

    #[must_use]
    pub fn with_validate_on_register(mut self, enabled: bool) -> Self {
        self.validate_on_register = enabled;
        self
    }

    #[must_use]
    pub fn with_error_separator(mut self, separator: impl Into<String>) -> Self {
        self.error_separator = separator.into();
        self
    }
}
