//! Configuration of a [`GlobalObject`](super::GlobalObject) context

/// Configuration for the registry and its undo stack
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Whether setters are recorded on the undo stack
    pub undo_enabled: bool,

    /// Log tolerated failures, such as tearing down a constraint whose
    /// dependent was already removed
    pub debug: bool,

    /// Maximum number of undo entries; the oldest entry is dropped first
    pub max_history: Option<usize>,

    /// Maximum nesting of constraint cascades before a write fails
    pub max_cascade_depth: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            undo_enabled: false,
            debug: false,
            max_history: None,
            max_cascade_depth: 128,
        }
    }
}

impl GlobalConfig {
    /// Default configuration with the undo stack switched on
    pub fn with_undo() -> Self {
        Self {
            undo_enabled: true,
            ..Self::default()
        }
    }
}
