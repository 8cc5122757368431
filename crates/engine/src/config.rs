pub const DEFAULT_MAX_OWNED_DEPTH: usize = 64;

/// What `duplicate` does with `insert_after` on a type whose owning
/// collection is kept sorted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoSortedPositioning {
    /// Append and report the request as ignored.
    #[default]
    Ignore,
    /// Fail with `PositioningRejected`.
    Reject,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deepest ownership nesting a recursive walk follows before giving up.
    pub max_owned_depth: usize,
    pub auto_sorted_positioning: AutoSortedPositioning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_owned_depth: DEFAULT_MAX_OWNED_DEPTH,
            auto_sorted_positioning: AutoSortedPositioning::default(),
        }
    }
}
