//! Error types for progress tree operations.

/// Result type for progress tree operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised by scope and watcher operations.
///
/// Invalid-argument and invalid-state violations are reported at the
/// offending call; a rejected call leaves the tree unchanged.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Child weight outside the unit interval
    #[error("child weight {0} is outside the [0, 1] range")]
    WeightOutOfRange(f64),

    /// Child weight larger than the share this scope has left
    #[error("child weight exceeds the remaining budget of {remaining}")]
    WeightExceedsBudget {
        /// Share of this scope still unallocated
        remaining: f64,
    },

    /// Bulk child requested with zero steps per item
    #[error("steps per item must be greater than zero")]
    ZeroStepsPerItem,

    /// Operation on a scope that already reached full progress
    #[error("scope is already completed")]
    Completed,

    /// Operation on a disposed scope
    #[error("scope is already disposed")]
    Disposed,

    /// All step slots of this scope are consumed
    #[error("no step slots remaining for a new child")]
    NoStepsRemaining,

    /// A step-counted child has not finished yet
    #[error("previous child scope is still open")]
    ChildStillOpen,

    /// The watcher already tracks a base scope
    #[error("a base scope is already being watched")]
    AlreadyStarted,
}
