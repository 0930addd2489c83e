//! Child scope configuration.

/// Configuration for creating a child scope.
///
/// The defaults give a single-step child that inherits its parent's status
/// and takes an equal split of the parent's remaining budget.
#[derive(Debug, Clone)]
pub struct ScopeSpec {
    /// Step budget for the child
    pub steps: u32,

    /// Status label; an empty or missing label inherits the parent's
    pub status: Option<String>,

    /// Share of the parent's progress in `[0, 1]`; `0.0` means an equal
    /// split of whatever the parent has left
    pub weight: f64,

    /// Steps granted per item in bulk creation
    pub steps_per_item: u32,
}

impl Default for ScopeSpec {
    fn default() -> Self {
        Self {
            steps: 1,
            status: None,
            weight: 0.0,
            steps_per_item: 1,
        }
    }
}

impl ScopeSpec {
    /// Spec with the given step budget and everything else defaulted.
    pub fn steps(steps: u32) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Set the status label.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the weight share.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the per-item step budget for bulk creation.
    pub fn with_steps_per_item(mut self, steps_per_item: u32) -> Self {
        self.steps_per_item = steps_per_item;
        self
    }
}
