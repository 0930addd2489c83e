//! Upward propagation contract between a scope and its owner.

/// Capability a node grants the children it creates.
///
/// Interior scopes forward every call toward the root; the watcher
/// terminates the chain and records the observable values.
pub(crate) trait Parent {
    /// A new scope entered the tree somewhere below this node.
    fn child_started(&self);

    /// The active child was disposed; account one step and its weight.
    fn child_disposed(&self);

    /// Weighted progress coming up from the child subtree.
    fn child_progress(&self, progress: f64);

    /// Raw progress of the deepest active node.
    fn tip_progress(&self, progress: f64);

    /// Status of the deepest active node.
    fn tip_status(&self, status: Option<&str>);
}
