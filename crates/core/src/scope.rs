//! Progress scopes and the weighted aggregation tree.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::{Result, WatchError};
use crate::id::ScopeId;
use crate::parent::Parent;
use crate::reporter::{Reporter, REPORTER_STEPS};
use crate::spec::ScopeSpec;

/// A node in the progress tree.
///
/// A scope carries a fixed step budget and delegates a weighted share of
/// its remaining progress to at most one active child at a time. Progress
/// only moves forward: updates that would lower it are discarded and values
/// above 1 clamp to 1. Handles are cheap to clone and deliberately
/// single-threaded; a tree has exactly one writing context.
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) inner: Rc<ScopeInner>,
}

impl Scope {
    /// Identifier of this scope.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Total step budget.
    pub fn all_steps(&self) -> u32 {
        self.inner.all_steps
    }

    /// Steps consumed so far.
    pub fn current_steps(&self) -> u32 {
        self.inner.current_steps()
    }

    /// Own progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.inner.progress()
    }

    /// Current status label.
    pub fn status(&self) -> Option<String> {
        self.inner.status()
    }

    /// True once progress reached 1.
    pub fn is_completed(&self) -> bool {
        self.inner.is_completed()
    }

    /// True once this scope was disposed, explicitly or by teardown.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Consume `steps` slots and recompute progress.
    ///
    /// Settles any previous child first and fails while a step-counted
    /// child is still open. Steps past the budget are dropped.
    pub fn advance(&self, steps: u32) -> Result<()> {
        self.inner.advance(steps)
    }

    /// Replace the status label and surface it as the active tip.
    pub fn set_status(&self, status: impl Into<String>) {
        self.inner.update_status(Some(status.into()));
    }

    /// Clear the status label.
    pub fn clear_status(&self) {
        self.inner.update_status(None);
    }

    /// Force this scope and everything below it to full progress.
    ///
    /// Children are torn down; the scope itself stays attached to its
    /// parent until it is disposed or settled.
    pub fn complete(&self) {
        self.inner.force_complete();
    }

    /// Complete this scope and hand its step slot back to the parent.
    ///
    /// Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Create a step-counted child scope.
    pub fn child(&self, spec: ScopeSpec) -> Result<Scope> {
        let inner = self
            .inner
            .create_child(spec.steps, spec.status, spec.weight, false)?;
        Ok(Scope { inner })
    }

    /// Create a child scope sized to a collection, `steps_per_item` steps
    /// per element.
    pub fn child_for_items<I>(&self, items: I, spec: ScopeSpec) -> Result<Scope>
    where
        I: IntoIterator,
    {
        if spec.steps_per_item == 0 {
            return Err(WatchError::ZeroStepsPerItem);
        }
        let count = items.into_iter().count() as u32;
        let steps = count.saturating_mul(spec.steps_per_item);
        let inner = self.inner.create_child(steps, spec.status, spec.weight, false)?;
        Ok(Scope { inner })
    }

    /// Create a fractional child fed by an external source.
    ///
    /// `spec.steps` is ignored; reporters carry a fixed resolution of
    /// 1000 steps.
    pub fn reporter(&self, spec: ScopeSpec) -> Result<Reporter> {
        let inner = self.inner.create_child(0, spec.status, spec.weight, true)?;
        Ok(Reporter { inner })
    }
}

/// Shared node state behind both [`Scope`] and [`Reporter`] handles.
#[derive(Debug)]
pub(crate) struct ScopeInner {
    id: ScopeId,
    parent: Weak<dyn Parent>,
    all_steps: u32,
    fractional: bool,
    state: RefCell<ScopeState>,
}

#[derive(Debug)]
struct ScopeState {
    current_steps: u32,
    progress: f64,
    status: Option<String>,
    completed: bool,
    disposed: bool,
    child: Option<Rc<ScopeInner>>,
    child_weight: f64,
}

impl ScopeState {
    /// Effective child weight; zero asks for an equal split of what is left.
    fn split_weight(&self, weight: f64, all_steps: u32) -> f64 {
        if weight != 0.0 {
            return weight;
        }
        let slots = all_steps - self.current_steps;
        if slots == 0 {
            1.0 - self.progress
        } else {
            (1.0 - self.progress) / slots as f64
        }
    }
}

impl ScopeInner {
    pub(crate) fn create(
        parent: Weak<dyn Parent>,
        all_steps: u32,
        fractional: bool,
        status: Option<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: ScopeId::new(),
            parent,
            all_steps,
            fractional,
            state: RefCell::new(ScopeState {
                current_steps: 0,
                progress: 0.0,
                status,
                completed: false,
                disposed: false,
                child: None,
                child_weight: 0.0,
            }),
        })
    }

    pub(crate) fn current_steps(&self) -> u32 {
        self.state.borrow().current_steps
    }

    pub(crate) fn progress(&self) -> f64 {
        self.state.borrow().progress
    }

    fn status(&self) -> Option<String> {
        self.state.borrow().status.clone()
    }

    fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Validate against the pre-settle state, settle the previous child,
    /// then wire the new one in.
    fn create_child(
        self: &Rc<Self>,
        steps: u32,
        status: Option<String>,
        weight: f64,
        fractional: bool,
    ) -> Result<Rc<ScopeInner>> {
        {
            let st = self.state.borrow();
            if !(0.0..=1.0).contains(&weight) {
                return Err(WatchError::WeightOutOfRange(weight));
            }
            if st.progress + weight > 1.0 {
                return Err(WatchError::WeightExceedsBudget {
                    remaining: 1.0 - st.progress,
                });
            }
            if st.disposed {
                return Err(WatchError::Disposed);
            }
            if st.completed {
                return Err(WatchError::Completed);
            }
            if st.current_steps >= self.all_steps {
                return Err(WatchError::NoStepsRemaining);
            }
        }

        self.settle_child()?;

        // status fallback and the equal split both see the settled state
        let (status, child_weight) = {
            let st = self.state.borrow();
            let status = match status {
                Some(s) if !s.trim().is_empty() => Some(s),
                _ => st.status.clone(),
            };
            (status, st.split_weight(weight, self.all_steps))
        };

        let all_steps = if fractional { REPORTER_STEPS } else { steps };
        let parent: Weak<dyn Parent> = Rc::<ScopeInner>::downgrade(self);
        let child = ScopeInner::create(parent, all_steps, fractional, status.clone());

        {
            let mut st = self.state.borrow_mut();
            st.child = Some(child.clone());
            st.child_weight = child_weight;
        }

        debug!("Created child scope {} with weight {}", child.id, child_weight);

        self.tip_status(status.as_deref());
        if let Some(parent) = self.parent.upgrade() {
            parent.child_started();
        }

        Ok(child)
    }

    fn advance(&self, steps: u32) -> Result<()> {
        {
            let st = self.state.borrow();
            if st.disposed {
                return Err(WatchError::Disposed);
            }
            if st.completed {
                return Err(WatchError::Completed);
            }
        }

        self.settle_child()?;

        let fraction = {
            let mut st = self.state.borrow_mut();
            st.current_steps = st.current_steps.saturating_add(steps).min(self.all_steps);
            if self.all_steps == 0 {
                None
            } else {
                Some(st.current_steps as f64 / self.all_steps as f64)
            }
        };
        if let Some(fraction) = fraction {
            self.apply_progress(fraction);
        }
        Ok(())
    }

    fn update_status(&self, status: Option<String>) {
        {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            st.status = status.clone();
        }
        self.tip_status(status.as_deref());
    }

    /// Settle the previous child before this scope moves on.
    ///
    /// An open step-counted child blocks; an open reporter is
    /// force-completed and its weight collected.
    fn settle_child(&self) -> Result<()> {
        let child = self.state.borrow().child.clone();
        if let Some(child) = child {
            if !child.is_completed() && !child.fractional {
                return Err(WatchError::ChildStillOpen);
            }
            child.dispose();
        }
        Ok(())
    }

    fn dispose(&self) {
        if self.state.borrow().disposed {
            return;
        }
        self.force_complete();
        self.state.borrow_mut().disposed = true;
        if let Some(parent) = self.parent.upgrade() {
            parent.child_disposed();
        }
        debug!("Disposed scope {}", self.id);
    }

    /// Drive the whole subtree to full progress; descendants end up
    /// disposed, the scope itself stays live for its parent to settle.
    fn force_complete(&self) {
        if self.state.borrow().disposed {
            return;
        }
        let child = self.state.borrow_mut().child.take();
        if let Some(child) = child {
            child.force_complete();
            child.state.borrow_mut().disposed = true;
        }
        self.apply_progress(1.0);
    }

    /// Mark this scope and everything below it disposed without touching
    /// progress or notifying anyone.
    pub(crate) fn mark_disposed_tree(&self) {
        let child = {
            let mut st = self.state.borrow_mut();
            st.disposed = true;
            st.child.take()
        };
        if let Some(child) = child {
            child.mark_disposed_tree();
        }
    }

    /// Map an externally reported fraction onto the step counter, then run
    /// the shared progress path. Reports on a disposed node are dropped.
    pub(crate) fn apply_report(&self, value: f64) {
        {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            if value > 0.0 {
                let mapped = (value * self.all_steps as f64).floor() as u32;
                st.current_steps = mapped.min(self.all_steps).max(st.current_steps);
            }
        }
        self.apply_progress(value);
    }

    /// Shared monotonic update path: clamp to 1, drop anything that does
    /// not move forward, then propagate both the raw tip and the weighted
    /// value.
    fn apply_progress(&self, candidate: f64) {
        let candidate = if candidate > 1.0 { 1.0 } else { candidate };
        let moved = {
            let mut st = self.state.borrow_mut();
            // NaN fails this comparison and is discarded with the rest
            if candidate > st.progress {
                st.progress = candidate;
                st.completed = candidate >= 1.0;
                true
            } else {
                false
            }
        };
        if moved {
            if let Some(parent) = self.parent.upgrade() {
                parent.tip_progress(candidate);
                parent.child_progress(candidate);
            }
        }
    }
}

impl Parent for ScopeInner {
    fn child_started(&self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.child_started();
        }
    }

    fn child_disposed(&self) {
        let (candidate, status) = {
            let mut st = self.state.borrow_mut();
            st.child = None;
            st.current_steps = st.current_steps.saturating_add(1).min(self.all_steps);
            (st.progress + st.child_weight, st.status.clone())
        };
        self.apply_progress(candidate);
        // the parent becomes the active tip again
        self.tip_status(status.as_deref());
    }

    fn child_progress(&self, progress: f64) {
        let combined = {
            let st = self.state.borrow();
            st.progress + progress * st.child_weight
        };
        if let Some(parent) = self.parent.upgrade() {
            parent.child_progress(combined);
        }
    }

    fn tip_progress(&self, progress: f64) {
        if let Some(parent) = self.parent.upgrade() {
            parent.tip_progress(progress);
        }
    }

    fn tip_status(&self, status: Option<&str>) {
        if let Some(parent) = self.parent.upgrade() {
            parent.tip_status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::Watcher;

    #[test]
    fn test_equal_weight_children_aggregate() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "archive").unwrap();

        let child1 = base
            .child(ScopeSpec::steps(2).with_status("volume 1"))
            .unwrap();
        child1.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.25);

        child1.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.5);

        assert!(matches!(child1.advance(1), Err(WatchError::Completed)));
        assert_eq!(watcher.aggregate_progress(), 0.5);

        let child2 = base
            .child(ScopeSpec::steps(2).with_status("volume 2"))
            .unwrap();
        child2.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.75);

        child2.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 1.0);

        assert!(matches!(child2.advance(1), Err(WatchError::Completed)));
        assert_eq!(watcher.aggregate_progress(), 1.0);
    }

    #[test]
    fn test_disposal_advances_parent() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "restore").unwrap();

        let child1 = base.child(ScopeSpec::steps(2)).unwrap();
        child1.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.25);

        child1.dispose();
        assert_eq!(watcher.aggregate_progress(), 0.5);
        assert_eq!(base.current_steps(), 1);

        let child2 = base.child(ScopeSpec::steps(2)).unwrap();
        child2.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.75);

        child2.dispose();
        assert_eq!(watcher.aggregate_progress(), 1.0);
        assert!(base.is_completed());
    }

    #[test]
    fn test_weighted_child_aggregate() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "convert").unwrap();

        let heavy = base.child(ScopeSpec::steps(2).with_weight(0.8)).unwrap();
        heavy.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.4);

        heavy.dispose();
        assert_eq!(watcher.aggregate_progress(), 0.8);

        let light = base.child(ScopeSpec::steps(2)).unwrap();
        light.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.9);

        light.dispose();
        assert_eq!(watcher.aggregate_progress(), 1.0);
    }

    #[test]
    fn test_status_follows_deepest_active() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "deploy").unwrap();
        assert_eq!(watcher.status().as_deref(), Some("deploy"));

        let child1 = base.child(ScopeSpec::steps(2).with_status("build")).unwrap();
        assert_eq!(watcher.status().as_deref(), Some("build"));

        child1.advance(2).unwrap();
        assert_eq!(watcher.status().as_deref(), Some("build"));

        child1.dispose();
        assert_eq!(watcher.status().as_deref(), Some("deploy"));

        let child2 = base.child(ScopeSpec::steps(2).with_status("upload")).unwrap();
        assert_eq!(watcher.status().as_deref(), Some("upload"));

        child2.dispose();
        assert_eq!(watcher.status().as_deref(), Some("deploy"));
    }

    #[test]
    fn test_set_and_clear_status() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "start").unwrap();

        base.set_status("halfway");
        assert_eq!(watcher.status().as_deref(), Some("halfway"));
        assert_eq!(base.status().as_deref(), Some("halfway"));

        base.clear_status();
        assert_eq!(watcher.status(), None);
        assert_eq!(base.status(), None);
    }

    #[test]
    fn test_child_inherits_parent_status() {
        let watcher = Watcher::new();
        let base = watcher.begin(3, "analyze").unwrap();

        let unnamed = base.child(ScopeSpec::steps(1)).unwrap();
        assert_eq!(unnamed.status().as_deref(), Some("analyze"));
        assert_eq!(watcher.status().as_deref(), Some("analyze"));
        unnamed.dispose();

        let blank = base.child(ScopeSpec::steps(1).with_status("   ")).unwrap();
        assert_eq!(blank.status().as_deref(), Some("analyze"));
    }

    #[test]
    fn test_open_child_blocks_sibling() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "migrate").unwrap();

        let open = base.child(ScopeSpec::steps(2)).unwrap();
        let err = base.child(ScopeSpec::steps(2)).unwrap_err();
        assert!(matches!(err, WatchError::ChildStillOpen));
        assert!(!open.is_disposed());
    }

    #[test]
    fn test_exhausted_slots_reject_child() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "fetch").unwrap();

        base.child(ScopeSpec::steps(1).with_weight(0.1))
            .unwrap()
            .dispose();
        base.child(ScopeSpec::steps(1).with_weight(0.1))
            .unwrap()
            .dispose();

        let err = base.child(ScopeSpec::steps(1)).unwrap_err();
        assert!(matches!(err, WatchError::NoStepsRemaining));
    }

    #[test]
    fn test_completed_scope_rejects_child() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "verify").unwrap();

        base.child(ScopeSpec::steps(2)).unwrap().dispose();
        base.child(ScopeSpec::steps(2)).unwrap().dispose();
        assert!(base.is_completed());

        let err = base.child(ScopeSpec::steps(2)).unwrap_err();
        assert!(matches!(err, WatchError::Completed));
    }

    #[test]
    fn test_weight_validation() {
        let watcher = Watcher::new();
        let base = watcher.begin(4, "pack").unwrap();

        assert!(matches!(
            base.child(ScopeSpec::steps(1).with_weight(1.5)),
            Err(WatchError::WeightOutOfRange(_))
        ));
        assert!(matches!(
            base.child(ScopeSpec::steps(1).with_weight(-0.2)),
            Err(WatchError::WeightOutOfRange(_))
        ));

        base.child(ScopeSpec::steps(1).with_weight(0.9))
            .unwrap()
            .dispose();
        assert_eq!(base.progress(), 0.9);

        let err = base.child(ScopeSpec::steps(1).with_weight(0.2)).unwrap_err();
        assert!(matches!(err, WatchError::WeightExceedsBudget { .. }));
        assert_eq!(base.current_steps(), 1);

        // a rejected call must not settle the open child either
        let open = base.child(ScopeSpec::steps(1)).unwrap();
        assert!(matches!(
            base.child(ScopeSpec::steps(1).with_weight(2.0)),
            Err(WatchError::WeightOutOfRange(_))
        ));
        assert!(!open.is_disposed());
    }

    #[test]
    fn test_child_for_items_budget() {
        let watcher = Watcher::new();
        let base = watcher.begin(4, "stage").unwrap();

        let files = ["a.bin", "b.bin", "c.bin"];
        let child = base
            .child_for_items(files, ScopeSpec::default().with_steps_per_item(2))
            .unwrap();
        assert_eq!(child.all_steps(), 6);

        assert!(matches!(
            child.child_for_items(files, ScopeSpec::default().with_steps_per_item(0)),
            Err(WatchError::ZeroStepsPerItem)
        ));
    }

    #[test]
    fn test_advance_overshoot_clamps() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "scan").unwrap();

        base.advance(10).unwrap();
        assert_eq!(base.current_steps(), 2);
        assert_eq!(base.progress(), 1.0);
        assert!(base.is_completed());
        assert_eq!(watcher.aggregate_progress(), 1.0);
    }

    #[test]
    fn test_zero_step_scope_only_completes_explicitly() {
        let watcher = Watcher::new();
        let base = watcher.begin(0, "noop").unwrap();

        base.advance(3).unwrap();
        assert_eq!(base.progress(), 0.0);
        assert_eq!(base.current_steps(), 0);

        assert!(matches!(
            base.child(ScopeSpec::default()),
            Err(WatchError::NoStepsRemaining)
        ));

        base.complete();
        assert!(base.is_completed());
        assert_eq!(watcher.aggregate_progress(), 1.0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "mirror").unwrap();

        let child = base.child(ScopeSpec::steps(2)).unwrap();
        child.dispose();
        assert_eq!(base.current_steps(), 1);
        assert_eq!(watcher.aggregate_progress(), 0.5);

        child.dispose();
        assert_eq!(base.current_steps(), 1);
        assert_eq!(watcher.aggregate_progress(), 0.5);
    }

    #[test]
    fn test_complete_tears_down_children() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "bundle").unwrap();
        let child = base.child(ScopeSpec::steps(4)).unwrap();
        let grandchild = child.child(ScopeSpec::steps(4)).unwrap();

        base.complete();

        assert!(base.is_completed());
        assert!(!base.is_disposed());
        assert!(child.is_disposed());
        assert!(grandchild.is_disposed());
        assert!(matches!(child.advance(1), Err(WatchError::Disposed)));
        assert_eq!(watcher.aggregate_progress(), 1.0);
    }

    #[test]
    fn test_nested_aggregation_multiplies_weights() {
        let watcher = Watcher::new();
        let base = watcher.begin(2, "root").unwrap();
        let child = base.child(ScopeSpec::steps(2)).unwrap();
        let grandchild = child.child(ScopeSpec::steps(2)).unwrap();

        grandchild.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.125);
        assert_eq!(watcher.tip_progress(), 0.5);

        grandchild.advance(1).unwrap();
        assert_eq!(watcher.aggregate_progress(), 0.25);

        grandchild.dispose();
        // the child gains the grandchild's share and becomes the tip again
        assert_eq!(watcher.aggregate_progress(), 0.25);
        assert_eq!(child.progress(), 0.5);
    }
}
