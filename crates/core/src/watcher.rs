//! Root observer over a tree of progress scopes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WatchError};
use crate::event::WatcherEvent;
use crate::parent::Parent;
use crate::scope::{Scope, ScopeInner};

/// Observable root of a progress tree.
///
/// The watcher owns at most one base scope at a time and records what the
/// tree reports: an aggregate completion value, the raw progress and status
/// of the deepest active scope, and a queue of lifecycle events for the
/// consumer to drain. Disposing the base scope unwinds everything; the
/// watcher then resets and can be reused.
#[derive(Debug, Clone, Default)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Create an idle watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a base scope with the given step budget.
    ///
    /// Fails while another base scope is active. Observable state resets
    /// before the new scope is wired in.
    pub fn begin(&self, steps: u32, status: impl Into<String>) -> Result<Scope> {
        let status = status.into();
        {
            let mut st = self.inner.state.borrow_mut();
            if st.scope.is_some() {
                return Err(WatchError::AlreadyStarted);
            }
            st.status = None;
            st.tip = 0.0;
            st.aggregate = 0.0;
            st.running = true;
        }

        let parent: Weak<dyn Parent> = Rc::<WatcherInner>::downgrade(&self.inner);
        let scope = ScopeInner::create(parent, steps, false, Some(status.clone()));
        self.inner.state.borrow_mut().scope = Some(scope.clone());
        self.inner.tip_status(Some(&status));
        self.inner
            .state
            .borrow_mut()
            .events
            .push_back(WatcherEvent::Started);

        debug!("Started watching a base scope of {} steps", steps);

        Ok(Scope { inner: scope })
    }

    /// Start watching with one step per item in the collection.
    pub fn begin_for_items<I>(&self, items: I, status: impl Into<String>) -> Result<Scope>
    where
        I: IntoIterator,
    {
        let steps = items.into_iter().count() as u32;
        self.begin(steps, status)
    }

    /// Status of the deepest active scope.
    pub fn status(&self) -> Option<String> {
        self.inner.state.borrow().status.clone()
    }

    /// Raw progress of the deepest active scope.
    pub fn tip_progress(&self) -> f64 {
        self.inner.state.borrow().tip
    }

    /// Aggregated completion of the whole tree in `[0, 1]`.
    pub fn aggregate_progress(&self) -> f64 {
        self.inner.state.borrow().aggregate
    }

    /// True while a base scope is being watched.
    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    /// Point-in-time copy of the observable state.
    pub fn snapshot(&self) -> Snapshot {
        let st = self.inner.state.borrow();
        Snapshot {
            timestamp: Utc::now(),
            status: st.status.clone(),
            tip_progress: st.tip,
            aggregate_progress: st.aggregate,
            running: st.running,
        }
    }

    /// Pop the oldest undelivered lifecycle event.
    pub fn poll_event(&self) -> Option<WatcherEvent> {
        self.inner.state.borrow_mut().events.pop_front()
    }

    /// Drain every undelivered lifecycle event in order.
    pub fn drain_events(&self) -> Vec<WatcherEvent> {
        self.inner.state.borrow_mut().events.drain(..).collect()
    }

    /// Tear down the active tree, if any, and reset the observable state.
    ///
    /// Every handle into the torn-down tree becomes inert. Calling this
    /// with nothing active is a no-op; the watcher stays reusable.
    pub fn dispose(&self) {
        let scope = match self.inner.state.borrow_mut().scope.take() {
            Some(scope) => scope,
            None => return,
        };
        scope.mark_disposed_tree();

        {
            let mut st = self.inner.state.borrow_mut();
            st.status = None;
            st.tip = 0.0;
            st.aggregate = 0.0;
            st.running = false;
            st.events.push_back(WatcherEvent::ChildDisposed);
            st.events.push_back(WatcherEvent::Completed);
        }

        debug!("Watcher disposed; progress tree torn down");
    }
}

#[derive(Debug, Default)]
pub(crate) struct WatcherInner {
    state: RefCell<WatcherState>,
}

#[derive(Debug, Default)]
struct WatcherState {
    status: Option<String>,
    tip: f64,
    aggregate: f64,
    running: bool,
    scope: Option<Rc<ScopeInner>>,
    events: VecDeque<WatcherEvent>,
}

impl Parent for WatcherInner {
    fn child_started(&self) {
        self.state
            .borrow_mut()
            .events
            .push_back(WatcherEvent::ChildStarted);
    }

    fn child_disposed(&self) {
        let mut st = self.state.borrow_mut();
        st.scope = None;
        st.status = None;
        st.tip = 0.0;
        st.aggregate = 0.0;
        st.running = false;
        st.events.push_back(WatcherEvent::ChildDisposed);
        st.events.push_back(WatcherEvent::Completed);
    }

    fn child_progress(&self, progress: f64) {
        self.state.borrow_mut().aggregate = progress;
    }

    fn tip_progress(&self, progress: f64) {
        self.state.borrow_mut().tip = progress;
    }

    fn tip_status(&self, status: Option<&str>) {
        self.state.borrow_mut().status = status.map(String::from);
    }
}

/// Observable watcher state captured at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Status of the deepest active scope
    pub status: Option<String>,

    /// Raw progress of the deepest active scope
    pub tip_progress: f64,

    /// Aggregated completion of the whole tree
    pub aggregate_progress: f64,

    /// Whether a base scope is being watched
    pub running: bool,
}
