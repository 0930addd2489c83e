//! Lifecycle notifications surfaced by the watcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle event queued by the watcher for its consumer to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherEvent {
    /// A base scope was created and watching began
    Started,
    /// A scope entered the tree below the base
    ChildStarted,
    /// The base scope was disposed and the tree unwound
    ChildDisposed,
    /// Watching finished and the observable state was reset
    Completed,
}

impl fmt::Display for WatcherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherEvent::Started => write!(f, "started"),
            WatcherEvent::ChildStarted => write!(f, "child started"),
            WatcherEvent::ChildDisposed => write!(f, "child disposed"),
            WatcherEvent::Completed => write!(f, "completed"),
        }
    }
}
