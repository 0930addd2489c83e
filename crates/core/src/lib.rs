//! Opwatch core progress tree.
//!
//! This crate defines the hierarchical scope tree that turns step counts
//! and fractional reports into a single aggregated completion value.

#![warn(missing_docs)]

// Tree nodes
mod parent;
mod reporter;
mod scope;

// Root observer
mod event;
mod watcher;

// Support types
mod error;
mod id;
mod spec;

// Re-exports
pub use error::{Result, WatchError};
pub use event::WatcherEvent;
pub use id::ScopeId;
pub use reporter::Reporter;
pub use scope::Scope;
pub use spec::ScopeSpec;
pub use watcher::{Snapshot, Watcher};
