//! The resource tree: hierarchy, lifecycle, routing and dispatch.
//!
//! # Components
//!
//! - [`EntryId`] - Index newtype addressing entries in the arena
//! - [`EntryKind`] - Lifecycle state of an entry
//! - [`ResourceTree`] - The tree itself: path resolution, state
//!   transitions, traversal, routing, push fan-out, snapshot
//!   bookkeeping, and the kind-guarded administrative facade

pub mod entry;
mod facade;
pub mod id;
#[allow(clippy::module_inception)]
mod tree;

pub use entry::{EntryKind, FLAG_CLEAR_NEW, FLAG_DELETED, FLAG_NEW, FLAG_RELEVANT};
pub use id::EntryId;
pub use tree::{ResourceTree, OBS_NAMESPACE_NAME};
