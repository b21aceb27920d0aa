//! # datahub-rs: Hierarchical Data Hub Core
//!
//! A path-addressable registry of named resources through which
//! timestamped sensor and control data flow. Applications publish
//! Inputs, consume Outputs, and install Observations that filter,
//! throttle, buffer and statistically summarize streams; administrators
//! route resources into each other, stage defaults and overrides, and
//! diff the tree through snapshot-phase flags.
//!
//! ## Architecture
//!
//! - **Value store** ([`sample`]): immutable, reference-counted
//!   timestamped samples carrying one of trigger/boolean/numeric/
//!   string/JSON, with typed JSON conversion and extraction
//! - **Resource tree** ([`tree`]): the entry hierarchy — autoprovisioned
//!   Namespaces, Placeholder/Input/Output/Observation lifecycle,
//!   tombstone tracking, acyclic routing, and push fan-out
//! - **Resource layer** ([`resource`]): the per-entry capability object
//!   implementing acceptance filters, buffering and statistics
//! - **Change dispatch** ([`watch`]): synchronous listeners observing
//!   resources appearing and disappearing
//!
//! The hub is single-threaded cooperative: all mutation runs on one
//! actor and callbacks execute synchronously within it.
//!
//! ## Example
//!
//! ```
//! use datahub_rs::{DataType, ResourceTree, Sample};
//!
//! let mut tree = ResourceTree::new();
//! let root = tree.root();
//!
//! let input = tree.create_input(root, "vent/temp", DataType::Numeric, "degC").unwrap();
//! let obs = tree.get_observation(root, "obs/temp_filtered").unwrap();
//! tree.set_source(obs, Some(input)).unwrap();
//! tree.set_change_by(obs, 0.5);
//!
//! tree.push(input, DataType::Numeric, Sample::numeric(Sample::NOW, 21.3)).unwrap();
//! assert_eq!(tree.current_value(obs).unwrap().as_numeric(), Some(21.3));
//! ```

pub mod config;
pub mod error;
pub mod json;
pub mod resource;
pub mod sample;
pub mod tree;
pub mod watch;

// Re-export commonly used types.
pub use config::TreeConfig;
pub use error::{HubError, Result};
pub use resource::{HandlerId, ObsTransform};
pub use sample::{DataType, Sample, SampleRef, Value};
pub use tree::{EntryId, EntryKind, ResourceTree};
pub use watch::{ChangeEvent, ChangeOp, ListenerId};
