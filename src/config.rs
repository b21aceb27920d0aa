//! Size limits and tree capacities.
//!
//! The string/name/path limits are fixed process-wide constants; the
//! entry pool capacity is configurable per tree through [`TreeConfig`].

use serde::{Deserialize, Serialize};

/// Maximum byte length of a single entry name.
pub const MAX_NAME_BYTES: usize = 64;

/// Maximum byte length of a full resource path.
pub const MAX_PATH_BYTES: usize = 512;

/// Maximum byte length of a units string.
pub const MAX_UNITS_BYTES: usize = 64;

/// Maximum byte length of string and JSON sample values, including their
/// JSON rendition.
pub const MAX_STRING_BYTES: usize = 50_000;

/// Default number of resource tree entries available to a tree.
pub const DEFAULT_ENTRY_POOL_SIZE: usize = 1024;

/// Capacity configuration for a resource tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum number of entries the tree may hold at once. Exceeding it
    /// makes autoprovisioning fail with an out-of-memory error.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    DEFAULT_ENTRY_POOL_SIZE
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_ENTRY_POOL_SIZE,
        }
    }
}
