// -
// Paths

pub(crate) const PATH_SEPARATOR: &str = "/";

/// Parent of every contention lock node
pub(crate) const LOCK_ROOT: &str = "/_locks";

// -
// Node metadata

/// Matches any node version in set/delete/check calls
pub const ANY_VERSION: i32 = -1;

/// Width of the zero-padded counter appended to sequential nodes
pub(crate) const SEQUENTIAL_SUFFIX_WIDTH: usize = 10;

// -
// Watch

/// Providers built by the client always register the default watcher
pub(crate) const WATCHED: bool = true;

// -
// Contention

/// Poll ceiling while waiting for a contention lock when no watch fires
pub(crate) const LOCK_WAIT_POLL_MS: u64 = 200;
