//! Stable exit codes for test binaries driven by [`cli::main`](crate::cli::main).

/// Every test passed or was skipped.
pub const OK: i32 = 0;
/// At least one test failed or raised an exception.
pub const FAILED: i32 = 1;
/// The run could not complete: bad arguments, invalid config, engine misuse,
/// or unreadable snapshots.
pub const INVALID: i32 = 2;
