//! Side-effecting collaborators: configuration, snapshot files, stacks, panics.

pub mod config;
pub mod panic_hook;
pub mod snapshot_doc;
pub mod snapshot_store;
pub mod stack;
