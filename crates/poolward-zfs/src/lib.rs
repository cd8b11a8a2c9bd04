//! ZFS pool integration.
//!
//! `system` implements the `Zpool` handle on top of any `ScriptRunner`. `command`
//! and `parse` isolate shell execution and output parsing so the handle stays
//! testable.

mod command;
mod parse;
mod system;

pub use command::ShellRunner;
pub use system::{
    PoolCall, Zpool, CREATE_FILESYSTEM_SCRIPT, CREATE_SNAPSHOT_SCRIPT, DATASET_EXISTS_SCRIPT,
    GET_FILESYSTEM_SCRIPT, LIST_DATASETS_SCRIPT, LIST_FILESYSTEMS_SCRIPT, LIST_SNAPSHOTS_SCRIPT,
    POOL_EXISTS_SCRIPT, POOL_STATUS_SCRIPT,
};
