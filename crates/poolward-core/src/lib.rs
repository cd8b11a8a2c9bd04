//! Core building blocks shared by poolward crates.
//!
//! The error taxonomy, configuration, inventory model, and the script-runner
//! contract live here so the ZFS handle and the CLI agree on one vocabulary.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod runner;

pub use config::{ConfigFormat, PoolwardConfig, DEFAULT_CONFIG_PATH};
pub use error::{ErrorKind, PoolError, PoolResult};
pub use model::{Dataset, DatasetKind, Filesystem, Inventory, Snapshot};
pub use runner::{CallOptions, CancelToken, ScriptRequest, ScriptRunner};
