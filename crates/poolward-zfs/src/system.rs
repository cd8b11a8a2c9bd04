//! Pool handle backed by the host `zfs`/`zpool` CLIs.
//!
//! Every operation is one round trip: a fixed script template, the operation's
//! arguments passed positionally, and a parse of stdout into the inventory
//! model. Nothing is cached between calls.

use crate::command::ShellRunner;
use crate::parse::{
    parse_datasets, parse_filesystems, parse_pool_names, parse_single_filesystem,
    parse_snapshots,
};
use log::debug;
use poolward_core::config::PoolwardConfig;
use poolward_core::error::{PoolError, PoolResult};
use poolward_core::model::{
    ensure_within_pool, looks_like_snapshot_label, Filesystem, Inventory, Snapshot,
    SNAPSHOT_SEPARATOR,
};
use poolward_core::runner::{CallOptions, ScriptRequest, ScriptRunner};

// Every template ends option parsing with `--` so a name is never read as a flag.
pub const POOL_EXISTS_SCRIPT: &str = r#"zpool list -H -o name -- "$1""#;
pub const DATASET_EXISTS_SCRIPT: &str = r#"zfs list -H -o name -- "$1""#;
pub const LIST_DATASETS_SCRIPT: &str =
    r#"zfs list -H -p -r -o name,type,origin,guid -s createtxg -t all -- "$1""#;
pub const LIST_FILESYSTEMS_SCRIPT: &str =
    r#"zfs list -H -p -r -o name,origin -s createtxg -t filesystem -- "$1""#;
pub const LIST_SNAPSHOTS_SCRIPT: &str =
    r#"zfs list -H -p -d 1 -o name,guid -s createtxg -t snapshot -- "$1""#;
pub const GET_FILESYSTEM_SCRIPT: &str =
    r#"zfs list -H -p -o name,origin -t filesystem -- "$1""#;
pub const CREATE_FILESYSTEM_SCRIPT: &str = r#"zfs create -p -- "$1""#;
pub const CREATE_SNAPSHOT_SCRIPT: &str = r#"zfs snapshot -- "$1@$2""#;
pub const POOL_STATUS_SCRIPT: &str = r#"zpool status -v -- "$1""#;

/// Handle bound to one existing zpool.
#[derive(Debug, Clone)]
pub struct Zpool<R = ShellRunner> {
    name: String,
    runner: R,
}

impl Zpool<ShellRunner> {
    /// Build a shell-backed handle for the pool named in `config`.
    pub fn from_config(config: &PoolwardConfig) -> PoolResult<Self> {
        let name = config.pool_name().ok_or_else(|| {
            PoolError::InvalidConfig("pool.name is not configured".to_string())
        })?;
        Self::open(name, ShellRunner::from_config(config)?)
    }
}

impl<R: ScriptRunner> Zpool<R> {
    /// Validate that `name` is an existing pool and bind a handle to it.
    ///
    /// # Errors
    /// `PoolError::PoolNotFound` when the validation query fails for any reason.
    pub fn open(name: &str, runner: R) -> PoolResult<Self> {
        Self::open_with(name, runner, &CallOptions::default())
    }

    pub fn open_with(name: &str, runner: R, options: &CallOptions) -> PoolResult<Self> {
        let not_found = |source: PoolError| PoolError::PoolNotFound {
            pool: name.to_string(),
            source: Box::new(source),
        };

        if name.is_empty() || name.starts_with('-') {
            return Err(not_found(PoolError::Precondition(format!(
                "`{name}` is not a valid zpool name"
            ))));
        }

        let out = runner
            .run(&ScriptRequest {
                operation: "validate zpool",
                script: POOL_EXISTS_SCRIPT,
                args: &[name],
                options,
            })
            .map_err(not_found)?;

        let names = parse_pool_names(&out).map_err(not_found)?;
        if !names.iter().any(|listed| listed == name) {
            return Err(not_found(PoolError::Precondition(format!(
                "zpool list did not report `{name}`"
            ))));
        }

        debug!("opened zpool `{name}`");
        Ok(Self {
            name: name.to_string(),
            runner,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Scope the next operations to `options` (deadline and cancellation).
    pub fn call(&self, options: CallOptions) -> PoolCall<'_, R> {
        PoolCall {
            pool: self,
            options,
        }
    }

    fn default_call(&self) -> PoolCall<'_, R> {
        self.call(CallOptions::default())
    }

    /// See [`PoolCall::exists`].
    pub fn exists(&self, dataset: &str) -> bool {
        self.default_call().exists(dataset)
    }

    /// See [`PoolCall::list_datasets`].
    pub fn list_datasets(&self) -> PoolResult<Inventory> {
        self.default_call().list_datasets()
    }

    /// See [`PoolCall::list_filesystems`].
    pub fn list_filesystems(&self) -> PoolResult<Vec<Filesystem>> {
        self.default_call().list_filesystems()
    }

    /// See [`PoolCall::list_snapshots`].
    pub fn list_snapshots(&self, filesystem: &str) -> PoolResult<Vec<Snapshot>> {
        self.default_call().list_snapshots(filesystem)
    }

    /// See [`PoolCall::get_filesystem`].
    pub fn get_filesystem(&self, name: &str) -> PoolResult<Filesystem> {
        self.default_call().get_filesystem(name)
    }

    /// See [`PoolCall::create_filesystem`].
    pub fn create_filesystem(&self, name: &str) -> PoolResult<()> {
        self.default_call().create_filesystem(name)
    }

    /// See [`PoolCall::create_snapshot`].
    pub fn create_snapshot(&self, filesystem: &str, label: &str) -> PoolResult<String> {
        self.default_call().create_snapshot(filesystem, label)
    }

    /// See [`PoolCall::status`].
    pub fn status(&self) -> PoolResult<Vec<u8>> {
        self.default_call().status()
    }
}

/// Pool operations bound to a specific deadline/cancellation scope.
#[derive(Debug)]
pub struct PoolCall<'a, R> {
    pool: &'a Zpool<R>,
    options: CallOptions,
}

impl<'a, R: ScriptRunner> PoolCall<'a, R> {
    fn run(&self, operation: &str, script: &str, args: &[&str]) -> PoolResult<Vec<u8>> {
        self.pool.runner.run(&ScriptRequest {
            operation,
            script,
            args,
            options: &self.options,
        })
    }

    pub fn pool_name(&self) -> &str {
        &self.pool.name
    }

    /// Report whether `dataset` exists.
    ///
    /// Asks the tool about the one name directly. An empty or option-like name
    /// is `false` without spawning anything, and every tool failure reads as `false`.
    pub fn exists(&self, dataset: &str) -> bool {
        if dataset.is_empty() || dataset.starts_with('-') {
            return false;
        }

        match self.run("dataset exists", DATASET_EXISTS_SCRIPT, &[dataset]) {
            Ok(_) => true,
            Err(err) => {
                debug!("treating `{dataset}` as absent: {err}");
                false
            }
        }
    }

    /// Every dataset in the pool, oldest first.
    pub fn list_datasets(&self) -> PoolResult<Inventory> {
        let name = self.pool.name.as_str();
        let action = || format!("unable to get dataset list for zpool `{name}`");
        let out = self
            .run("list datasets", LIST_DATASETS_SCRIPT, &[name])
            .map_err(|err| err.context(action()))?;
        parse_datasets(&out).map_err(|err| err.context(action()))
    }

    /// Every filesystem in the pool, oldest first.
    pub fn list_filesystems(&self) -> PoolResult<Vec<Filesystem>> {
        let name = self.pool.name.as_str();
        let action = || format!("unable to get filesystem list for zpool `{name}`");
        let out = self
            .run("list filesystems", LIST_FILESYSTEMS_SCRIPT, &[name])
            .map_err(|err| err.context(action()))?;
        parse_filesystems(&out).map_err(|err| err.context(action()))
    }

    /// Snapshots taken directly of `filesystem`, oldest first.
    pub fn list_snapshots(&self, filesystem: &str) -> PoolResult<Vec<Snapshot>> {
        let action = || format!("unable to get snapshot list for filesystem `{filesystem}`");
        ensure_within_pool(&self.pool.name, filesystem).map_err(|err| err.context(action()))?;
        let out = self
            .run("list snapshots", LIST_SNAPSHOTS_SCRIPT, &[filesystem])
            .map_err(|err| err.context(action()))?;
        parse_snapshots(&out).map_err(|err| err.context(action()))
    }

    /// Look up a single filesystem of this pool by name.
    ///
    /// # Errors
    /// `PoolError::Precondition` without touching the tool when `name` is not
    /// under the pool.
    pub fn get_filesystem(&self, name: &str) -> PoolResult<Filesystem> {
        let action = || format!("unable to get filesystem `{name}`");
        ensure_within_pool(&self.pool.name, name).map_err(|err| err.context(action()))?;
        let out = self
            .run("get filesystem", GET_FILESYSTEM_SCRIPT, &[name])
            .map_err(|err| err.context(action()))?;
        parse_single_filesystem(&out).map_err(|err| err.context(action()))
    }

    /// Create `name` (and any missing parents) under this pool.
    ///
    /// # Errors
    /// `PoolError::Precondition` without touching the tool when `name` is not
    /// under the pool; wrapped tool errors otherwise (an existing filesystem fails).
    pub fn create_filesystem(&self, name: &str) -> PoolResult<()> {
        let action = || format!("unable to create filesystem `{name}`");
        ensure_within_pool(&self.pool.name, name).map_err(|err| err.context(action()))?;
        self.run("create filesystem", CREATE_FILESYSTEM_SCRIPT, &[name])
            .map_err(|err| err.context(action()))?;
        debug!("created filesystem `{name}`");
        Ok(())
    }

    /// Snapshot `filesystem` as `<filesystem>@<label>` and return the snapshot name.
    pub fn create_snapshot(&self, filesystem: &str, label: &str) -> PoolResult<String> {
        let snapshot = format!("{filesystem}{SNAPSHOT_SEPARATOR}{label}");
        let action = || format!("unable to create snapshot `{snapshot}`");
        ensure_within_pool(&self.pool.name, filesystem).map_err(|err| err.context(action()))?;
        if !looks_like_snapshot_label(label) {
            return Err(PoolError::Precondition(format!(
                "snapshot label `{label}` is invalid"
            ))
            .context(action()));
        }
        self.run("create snapshot", CREATE_SNAPSHOT_SCRIPT, &[filesystem, label])
            .map_err(|err| err.context(action()))?;
        debug!("created snapshot `{snapshot}`");
        Ok(snapshot)
    }

    /// Raw `zpool status` text for display.
    pub fn status(&self) -> PoolResult<Vec<u8>> {
        let name = self.pool.name.as_str();
        self.run("zpool status", POOL_STATUS_SCRIPT, &[name])
            .map_err(|err| err.context(format!("unable to get status for zpool `{name}`")))
    }
}
