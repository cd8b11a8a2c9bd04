//! Inventory model for a pool's dataset tree.
//!
//! Every value here is derived fresh from one invocation of the external tool.
//! Listings keep the order the tool emitted, which is creation-transaction order
//! (`-s createtxg`), so lookups are linear and never assume name-sortedness.

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Separator between dataset path segments.
pub const PATH_SEPARATOR: char = '/';
/// Separator between a filesystem and a snapshot label.
pub const SNAPSHOT_SEPARATOR: char = '@';

/// Dataset type as printed by `zfs list -o type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Filesystem,
    Volume,
    Snapshot,
    Bookmark,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Filesystem => "filesystem",
            DatasetKind::Volume => "volume",
            DatasetKind::Snapshot => "snapshot",
            DatasetKind::Bookmark => "bookmark",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "filesystem" => Ok(DatasetKind::Filesystem),
            "volume" => Ok(DatasetKind::Volume),
            "snapshot" => Ok(DatasetKind::Snapshot),
            "bookmark" => Ok(DatasetKind::Bookmark),
            other => Err(format!("unknown dataset type `{other}`")),
        }
    }
}

/// Any node of a pool's dataset tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "dataset")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatasetKind,
    /// Origin snapshot exactly as reported; the tool prints `-` for non-clones.
    pub origin: String,
    pub guid: String,
}

impl Dataset {
    /// Origin snapshot name, or `None` when the dataset is not a clone.
    pub fn origin_snapshot(&self) -> Option<&str> {
        origin_of(&self.origin)
    }
}

/// A mountable dataset. `name` is rooted at the owning pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filesystem {
    pub name: String,
    pub origin: String,
}

impl Filesystem {
    pub fn origin_snapshot(&self) -> Option<&str> {
        origin_of(&self.origin)
    }
}

/// Point-in-time capture named `<filesystem>@<label>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub guid: String,
}

impl Snapshot {
    /// Filesystem part of the snapshot name.
    pub fn filesystem(&self) -> &str {
        split_snapshot(&self.name).0
    }

    /// Label part of the snapshot name; empty when the name carries no `@`.
    pub fn label(&self) -> &str {
        split_snapshot(&self.name).1
    }
}

fn origin_of(origin: &str) -> Option<&str> {
    let trimmed = origin.trim();
    if trimmed.is_empty() || trimmed == "-" {
        None
    } else {
        Some(trimmed)
    }
}

fn split_snapshot(name: &str) -> (&str, &str) {
    name.split_once(SNAPSHOT_SEPARATOR).unwrap_or((name, ""))
}

/// Ordered dataset listing in creation-transaction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    datasets: Vec<Dataset>,
}

impl Inventory {
    pub fn new(datasets: Vec<Dataset>) -> Self {
        Self { datasets }
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dataset> {
        self.datasets.iter()
    }

    pub fn as_slice(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn into_vec(self) -> Vec<Dataset> {
        self.datasets
    }

    pub fn find(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| dataset.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Typed view over the filesystem entries, order preserved.
    pub fn filesystems(&self) -> Vec<Filesystem> {
        self.datasets
            .iter()
            .filter(|dataset| dataset.kind == DatasetKind::Filesystem)
            .map(|dataset| Filesystem {
                name: dataset.name.clone(),
                origin: dataset.origin.clone(),
            })
            .collect()
    }

    /// Snapshots taken directly of `filesystem`, order preserved.
    pub fn snapshots_of(&self, filesystem: &str) -> Vec<Snapshot> {
        self.datasets
            .iter()
            .filter(|dataset| dataset.kind == DatasetKind::Snapshot)
            .filter(|dataset| split_snapshot(&dataset.name).0 == filesystem)
            .map(|dataset| Snapshot {
                name: dataset.name.clone(),
                guid: dataset.guid.clone(),
            })
            .collect()
    }

    /// Datasets cloned from `snapshot`.
    pub fn clones_of(&self, snapshot: &str) -> Vec<&Dataset> {
        self.datasets
            .iter()
            .filter(|dataset| dataset.origin_snapshot() == Some(snapshot))
            .collect()
    }

    /// Walk the origin chain of `name`.
    ///
    /// Each step appends the origin snapshot followed by the filesystem it was
    /// taken from, then continues with that filesystem's origin. The walk stops
    /// at a dataset without an origin, at a name missing from the inventory, or
    /// when a name repeats.
    pub fn lineage(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(name.to_string());
        let mut current = name.to_string();

        while let Some(origin) = self.find(&current).and_then(Dataset::origin_snapshot) {
            if !seen.insert(origin.to_string()) {
                break;
            }
            chain.push(origin.to_string());

            let parent = split_snapshot(origin).0.to_string();
            if !seen.insert(parent.clone()) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }

        chain
    }
}

impl IntoIterator for Inventory {
    type Item = Dataset;
    type IntoIter = std::vec::IntoIter<Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.into_iter()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a Dataset;
    type IntoIter = std::slice::Iter<'a, Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.iter()
    }
}

/// Returns true when `name` is the pool root or a descendant path of `pool`.
pub fn is_within_pool(pool: &str, name: &str) -> bool {
    if pool.is_empty() {
        return false;
    }
    match name.strip_prefix(pool) {
        Some("") => true,
        Some(rest) => rest.starts_with(PATH_SEPARATOR) && rest.len() > 1,
        None => false,
    }
}

/// Fail with a precondition error unless `name` lives under `pool`.
pub fn ensure_within_pool(pool: &str, name: &str) -> PoolResult<()> {
    if is_within_pool(pool, name) {
        Ok(())
    } else {
        Err(PoolError::Precondition(format!(
            "`{name}` is not under zpool `{pool}`"
        )))
    }
}

/// Lightweight sanity check for a snapshot label.
pub fn looks_like_snapshot_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.chars().any(|ch| {
            ch == SNAPSHOT_SEPARATOR || ch == PATH_SEPARATOR || ch.is_whitespace()
        })
}
