//! Configuration model and helpers used by poolward binaries.

use crate::error::{PoolError, PoolResult};
use directories_next::ProjectDirs;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/poolward.toml";
pub const SHELL_ENV: &str = "POOLWARD_SHELL";
const USER_FILE_NAME: &str = "poolward.toml";
const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "Poolward";
const APP_NAME: &str = "poolward";
pub const KNOWN_SHELL_PATHS: &[&str] = &[
    "/bin/bash",
    "/usr/bin/bash",
    "/usr/local/bin/bash",
    "/bin/sh",
];

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
}

/// Lightweight sanity check that a name matches common ZFS dataset patterns.
///
/// Snapshot names (`@`) are rejected; this is meant for pools and filesystems.
pub fn looks_like_dataset_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return false;
    }

    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return false;
        }
        if segment.starts_with('-') {
            return false;
        }
        if !segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.'))
        {
            return false;
        }
    }

    true
}

pub(crate) fn detect_binary_path(candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(|path| path.to_string_lossy().into_owned())
}

pub fn detect_shell_path() -> Option<String> {
    detect_binary_path(KNOWN_SHELL_PATHS)
}

/// Which pool the binaries operate on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PoolCfg {
    #[serde(default)]
    pub name: Option<String>,
}

/// Interpreter used to run `zfs`/`zpool` scripts and its deadline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellCfg {
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ShellCfg {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingCfg {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PoolwardConfig {
    #[serde(default)]
    pub pool: PoolCfg,

    #[serde(default)]
    pub shell: ShellCfg,

    #[serde(default)]
    pub logging: LoggingCfg,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

/// Tracks whether we parsed TOML or YAML so writes preserve format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

impl PoolwardConfig {
    /// Return the canonical system-wide configuration path.
    pub fn default_path() -> &'static Path {
        Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Resolve the per-user configuration path.
    pub fn user_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(USER_FILE_NAME))
    }

    /// Load `path` when it exists, then the per-user file, then built-in defaults.
    pub fn resolve<P: AsRef<Path>>(path: P) -> PoolResult<Self> {
        let target = path.as_ref();
        if target.exists() {
            return Self::load(target);
        }

        if let Some(user_path) = Self::user_config_path().filter(|p| p.exists()) {
            warn!(
                "configuration missing at {}; using per-user configuration at {}",
                target.display(),
                user_path.display()
            );
            return Self::load(&user_path);
        }

        debug!(
            "no configuration found at {}; using built-in defaults",
            target.display()
        );
        Ok(Self {
            path: target.to_path_buf(),
            ..Self::default()
        })
    }

    /// Read a config file from disk, detecting the format by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> PoolResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
        );
        let mut cfg = if is_yaml {
            serde_yaml::from_str::<Self>(&contents)?
        } else {
            toml::from_str::<Self>(&contents)?
        };

        cfg.path = path.to_path_buf();
        cfg.format = if is_yaml {
            ConfigFormat::Yaml
        } else {
            ConfigFormat::Toml
        };

        if cfg.shell.timeout_secs == 0 {
            return Err(PoolError::InvalidConfig(
                "shell.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Perform a best-effort validation pass and return human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.shell.timeout_secs == 0 {
            issues.push("shell.timeout_secs must be greater than 0".to_string());
        }

        if let Some(name) = &self.pool.name {
            if !looks_like_dataset_name(name) || name.contains('/') {
                issues.push(format!("pool.name is not a valid zpool name: {name}"));
            }
        }

        if let Some(path) = &self.shell.path {
            if !Path::new(path).exists() {
                issues.push(format!("shell.path does not exist: {path}"));
            }
        } else if detect_shell_path().is_none() {
            issues.push(format!(
                "no shell found; tried {:?}; set shell.path",
                KNOWN_SHELL_PATHS
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !matches!(
            level.as_str(),
            "off" | "error" | "warn" | "info" | "debug" | "trace"
        ) {
            issues.push(format!("logging.level is not recognised: {}", self.logging.level));
        }

        issues
    }

    /// Interpreter path: `POOLWARD_SHELL`, then `shell.path`, then the first known shell.
    pub fn shell_path(&self) -> PoolResult<PathBuf> {
        if let Ok(override_path) = env::var(SHELL_ENV) {
            if !override_path.trim().is_empty() {
                return Ok(PathBuf::from(override_path.trim()));
            }
        }

        if let Some(path) = self
            .shell
            .path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
        {
            return Ok(PathBuf::from(path));
        }

        detect_shell_path().map(PathBuf::from).ok_or_else(|| {
            PoolError::InvalidConfig(format!(
                "unable to locate a shell; tried {:?}",
                KNOWN_SHELL_PATHS
            ))
        })
    }

    /// Translate the stored timeout into a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.shell.timeout_secs)
    }

    pub fn pool_name(&self) -> Option<&str> {
        self.pool
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Persist the configuration back to its original on-disk format.
    pub fn save(&self) -> PoolResult<()> {
        let payload = match self.format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: impl Into<String>) -> Self {
            let prev = env::var(key).ok();
            env::set_var(key, value.into());
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = &self.prev {
                env::set_var(self.key, prev);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn shell_path_respects_env_override() {
        let config = PoolwardConfig {
            shell: ShellCfg {
                path: Some("/opt/bin/bash".into()),
                timeout_secs: 5,
            },
            ..PoolwardConfig::default()
        };

        let guard = EnvGuard::set(SHELL_ENV, "/tmp/fake-shell");
        assert_eq!(
            config.shell_path().expect("shell path"),
            PathBuf::from("/tmp/fake-shell")
        );
        drop(guard);
        assert_eq!(
            config.shell_path().expect("shell path"),
            PathBuf::from("/opt/bin/bash")
        );
    }

    #[test]
    fn load_toml_applies_defaults() -> PoolResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("poolward.toml");
        fs::write(&path, "[pool]\nname = \"tank\"\n")?;

        let config = PoolwardConfig::load(&path)?;
        assert_eq!(config.pool_name(), Some("tank"));
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.format, ConfigFormat::Toml);
        assert_eq!(config.path, path);
        Ok(())
    }

    #[test]
    fn load_yaml_and_save_round_trip_format() -> PoolResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("poolward.yaml");
        fs::write(&path, "pool:\n  name: tank\nshell:\n  timeout_secs: 5\n")?;

        let mut config = PoolwardConfig::load(&path)?;
        assert_eq!(config.format, ConfigFormat::Yaml);
        assert_eq!(config.timeout(), Duration::from_secs(5));

        config.pool.name = Some("rpool".into());
        config.save()?;
        let reloaded = PoolwardConfig::load(&path)?;
        assert_eq!(reloaded.pool_name(), Some("rpool"));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> PoolResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("poolward.toml");
        fs::write(&path, "[shell]\ntimeout_secs = 0\n")?;

        let err = PoolwardConfig::load(&path).expect_err("zero timeout must fail");
        assert!(matches!(err, PoolError::InvalidConfig(_)));
        Ok(())
    }

    #[test]
    fn resolve_falls_back_to_defaults() -> PoolResult<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("absent.toml");
        let config = PoolwardConfig::resolve(&missing)?;
        assert_eq!(config.shell.timeout_secs, 60);
        Ok(())
    }

    #[test]
    fn validate_flags_bad_values() {
        let config = PoolwardConfig {
            pool: PoolCfg {
                name: Some("tank/child".into()),
            },
            shell: ShellCfg {
                path: Some("/definitely/not/a/shell".into()),
                timeout_secs: 0,
            },
            logging: LoggingCfg {
                level: "loud".into(),
            },
            ..PoolwardConfig::default()
        };

        let issues = config.validate();
        assert_eq!(issues.len(), 4, "{issues:?}");
    }

    #[test]
    fn dataset_name_validator_accepts_common_patterns() {
        assert!(looks_like_dataset_name("rpool"));
        assert!(looks_like_dataset_name("rpool/ROOT/ubuntu_js6lvu"));
        assert!(looks_like_dataset_name("tank/data.v2"));

        assert!(!looks_like_dataset_name(""));
        assert!(!looks_like_dataset_name("pool//dataset"));
        assert!(!looks_like_dataset_name("-pool/dataset"));
        assert!(!looks_like_dataset_name("pool/space here"));
        assert!(!looks_like_dataset_name("pool/dataset@shadow"));
    }
}
