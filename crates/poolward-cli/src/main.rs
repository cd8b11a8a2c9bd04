//! poolward command-line interface for inspecting and managing a ZFS pool.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use poolward_core::{
    config::{PoolwardConfig, DEFAULT_CONFIG_PATH},
    logging,
    model::{Dataset, Filesystem, Snapshot},
    runner::CallOptions,
};
use poolward_zfs::{PoolCall, ShellRunner, Zpool};
use schemars::schema_for;
use serde_json::to_string_pretty;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "poolward",
    version,
    about = "Inspect and manage datasets of a ZFS pool through the zfs/zpool CLIs."
)]
struct Cli {
    /// Path to the poolward configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pool to operate on; overrides pool.name from the configuration.
    #[arg(short, long)]
    pool: Option<String>,

    /// Per-command deadline in seconds; defaults to shell.timeout_secs.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Emit JSON instead of tab-separated rows.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Exit 0 when the dataset exists, 1 otherwise.
    Exists { dataset: String },

    /// List every dataset in the pool in creation order.
    Datasets,

    /// List every filesystem in the pool in creation order.
    Filesystems,

    /// List snapshots of one filesystem in creation order.
    Snapshots { filesystem: String },

    /// Show the clone origin chain of a dataset.
    Lineage { dataset: String },

    /// Create a filesystem (and missing parents) under the pool.
    Create { filesystem: String },

    /// Snapshot a filesystem as <filesystem>@<label>.
    Snapshot { filesystem: String, label: String },

    /// Show a single filesystem.
    Get { filesystem: String },

    /// Print raw `zpool status` output.
    Status,

    /// Print the JSON schema of the configuration file.
    Schema,
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = PoolwardConfig::resolve(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    logging::init(&config.logging.level);

    for issue in config.validate() {
        warn!("configuration: {issue}");
    }

    if let Commands::Schema = cli.command {
        println!("{}", to_string_pretty(&schema_for!(PoolwardConfig))?);
        return Ok(ExitCode::SUCCESS);
    }

    let pool_name = cli
        .pool
        .clone()
        .or_else(|| config.pool_name().map(str::to_string));
    let Some(pool_name) = pool_name else {
        bail!("no pool selected; pass --pool or set pool.name in {}", config.path.display());
    };

    let options = CallOptions {
        timeout: cli.timeout.map(Duration::from_secs),
        cancel: None,
    };
    let runner = ShellRunner::from_config(&config)?;
    let pool = Zpool::open_with(&pool_name, runner, &options)?;
    let call = pool.call(options);

    dispatch(&call, cli.command, cli.json)
}

fn dispatch(call: &PoolCall<'_, ShellRunner>, command: Commands, json: bool) -> Result<ExitCode> {
    match command {
        Commands::Exists { dataset } => {
            let found = call.exists(&dataset);
            if json {
                println!("{}", serde_json::json!({ "dataset": dataset, "exists": found }));
            }
            return Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            });
        }
        Commands::Datasets => {
            let inventory = call.list_datasets()?;
            print_datasets(inventory.as_slice(), json)?;
        }
        Commands::Filesystems => {
            let filesystems = call.list_filesystems()?;
            print_filesystems(&filesystems, json)?;
        }
        Commands::Snapshots { filesystem } => {
            let snapshots = call.list_snapshots(&filesystem)?;
            print_snapshots(&snapshots, json)?;
        }
        Commands::Lineage { dataset } => {
            let inventory = call.list_datasets()?;
            if !inventory.contains(&dataset) {
                bail!("dataset `{dataset}` is not part of pool `{}`", call.pool_name());
            }
            let chain = inventory.lineage(&dataset);
            if json {
                println!("{}", to_string_pretty(&chain)?);
            } else {
                for step in chain {
                    println!("{step}");
                }
            }
        }
        Commands::Create { filesystem } => {
            call.create_filesystem(&filesystem)?;
            println!("created {filesystem}");
        }
        Commands::Snapshot { filesystem, label } => {
            let name = call.create_snapshot(&filesystem, &label)?;
            println!("created {name}");
        }
        Commands::Get { filesystem } => {
            let fs = call.get_filesystem(&filesystem)?;
            print_filesystems(std::slice::from_ref(&fs), json)?;
        }
        Commands::Status => {
            let raw = call.status()?;
            io::stdout().write_all(&raw)?;
        }
        Commands::Schema => bail!("`schema` does not operate on a pool"),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_datasets(datasets: &[Dataset], json: bool) -> Result<()> {
    if json {
        println!("{}", to_string_pretty(datasets)?);
        return Ok(());
    }
    for dataset in datasets {
        println!(
            "{}\t{}\t{}\t{}",
            dataset.name, dataset.kind, dataset.origin, dataset.guid
        );
    }
    Ok(())
}

fn print_filesystems(filesystems: &[Filesystem], json: bool) -> Result<()> {
    if json {
        println!("{}", to_string_pretty(filesystems)?);
        return Ok(());
    }
    for fs in filesystems {
        println!("{}\t{}", fs.name, fs.origin);
    }
    Ok(())
}

fn print_snapshots(snapshots: &[Snapshot], json: bool) -> Result<()> {
    if json {
        println!("{}", to_string_pretty(snapshots)?);
        return Ok(());
    }
    for snapshot in snapshots {
        println!("{}\t{}", snapshot.name, snapshot.guid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_and_snapshot_arguments_parse() {
        let cli = Cli::try_parse_from([
            "poolward",
            "--pool",
            "tank",
            "--timeout",
            "5",
            "--json",
            "snapshot",
            "tank/data",
            "nightly",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.pool.as_deref(), Some("tank"));
        assert_eq!(cli.timeout, Some(5));
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Commands::Snapshot { filesystem, label } => {
                assert_eq!(filesystem, "tank/data");
                assert_eq!(label, "nightly");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["poolward", "--timeout", "0", "status"]).is_err());
        let cli = Cli::try_parse_from(["poolward", "--timeout", "1", "status"])
            .expect("one second should parse");
        assert_eq!(cli.timeout, Some(1));
    }

    #[test]
    fn exists_requires_a_dataset() {
        assert!(Cli::try_parse_from(["poolward", "exists"]).is_err());
    }
}
