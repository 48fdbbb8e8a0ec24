//! modvfs: inspect a mod's layered asset filesystem.
//!
//! Usage:
//!   # List mounted packages for the configured mod
//!   cargo run -p modvfs-cli -- mounts
//!
//!   # Resolve and print a file, with another mod active
//!   cargo run -p modvfs-cli -- --mod cnc cat rules.yaml
//!
//!   # Show which package serves a path
//!   cargo run -p modvfs-cli -- which core|maps/a.map
//!
//! Set RUST_LOG=modvfs=debug to trace mounts.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{EnvFilter, fmt};

use modvfs::VirtualFileSystem;

use crate::config::Config;

/// Inspect a mod's layered asset filesystem.
#[derive(Parser, Debug)]
#[command(name = "modvfs")]
#[command(about = "Resolve paths through a mod's mounted packages")]
struct Args {
    /// Config file describing the store and installed mods
    #[arg(short, long, default_value = "modvfs.ron")]
    config: PathBuf,

    /// Mod to load instead of the config's active mod
    #[arg(short = 'm', long = "mod")]
    mod_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List mounted packages in resolution order
    Mounts,
    /// Write a file's bytes to stdout
    Cat { path: String },
    /// Report whether a path resolves
    Exists { path: String },
    /// Show the package that serves a path
    Which { path: String },
    /// List the contents of a path opened as a package
    Ls { path: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries file contents, so logs go to stderr
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).await?;
    let base = args.config.parent().unwrap_or(Path::new("."));

    let store = config.build_store(base).await?;
    let mods = config.installed_mods(&store);
    let mod_id = args.mod_id.unwrap_or_else(|| config.active_mod.clone());

    let mut vfs = VirtualFileSystem::new(store).with_mods(mod_id.clone(), mods);
    vfs.load_active_mod()
        .await
        .with_context(|| format!("loading mod '{mod_id}'"))?;
    tracing::info!(mod_id = %mod_id, mounts = vfs.mount_count(), "mod loaded");

    run(&vfs, args.command).await
}

async fn run(vfs: &VirtualFileSystem, command: Command) -> Result<ExitCode> {
    match command {
        Command::Mounts => {
            for mount in vfs.mounts() {
                let scope = if mount.global { "global" } else { "namespace" };
                match mount.alias {
                    Some(alias) => println!("{:>3}  {scope:<9}  {}  ({alias})", mount.ref_count, mount.name),
                    None => println!("{:>3}  {scope:<9}  {}", mount.ref_count, mount.name),
                }
            }
        }
        Command::Cat { path } => {
            let data = vfs.open(&path).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
        Command::Exists { path } => {
            let found = vfs.exists(&path).await;
            println!("{found}");
            if !found {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Which { path } => match vfs.try_get_package_containing(&path).await {
            Some(found) => println!("{}  {}", found.package.name(), found.path),
            None => {
                eprintln!("{path}: not in the file index");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Ls { path } => {
            let package = vfs.open_package_required(&path).await?;
            let mut contents = package.contents().await?;
            contents.sort();
            for entry in contents {
                println!("{entry}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
