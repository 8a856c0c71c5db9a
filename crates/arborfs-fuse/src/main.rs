//! arborfs binary.
//!
//! Usage:
//!   # Mount, serve until Ctrl-C or `fusermount -u`, save on the way out
//!   arborfs mount /mnt/arbor --image data.img
//!
//!   # Print an image as JSON
//!   arborfs inspect --image data.img
//!
//! Logging goes to stderr; set `RUST_LOG=arborfs_kernel=debug` to see every
//! failed operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use arborfs_kernel::{Engine, FsConfig};

/// In-memory filesystem persisted to a single image file.
#[derive(Parser, Debug)]
#[command(name = "arborfs", version)]
#[command(about = "In-memory FUSE filesystem persisted to a single image file")]
struct Cli {
    #[command(flatten)]
    fs: FsArgs,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand. Flags override the config file.
#[derive(Args, Debug)]
struct FsArgs {
    /// Backing image file
    #[arg(long, global = true, visible_alias = "filedisk")]
    image: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum content length of one file, in bytes
    #[arg(long, global = true)]
    max_file_size: Option<usize>,

    /// Maximum number of entries in one directory
    #[arg(long, global = true)]
    max_entries: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount the filesystem and serve until interrupted or unmounted
    Mount {
        /// Directory to mount on
        mountpoint: PathBuf,

        /// Let other users access the mount
        #[arg(long)]
        allow_other: bool,
    },

    /// Print the image tree as JSON
    Inspect,
}

impl FsArgs {
    fn resolve(&self) -> Result<FsConfig> {
        let mut config = match &self.config {
            Some(path) => FsConfig::load(path)?,
            None => FsConfig::default(),
        };
        if let Some(image) = &self.image {
            config.image_path = image.clone();
        }
        if let Some(size) = self.max_file_size {
            config.limits.max_file_size = size;
        }
        if let Some(entries) = self.max_entries {
            config.limits.max_entries = entries;
        }
        config.limits.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.fs.resolve()?;

    match cli.command {
        Command::Mount {
            mountpoint,
            allow_other,
        } => mount(config, &mountpoint, allow_other).await,
        Command::Inspect => inspect(config),
    }
}

fn inspect(config: FsConfig) -> Result<()> {
    if !config.image_path.exists() {
        bail!("no image at {}", config.image_path.display());
    }
    let engine = Engine::init(config).context("failed to load image")?;
    let report = arborfs_fuse::inspect::report(&engine)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(feature = "fuse")]
async fn mount(config: FsConfig, mountpoint: &Path, allow_other: bool) -> Result<()> {
    use std::sync::Arc;

    use anyhow::anyhow;
    use arborfs_fuse::fuse::{ArborFs, spawn_mount};
    use tokio::sync::oneshot;

    let engine = Arc::new(Engine::init(config).context("failed to load image")?);
    let (tx, mut rx) = oneshot::channel();
    let fs = ArborFs::new(Arc::clone(&engine)).notify_on_destroy(tx);
    let session = spawn_mount(fs, mountpoint, allow_other)
        .with_context(|| format!("mount {}", mountpoint.display()))?;
    tracing::info!(mountpoint = %mountpoint.display(), "serving; Ctrl-C to unmount");

    let saved = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupted, unmounting");
            // Joining unmounts; the adapter saves from its destroy hook.
            session.join();
            rx.await
        }
        saved = &mut rx => {
            tracing::info!("unmounted externally");
            drop(session);
            saved
        }
    };

    match saved {
        Ok(result) => result.context("image not saved"),
        Err(_) => Err(anyhow!("filesystem stopped without saving the image")),
    }
}

#[cfg(not(feature = "fuse"))]
async fn mount(config: FsConfig, mountpoint: &Path, allow_other: bool) -> Result<()> {
    let _ = (config, mountpoint, allow_other);
    bail!("fuse support disabled; rebuild arborfs with --features fuse")
}
