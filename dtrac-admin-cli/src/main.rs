//! DTrac Administration CLI

mod watch;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dtrac_core::config::CONFIG_FILE;
use dtrac_core::{
    Backend, BackendConfig, Config, DiskBackend, Environment, Repository, WritableBackend,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dtrac-admin")]
#[command(author = "DTrac Contributors")]
#[command(version = "0.1.0")]
#[command(about = "DTrac repository and revision cache administration tool")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new disk repository and write its configuration
    Init { path: PathBuf },

    /// Commit local files into the repository
    Commit {
        /// Store a local file at a repository path (DEST=SRC)
        #[arg(long = "put", value_name = "DEST=SRC")]
        put: Vec<String>,
        /// Create a directory
        #[arg(long)]
        mkdir: Vec<String>,
        /// Delete a file or directory
        #[arg(long)]
        delete: Vec<String>,
        /// Copy a path from an older revision (FROM@REV=TO)
        #[arg(long = "copy", value_name = "FROM@REV=TO")]
        copy: Vec<String>,
        /// Move a path (FROM=TO)
        #[arg(long = "move", value_name = "FROM=TO")]
        rename: Vec<String>,
        #[arg(short, long, default_value = "admin")]
        author: String,
        #[arg(short, long)]
        message: String,
    },

    /// Bring the revision cache up to date
    Sync,

    /// Rebuild the revision cache from scratch
    Resync,

    /// Show cached revisions, newest first
    Log {
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
        /// Print JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the changes made by one revision
    Changeset { rev: u64 },

    /// Print a file's content
    Cat {
        path: String,
        #[arg(short, long)]
        rev: Option<u64>,
    },

    /// Print the youngest revision of the repository and of the cache
    Youngest,

    /// Keep the cache in sync until interrupted
    Watch {
        /// Seconds between syncs
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    match cli.command {
        Commands::Init { path } => init(&path)?,

        Commands::Commit {
            put,
            mkdir,
            delete,
            copy,
            rename,
            author,
            message,
        } => {
            let config = load_config(&cli.config)?;
            let backend = match &config.backend {
                BackendConfig::Disk { path } => DiskBackend::open_existing(path)
                    .with_context(|| format!("Failed to open repository {}", path.display()))?,
                BackendConfig::Memory => bail!("Cannot commit to an in-memory repository"),
            };
            for dir in &mkdir {
                backend.mkdir(dir)?;
            }
            for pair in &copy {
                let (from, to) = split_pair(pair)?;
                let (from, rev) = from
                    .rsplit_once('@')
                    .with_context(|| format!("Missing @REV in {}", pair))?;
                let rev: u64 = rev
                    .parse()
                    .with_context(|| format!("Invalid revision in {}", pair))?;
                backend.copy(from, rev, to)?;
            }
            for pair in &rename {
                let (from, to) = split_pair(pair)?;
                backend.rename(from, to)?;
            }
            for pair in &put {
                let (dest, src) = split_pair(pair)?;
                let data = std::fs::read(src).with_context(|| format!("Failed to read {}", src))?;
                backend.add_file(dest, data, false)?;
            }
            for path in &delete {
                backend.delete(path)?;
            }
            let rev = backend.commit(&author, &message, chrono::Utc::now().timestamp())?;
            println!("Committed revision {}", rev);
        }

        Commands::Sync => {
            let mut env = open_env(&cli.config, false)?;
            let report = env.sync()?;
            if report.is_noop() {
                println!("Cache already at revision {}", report.to_rev);
            } else {
                println!(
                    "Synced revisions {}..{} ({} node changes)",
                    report.from_rev + 1,
                    report.to_rev,
                    report.changes
                );
            }
            env.close()?;
        }

        Commands::Resync => {
            let mut env = open_env(&cli.config, false)?;
            let report = env.resync()?;
            println!(
                "Rebuilt cache: {} revisions, {} node changes",
                report.revisions, report.changes
            );
            env.close()?;
        }

        Commands::Log { from, to, json } => {
            let env = open_env(&cli.config, true)?;
            let youngest = env.cache().youngest_stored()?.unwrap_or(0);
            let (lo, hi) = (from.unwrap_or(1), to.unwrap_or(youngest));
            for rev in env.cache().cached_revisions(lo.min(hi), lo.max(hi))? {
                let changes = env.cache().node_changes(rev.rev)?;
                if json {
                    let paths: Vec<serde_json::Value> = changes
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "path": c.path,
                                "kind": c.kind.code(),
                                "change": c.change,
                                "base_path": c.base_path,
                                "base_rev": c.base_rev,
                            })
                        })
                        .collect();
                    let line = serde_json::json!({
                        "rev": rev.rev,
                        "time": rev.time,
                        "author": rev.author,
                        "message": rev.message,
                        "changes": paths,
                    });
                    println!("{}", line);
                } else {
                    println!(
                        "r{} | {} | {}",
                        rev.rev,
                        rev.author,
                        format_time(rev.time)
                    );
                    for c in &changes {
                        match (&c.base_path, c.base_rev) {
                            (Some(base), Some(base_rev)) => {
                                println!("   {} {} (from {}@{})", c.change, c.path, base, base_rev)
                            }
                            _ => println!("   {} {}", c.change, c.path),
                        }
                    }
                    println!("{}\n", rev.message);
                }
            }
            env.close()?;
        }

        Commands::Changeset { rev } => {
            let env = open_env(&cli.config, false)?;
            let changeset = env.repository().get_changeset(rev)?;
            println!(
                "r{} | {} | {}",
                changeset.rev,
                changeset.author,
                format_time(changeset.date)
            );
            for change in changeset.changes() {
                match (&change.base_path, change.base_rev) {
                    (Some(base), Some(base_rev)) => println!(
                        "   {} {} (from {}@{})",
                        change.action, change.path, base, base_rev
                    ),
                    _ => println!("   {} {}", change.action, change.path),
                }
            }
            println!("{}", changeset.message);
            env.close()?;
        }

        Commands::Cat { path, rev } => {
            let env = open_env(&cli.config, false)?;
            let node = env.repository().get_node(&path, rev)?;
            if node.is_directory() {
                bail!("{} is a directory", node.path);
            }
            let content = node.content()?;
            print!("{}", String::from_utf8_lossy(&content));
            env.close()?;
        }

        Commands::Youngest => {
            let env = open_env(&cli.config, false)?;
            let repo = env.repository().youngest_rev()?;
            let cached = env
                .repository()
                .youngest_rev_in_cache(env.cache().connection())?;
            match cached {
                Some(cached) => println!("repository r{}, cache r{}", repo, cached),
                None => println!("repository r{}, cache empty", repo),
            }
            env.close()?;
        }

        Commands::Watch { interval } => {
            let config = load_config(&cli.config)?;
            watch::run(config, interval).await?;
        }
    }

    Ok(())
}

fn init(path: &Path) -> Result<()> {
    println!("Initializing repository at {}", path.display());
    let backend = DiskBackend::open(path)
        .with_context(|| format!("Failed to create repository at {}", path.display()))?;
    let config_path = path.join(CONFIG_FILE);
    Config::for_disk_repository(path)
        .save(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("Wrote configuration to {}", config_path.display());
    println!(
        "Repository initialized successfully (UUID: {})",
        backend.uuid()
    );
    println!("Use --config {} for further commands", config_path.display());
    Ok(())
}

/// Every command but `init` needs an existing configuration
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!(
            "Config file {} not found; run `dtrac-admin init <repo>` or pass --config",
            path.display()
        );
    }
    Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn open_env(path: &Path, sync_on_open: bool) -> Result<Environment> {
    let mut config = load_config(path)?;
    config.sync_on_open = config.sync_on_open && sync_on_open;
    Environment::open(config).context("Failed to open environment")
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .with_context(|| format!("Expected LEFT=RIGHT, got {}", pair))
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_else(|| secs.to_string())
}
