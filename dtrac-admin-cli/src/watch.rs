//! Periodic cache sync
//!
//! Each tick opens a fresh environment on a blocking thread, syncs and
//! closes it. Ticks never overlap; a failed sync is logged and retried on
//! the next tick.

use anyhow::{Context, Result};
use dtrac_core::{Config, Environment, SyncReport};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, warn};

pub async fn run(config: Config, interval_secs: u64) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("Watching repository, syncing every {}s", interval_secs.max(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sync_once(config.clone()).await {
                    Ok(report) if report.is_noop() => debug!("Cache up to date at r{}", report.to_rev),
                    Ok(report) => info!(
                        "Cached revisions {}..{}",
                        report.from_rev + 1,
                        report.to_rev
                    ),
                    Err(e) => warn!("Sync failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

async fn sync_once(mut config: Config) -> Result<SyncReport> {
    config.sync_on_open = false;
    task::spawn_blocking(move || -> Result<SyncReport> {
        let mut env = Environment::open(config).context("Failed to open environment")?;
        let report = env.sync()?;
        env.close()?;
        Ok(report)
    })
    .await
    .context("Sync task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtrac_core::{DiskBackend, WritableBackend};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sync_once_catches_up() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let backend = DiskBackend::open(&repo).unwrap();
        backend.add_file("/a.txt", b"a".to_vec(), false).unwrap();
        backend.commit("alice", "add", 100).unwrap();

        let config = Config::for_disk_repository(&repo);
        let report = sync_once(config.clone()).await.unwrap();
        assert_eq!(report.revisions, 1);

        let again = sync_once(config).await.unwrap();
        assert!(again.is_noop());
    }
}
