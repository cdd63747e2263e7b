//! Background TTL sweeper over the PDF partitions.
//!
//! Wakes on a fixed interval, deletes `.pdf` files whose modification age
//! exceeds the TTL, logs per-file failures, and never crashes. Disabled
//! entirely when the TTL is zero — files are then only deleted via the
//! API.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

use crate::config::ServerConfig;

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub removed: usize,
    pub errors: usize,
}

/// Delete expired PDFs under `dirs`; one pass.
pub fn sweep_once(dirs: &[PathBuf], ttl: Duration) -> SweepStats {
    let now = SystemTime::now();
    let mut stats = SweepStats::default();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "sweeper cannot read dir");
                stats.errors += 1;
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|e| e != "pdf") {
                continue;
            }
            let age = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|mtime| now.duration_since(mtime).ok());
            let Some(age) = age else { continue };
            if age > ttl {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        stats.removed += 1;
                        tracing::info!(path = %path.display(), "deleted expired pdf");
                    }
                    Err(e) => {
                        stats.errors += 1;
                        tracing::warn!(path = %path.display(), error = %e, "sweeper delete failed");
                    }
                }
            }
        }
    }
    stats
}

/// Spawn the sweeper task, or return `None` when the TTL disables it.
pub fn spawn(config: &ServerConfig) -> Option<JoinHandle<()>> {
    if !config.sweeper_enabled() {
        tracing::info!("store sweeper disabled (STORE_TTL_SECONDS <= 0)");
        return None;
    }
    let dirs = config.partition_dirs();
    let ttl = Duration::from_secs(config.ttl_seconds);
    let period = Duration::from_secs(config.sweep_interval_seconds.max(1));
    tracing::info!(
        ttl_seconds = config.ttl_seconds,
        interval_seconds = config.sweep_interval_seconds,
        "store sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let stats = sweep_once(&dirs, ttl);
            if stats.removed > 0 || stats.errors > 0 {
                tracing::debug!(removed = stats.removed, errors = stats.errors, "sweep pass");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_files_survive_long_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = tmp.path().join("doc.pdf");
        std::fs::write(&pdf, b"pdf").unwrap();

        let stats = sweep_once(&[tmp.path().to_path_buf()], Duration::from_secs(3600));
        assert_eq!(stats.removed, 0);
        assert!(pdf.exists());
    }

    #[test]
    fn test_zero_ttl_pass_removes_everything_aged() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = tmp.path().join("doc.pdf");
        std::fs::write(&pdf, b"pdf").unwrap();
        // Any nonzero age exceeds a zero TTL.
        std::thread::sleep(Duration::from_millis(20));

        let stats = sweep_once(&[tmp.path().to_path_buf()], Duration::ZERO);
        assert_eq!(stats.removed, 1);
        assert!(!pdf.exists());
    }

    #[test]
    fn test_non_pdf_files_are_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tmp.path().join("keep.txt");
        std::fs::write(&other, b"text").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        sweep_once(&[tmp.path().to_path_buf()], Duration::ZERO);
        assert!(other.exists());
    }

    #[test]
    fn test_missing_dir_counts_as_error() {
        let stats = sweep_once(
            &[PathBuf::from("/definitely/not/here")],
            Duration::from_secs(1),
        );
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.removed, 0);
    }
}
