//! Shared utility functions for CLI commands

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use console::style;
use miette::IntoDiagnostic;
use sherpack_kube::storage::{StorageBackend, StorageConfig, StorageDriver};

use crate::error::{CliError, Result};

/// Resolve `--storage-driver` into a concrete, boxed driver.
///
/// Defaults to `secrets` (Helm-equivalent in-cluster storage) when `driver`
/// is `None`; `file` is the opt-in backend for working without a reachable
/// cluster. `file_dir` is only consulted by the `file` backend.
pub async fn open_storage(
    driver: Option<&str>,
    file_dir: PathBuf,
) -> Result<Box<dyn StorageDriver>> {
    let backend = match driver {
        Some(s) => StorageBackend::from_str(s).into_diagnostic()?,
        None => StorageBackend::default(),
    };
    Ok(backend
        .build(StorageConfig::default(), file_dir)
        .await
        .into_diagnostic()?)
}

/// Default on-disk location for the `file` storage backend.
#[must_use]
pub fn default_file_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sherpack")
        .join("releases")
}

/// Race `operation` against a Ctrl-C signal.
///
/// Every state-changing command (install/upgrade/rollback/uninstall) goes
/// through this so a caller interrupt is handled the same way a crash
/// would be: the in-progress revision is left in its `Pending-*` state
/// rather than silently killed mid-apply, and `sherpack recover <name>`
/// is the documented way to unblock it afterwards (see `recover.rs`).
pub async fn run_cancellable<F>(
    release_name: &str,
    operation: &str,
    future: F,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = future => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!(
                "\n{} {} on {} interrupted; the in-progress revision is left Pending",
                style("⚠").yellow().bold(),
                operation,
                style(release_name).cyan(),
            );
            Err(CliError::Cancelled {
                operation: operation.to_string(),
                name: release_name.to_string(),
            })
        }
    }
}

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Safely truncate a hash string to a maximum length
///
/// Returns the entire string if it's shorter than `max_len`.
/// This avoids panics from direct slice indexing on potentially short strings.
#[must_use]
pub fn truncate_hash(hash: &str, max_len: usize) -> &str {
    let end = hash.len().min(max_len);
    &hash[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_kb() {
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10240), "10.00 KB");
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(5242880), "5.00 MB");
    }

    #[test]
    fn test_format_size_gb() {
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_truncate_hash_normal() {
        let hash = "abcdef1234567890abcdef1234567890";
        assert_eq!(truncate_hash(hash, 16), "abcdef1234567890");
        assert_eq!(truncate_hash(hash, 8), "abcdef12");
    }

    #[test]
    fn test_truncate_hash_short() {
        let hash = "abc";
        assert_eq!(truncate_hash(hash, 16), "abc");
        assert_eq!(truncate_hash(hash, 3), "abc");
    }

    #[test]
    fn test_truncate_hash_empty() {
        assert_eq!(truncate_hash("", 16), "");
    }
}
