//! Content-addressed blob store for uploaded PDFs.
//!
//! Three partitions (`bulk`, `fresh`, `viewer`) each map to their own
//! directory under the store root. A document is identified by the first 16
//! hex characters of the SHA-1 of its bytes, so identical uploads land on the
//! same id regardless of filename. File naming is
//! `<partition>_<sanitized>_<doc_id>[.<n>].pdf`; the counter only appears
//! when an unrelated file already occupies the name.
//!
//! All operations are filesystem-only (no index consultation) and report
//! per-file failures instead of aborting; callers always get back whatever
//! could be done.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{CoreError, Result};

/// Length of the hex document fingerprint.
pub const DOC_ID_LEN: usize = 16;

/// A storage compartment with its own directory and filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Bulk,
    Fresh,
    Viewer,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Bulk, Partition::Fresh, Partition::Viewer];

    /// Filename prefix and canonical name of this partition.
    pub fn prefix(self) -> &'static str {
        match self {
            Partition::Bulk => "bulk",
            Partition::Fresh => "fresh",
            Partition::Viewer => "viewer",
        }
    }

    /// Directory name under the store root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Bulk => "bulk_uploads",
            Partition::Fresh => "fresh_uploads",
            Partition::Viewer => "viewer_uploads",
        }
    }

    /// Parse a user-supplied partition name.
    pub fn parse(name: &str) -> Option<Partition> {
        match name {
            "bulk" => Some(Partition::Bulk),
            "fresh" => Some(Partition::Fresh),
            "viewer" => Some(Partition::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One stored PDF as seen on the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub doc_id: String,
    pub path: PathBuf,
    pub partition: Partition,
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub modified: u64,
}

/// Per-partition outcome of a `clear_all`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionClearStats {
    pub files_removed: usize,
    pub errors: Vec<String>,
}

/// Aggregate outcome of a `clear_all`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearStats {
    pub total_removed: usize,
    pub partitions: BTreeMap<String, PartitionClearStats>,
}

/// Partitioned on-disk storage for uploaded PDFs.
#[derive(Debug)]
pub struct BlobStore {
    base: PathBuf,
    dirs: [PathBuf; 3],
}

impl BlobStore {
    /// Open a store rooted at `base` with the default partition layout,
    /// creating directories as needed.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base: PathBuf = base.into();
        let dirs = [
            base.join(Partition::Bulk.dir_name()),
            base.join(Partition::Fresh.dir_name()),
            base.join(Partition::Viewer.dir_name()),
        ];
        Self::with_dirs(base, dirs)
    }

    /// Open a store with explicit per-partition directories (env overrides).
    pub fn with_partition_dirs(
        base: impl Into<PathBuf>,
        bulk: impl Into<PathBuf>,
        fresh: impl Into<PathBuf>,
        viewer: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::with_dirs(base.into(), [bulk.into(), fresh.into(), viewer.into()])
    }

    fn with_dirs(base: PathBuf, dirs: [PathBuf; 3]) -> Result<Self> {
        fs::create_dir_all(&base).map_err(|e| CoreError::persistence("create store root", e))?;
        for dir in &dirs {
            fs::create_dir_all(dir)
                .map_err(|e| CoreError::persistence("create partition dir", e))?;
        }
        Ok(Self { base, dirs })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn partition_dir(&self, partition: Partition) -> &Path {
        match partition {
            Partition::Bulk => &self.dirs[0],
            Partition::Fresh => &self.dirs[1],
            Partition::Viewer => &self.dirs[2],
        }
    }

    /// Fingerprint for a document: first 16 hex chars of SHA-1 of the bytes.
    pub fn doc_id_for(bytes: &[u8]) -> String {
        let digest = Sha1::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hex[..DOC_ID_LEN].to_string()
    }

    /// Store `bytes` in `partition` and return the document id.
    ///
    /// A file already holding this partition+doc_id pair is left untouched,
    /// so re-uploading identical bytes is a no-op.
    pub fn put(
        &self,
        bytes: &[u8],
        original_name: Option<&str>,
        partition: Partition,
    ) -> Result<String> {
        let doc_id = Self::doc_id_for(bytes);
        let dir = self.partition_dir(partition);

        if find_by_doc_id(dir, &doc_id).is_some() {
            return Ok(doc_id);
        }

        let dest = match original_name {
            Some(name) => {
                let base = sanitize_filename(name);
                let base = base.strip_suffix(".pdf").unwrap_or(&base).to_string();
                let mut dest = dir.join(format!("{}_{}_{}.pdf", partition.prefix(), base, doc_id));
                let mut counter = 1;
                while dest.exists() {
                    dest = dir.join(format!(
                        "{}_{}_{}.{}.pdf",
                        partition.prefix(),
                        base,
                        doc_id,
                        counter
                    ));
                    counter += 1;
                }
                dest
            }
            None => dir.join(format!("{}_{}.pdf", partition.prefix(), doc_id)),
        };

        fs::write(&dest, bytes).map_err(|e| CoreError::persistence("write pdf", e))?;
        tracing::debug!(doc_id = %doc_id, path = %dest.display(), "stored pdf");
        Ok(doc_id)
    }

    /// Resolve a document id to a path.
    ///
    /// Searches the hinted partition first, then every partition, then the
    /// legacy flat layout under the store root. When nothing matches, the
    /// canonical expected path is returned; callers check existence.
    pub fn get(&self, doc_id: &str, partition: Option<Partition>) -> PathBuf {
        if let Some(p) = partition {
            if let Some(path) = find_by_doc_id(self.partition_dir(p), doc_id) {
                return path;
            }
        }
        for p in Partition::ALL {
            if let Some(path) = find_by_doc_id(self.partition_dir(p), doc_id) {
                return path;
            }
        }

        // Legacy flat layout, pre-partitioning.
        let legacy = self.base.join(format!("{doc_id}.pdf"));
        if legacy.exists() {
            return legacy;
        }

        let expected = partition.unwrap_or(Partition::Fresh);
        self.partition_dir(expected)
            .join(format!("{}_{}.pdf", expected.prefix(), doc_id))
    }

    /// List stored PDFs, optionally restricted to one partition.
    pub fn list(&self, partition: Option<Partition>) -> Vec<StoredFile> {
        let partitions: Vec<Partition> = match partition {
            Some(p) => vec![p],
            None => Partition::ALL.to_vec(),
        };

        let mut files = Vec::new();
        for p in partitions {
            let dir = self.partition_dir(p);
            for entry in pdf_entries(dir) {
                let filename = entry.file_name().to_string_lossy().into_owned();
                let path = entry.path();
                let doc_id = doc_id_from_filename(&filename).unwrap_or_default();
                let (size, modified) = match entry.metadata() {
                    Ok(meta) => (meta.len(), epoch_secs(meta.modified().ok())),
                    Err(_) => (0, 0),
                };
                files.push(StoredFile {
                    filename,
                    doc_id,
                    path,
                    partition: p,
                    size,
                    modified,
                });
            }
        }
        files
    }

    /// Delete a document by id. Returns whether a file was removed.
    pub fn delete(&self, doc_id: &str, partition: Option<Partition>) -> bool {
        let path = self.get(doc_id, partition);
        if path.exists() {
            match fs::remove_file(&path) {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete pdf");
                }
            }
        }
        false
    }

    /// Remove every `.pdf` in every partition, reporting per-partition
    /// counts and errors. Partial success is allowed.
    pub fn clear_all(&self) -> ClearStats {
        let mut stats = ClearStats::default();
        for p in Partition::ALL {
            let dir = self.partition_dir(p);
            let mut part = PartitionClearStats::default();
            for entry in pdf_entries(dir) {
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => {
                        part.files_removed += 1;
                        stats.total_removed += 1;
                    }
                    Err(e) => part
                        .errors
                        .push(format!("failed to remove {}: {e}", path.display())),
                }
            }
            stats.partitions.insert(p.prefix().to_string(), part);
        }
        stats
    }

    /// Move any `.pdf` left in the flat store root into the viewer partition
    /// with a `viewer_` prefix, skipping collisions. Returns the count moved.
    pub fn migrate_legacy(&self) -> usize {
        let mut migrated = 0;
        for entry in pdf_entries(&self.base) {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let dest = self
                .partition_dir(Partition::Viewer)
                .join(format!("viewer_{filename}"));
            if dest.exists() {
                continue;
            }
            match fs::rename(entry.path(), &dest) {
                Ok(()) => {
                    migrated += 1;
                    tracing::info!(file = %filename, "migrated legacy pdf to viewer partition");
                }
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "legacy migration failed");
                }
            }
        }
        migrated
    }
}

/// Keep alphanumerics, space, `-`, `_`, `.`; spaces become underscores.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    kept.trim_end().replace(' ', "_")
}

/// Extract the document id from a stored filename, if it follows the
/// `<partition>_<base>_<doc_id>[.<n>].pdf` scheme.
pub fn doc_id_from_filename(filename: &str) -> Option<String> {
    let stem = filename.strip_suffix(".pdf")?;
    // Strip a collision counter suffix.
    let stem = match stem.rfind('.') {
        Some(i) if stem[i + 1..].chars().all(|c| c.is_ascii_digit()) => &stem[..i],
        _ => stem,
    };
    let tail = stem.rsplit('_').next()?;
    (tail.len() == DOC_ID_LEN && tail.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| tail.to_string())
}

fn find_by_doc_id(dir: &Path, doc_id: &str) -> Option<PathBuf> {
    if doc_id.is_empty() {
        return None;
    }
    pdf_entries(dir)
        .into_iter()
        .find(|e| e.file_name().to_string_lossy().contains(doc_id))
        .map(|e| e.path())
}

fn pdf_entries(dir: &Path) -> Vec<fs::DirEntry> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<fs::DirEntry> = entries
        .flatten()
        .filter(|e| {
            e.path().is_file() && e.file_name().to_string_lossy().ends_with(".pdf")
        })
        .collect();
    out.sort_by_key(|e| e.file_name());
    out
}

fn epoch_secs(time: Option<std::time::SystemTime>) -> u64 {
    time.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
