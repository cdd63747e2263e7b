//! Lifecycle controller: owns the blob store and the semantic index.
//!
//! One controller exists per process; HTTP handlers receive it by
//! injection. All index access funnels through its lock — writers
//! (ingest, reset, save) take it exclusively, queries share it — so a
//! reader always observes a consistent `(chunks, vectors)` pair.
//! Blob-store mutations stay outside the index lock.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::Serialize;

use crate::error::Result;
use crate::index::{IndexedChunk, IngestStats, SearchMatch, SemanticIndex};
use crate::store::{BlobStore, Partition};

/// Sentinel filename used by the writability probe.
const WRITE_PROBE: &str = ".writable_probe";

/// Chunks included in a debug snapshot.
const DEBUG_SAMPLE_CHUNKS: usize = 10;

/// Per-partition slice of a storage status report.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStatus {
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub filename: String,
    pub doc_id: String,
    pub size_bytes: u64,
}

/// Overview of files across all partitions.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStatus {
    pub summary: BTreeMap<String, PartitionStatus>,
    pub total_files: usize,
    pub total_size_bytes: u64,
}

/// Writability probe result for one partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionHealth {
    pub directory: String,
    pub exists: bool,
    pub writable: bool,
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub partitions: BTreeMap<String, PartitionHealth>,
}

/// Truncated view of one chunk for debug output.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPreview {
    pub section_id: String,
    pub doc_id: String,
    pub filename: String,
    pub title: String,
    pub pdf_name: String,
    pub content_preview: String,
}

/// Introspection snapshot of storage and index state.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub total_pdf_files: usize,
    pub index_chunks: usize,
    pub vector_shape: String,
    pub meta_exists: bool,
    pub vectors_exists: bool,
    pub sample_chunks: Vec<ChunkPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetVerification {
    pub remaining_files: usize,
    pub remaining_sections: usize,
}

/// Outcome of the nuclear clear.
#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub files_removed: usize,
    pub verification: ResetVerification,
    pub errors: Vec<String>,
    pub complete: bool,
}

/// Process-wide owner of the store and the index.
#[derive(Debug)]
pub struct LifecycleController {
    store: BlobStore,
    index: RwLock<SemanticIndex>,
}

impl LifecycleController {
    pub fn new(store: BlobStore, index: SemanticIndex) -> Self {
        Self {
            store,
            index: RwLock::new(index),
        }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    /// Run a closure under the shared index lock.
    pub fn with_index<R>(&self, f: impl FnOnce(&SemanticIndex) -> R) -> R {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Run a closure under the exclusive index lock.
    pub fn with_index_mut<R>(&self, f: impl FnOnce(&mut SemanticIndex) -> R) -> R {
        let mut guard = self.index.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Ingest `(doc_id, path)` pairs under the exclusive lock.
    pub fn ingest(&self, items: &[(String, PathBuf)]) -> Result<IngestStats> {
        self.with_index_mut(|index| index.ingest_documents(items))
    }

    /// Query under the shared lock.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchMatch>> {
        self.with_index(|index| index.query(text, k))
    }

    /// Filesystem-only overview of all partitions.
    pub fn status(&self) -> StorageStatus {
        let mut summary = BTreeMap::new();
        let mut total_files = 0;
        let mut total_size_bytes = 0;
        for partition in Partition::ALL {
            let files = self.store.list(Some(partition));
            let size: u64 = files.iter().map(|f| f.size).sum();
            total_files += files.len();
            total_size_bytes += size;
            summary.insert(
                partition.prefix().to_string(),
                PartitionStatus {
                    file_count: files.len(),
                    total_size_bytes: size,
                    files: files
                        .into_iter()
                        .map(|f| FileSummary {
                            filename: f.filename,
                            doc_id: f.doc_id,
                            size_bytes: f.size,
                        })
                        .collect(),
                },
            );
        }
        StorageStatus {
            summary,
            total_files,
            total_size_bytes,
        }
    }

    /// Probe each partition for existence and writability by creating and
    /// deleting a sentinel file.
    pub fn health(&self) -> HealthReport {
        let mut partitions = BTreeMap::new();
        let mut healthy = true;
        for partition in Partition::ALL {
            let dir = self.store.partition_dir(partition);
            let exists = dir.is_dir();
            let writable = exists && {
                let probe = dir.join(WRITE_PROBE);
                match fs::write(&probe, b"probe") {
                    Ok(()) => {
                        let _ = fs::remove_file(&probe);
                        true
                    }
                    Err(_) => false,
                }
            };
            let ok = exists && writable;
            healthy &= ok;
            partitions.insert(
                partition.prefix().to_string(),
                PartitionHealth {
                    directory: dir.display().to_string(),
                    exists,
                    writable,
                    healthy: ok,
                },
            );
        }
        HealthReport {
            healthy,
            partitions,
        }
    }

    /// Move legacy flat-layout PDFs into the viewer partition.
    pub fn migrate(&self) -> usize {
        self.store.migrate_legacy()
    }

    /// Snapshot of storage and index internals.
    pub fn debug_snapshot(&self) -> DebugReport {
        let total_pdf_files = self.store.list(None).len();
        self.with_index(|index| {
            let (rows, dim) = index.shape();
            let (meta_exists, vectors_exists) = index.artifacts_exist();
            DebugReport {
                total_pdf_files,
                index_chunks: index.len(),
                vector_shape: if rows == 0 {
                    "empty".to_string()
                } else {
                    format!("({rows}, {dim})")
                },
                meta_exists,
                vectors_exists,
                sample_chunks: index
                    .sample_chunks(DEBUG_SAMPLE_CHUNKS)
                    .iter()
                    .map(chunk_preview)
                    .collect(),
            }
        })
    }

    /// The nuclear clear: wipe the index artifacts, wipe every partition,
    /// install a fresh empty index, and verify nothing remains.
    ///
    /// Holds the exclusive lock end to end. Partial failures are reported,
    /// never swallowed; callers may retry.
    pub fn nuclear_clear(&self) -> ResetReport {
        let mut guard = self.index.write().unwrap_or_else(|e| e.into_inner());
        let mut errors = Vec::new();

        if let Err(e) = guard.reset() {
            errors.push(format!("index reset: {e}"));
        }

        let mut files_removed = 0;
        for partition in Partition::ALL {
            let dir = self.store.partition_dir(partition).to_path_buf();
            let count = self.store.list(Some(partition)).len();
            if dir.exists() {
                match fs::remove_dir_all(&dir) {
                    Ok(()) => files_removed += count,
                    Err(e) => errors.push(format!(
                        "clear {} partition: {e}",
                        partition.prefix()
                    )),
                }
            }
            if let Err(e) = fs::create_dir_all(&dir) {
                errors.push(format!(
                    "recreate {} partition: {e}",
                    partition.prefix()
                ));
            }
        }

        let remaining_files = self.store.list(None).len();
        let remaining_sections = guard.len();
        if remaining_files > 0 || remaining_sections > 0 {
            tracing::warn!(
                remaining_files,
                remaining_sections,
                "nuclear clear left residue"
            );
        } else {
            tracing::info!(files_removed, "nuclear clear complete");
        }

        ResetReport {
            files_removed,
            complete: remaining_files == 0 && remaining_sections == 0 && errors.is_empty(),
            verification: ResetVerification {
                remaining_files,
                remaining_sections,
            },
            errors,
        }
    }
}

fn chunk_preview(chunk: &IndexedChunk) -> ChunkPreview {
    ChunkPreview {
        section_id: chunk.section_id.clone(),
        doc_id: chunk.doc_id.clone(),
        filename: chunk.filename.clone(),
        title: crate::chunker::truncate_chars(&chunk.title, 50),
        pdf_name: chunk.pdf_name.clone(),
        content_preview: crate::chunker::truncate_chars(&chunk.text, 100),
    }
}
