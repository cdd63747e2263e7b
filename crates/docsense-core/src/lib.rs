//! docsense-core: structural PDF sectioning and a persistent semantic index.
//!
//! This crate provides:
//! - Partitioned, content-addressed blob storage for uploaded PDFs
//! - Font-driven span analysis and heading/outline extraction
//! - Section building and sentence-aware chunking
//! - Pluggable embeddings with a deterministic hashing fallback
//! - A persistent vector + metadata index with a hybrid relevance scorer
//! - A lifecycle controller tying storage and index together

pub mod chunker;
pub mod embedder;
pub mod error;
pub mod fonts;
pub mod index;
pub mod lifecycle;
pub mod outline;
pub mod sections;
pub mod store;

#[cfg(feature = "model")]
pub mod embedder_bge;

// Re-exports
pub use chunker::{chunk_section, chunk_text, make_snippet, split_sentences};
pub use embedder::{load_default_embedder, EmbedderBackend, HashEmbedder, DEFAULT_DIM};
pub use error::{CoreError, Result};
pub use fonts::{analyze_document, analyze_pdf, FontAnalysis, Span};
pub use index::{
    derive_pdf_name, Confidence, IndexedChunk, IngestStats, SearchMatch, SemanticIndex,
    DEFAULT_SCORE_FLOOR, INDEX_DIR_NAME,
};
pub use lifecycle::{
    DebugReport, HealthReport, LifecycleController, ResetReport, StorageStatus,
};
pub use outline::{
    detect_document_type, extract_outline, DocumentType, Heading, OutlineEntry,
    OutlineExtraction,
};
pub use sections::{build_sections, Section};
pub use store::{BlobStore, ClearStats, Partition, StoredFile};

#[cfg(feature = "model")]
pub use embedder_bge::BgeEmbedder;
