//! Persistent semantic index over document sections.
//!
//! Holds chunk metadata and an `(N, D)` row-major f32 matrix side by side;
//! `chunks[i].vector_offset == i` and `N == chunks.len()` at every
//! quiescent point. Both artifacts persist under one directory
//! (`index.json` + `vectors.bin`) and are written through temp files so a
//! crash leaves either the old pair or the new pair.
//!
//! Queries run a cosine pass over the full matrix, widen to `4k`
//! candidates, then rescore with keyword, length, and heading bonuses,
//! deduplicate near-identical content by fingerprint, and attach a
//! user-readable relevance reason to every match.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::chunker::{chunk_section, make_snippet, truncate_chars};
use crate::embedder::{dot, EmbedderBackend};
use crate::error::{CoreError, Result};
use crate::fonts::analyze_pdf;
use crate::outline::extract_outline;
use crate::sections::{build_sections, Section};

/// Directory under the store root holding the two index artifacts.
pub const INDEX_DIR_NAME: &str = "semantic_index";

/// Metadata artifact filename.
pub const INDEX_META_FILE: &str = "index.json";

/// Vector artifact filename.
pub const INDEX_VECTORS_FILE: &str = "vectors.bin";

/// Magic bytes opening the vectors file.
const VECTORS_MAGIC: &[u8; 4] = b"DSVX";

/// Vectors file format version.
const VECTORS_VERSION: u32 = 1;

/// Default enhanced-score floor below which candidates are dropped.
pub const DEFAULT_SCORE_FLOOR: f32 = 0.05;

/// Characters of content embedded alongside the title.
const EMBED_CONTENT_CHARS: usize = 200;

/// Characters of content hashed into the dedup fingerprint.
const FINGERPRINT_CHARS: usize = 300;

/// The smallest indexed unit: one chunk of a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub section_id: String,
    pub doc_id: String,
    pub filename: String,
    pub page: i32,
    pub title: String,
    pub text: String,
    pub snippet: String,
    pub vector_offset: usize,
    #[serde(default)]
    pub pdf_name: String,
    #[serde(default)]
    pub section_heading: String,
    #[serde(default)]
    pub section_content: String,
}

/// Confidence band derived from the enhanced score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_score(score: f32) -> Self {
        if score > 0.8 {
            Confidence::VeryHigh
        } else if score > 0.6 {
            Confidence::High
        } else if score > 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub filename: String,
    pub page: i32,
    pub title: String,
    pub snippet: String,
    /// Enhanced score: cosine plus keyword/length/heading bonuses.
    pub score: f32,
    /// Raw cosine similarity.
    pub semantic_score: f32,
    pub pdf_name: String,
    pub section_heading: String,
    pub section_content: String,
    pub section_id: String,
    pub relevance_reason: String,
    pub confidence: Confidence,
}

/// Ingest outcome.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestStats {
    pub ingested: usize,
}

#[derive(Serialize)]
struct MetaFileRef<'a> {
    sections: &'a [IndexedChunk],
}

#[derive(Deserialize)]
struct MetaFile {
    sections: Vec<IndexedChunk>,
}

/// Persistent vector + metadata store.
pub struct SemanticIndex {
    dir: PathBuf,
    chunks: Vec<IndexedChunk>,
    /// Row-major `(rows, dim)` matrix.
    vectors: Vec<f32>,
    dim: usize,
    score_floor: f32,
    /// Index-wide section counter feeding section ids.
    next_section: usize,
    embedder: Arc<dyn EmbedderBackend>,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("dir", &self.dir)
            .field("chunks", &self.chunks.len())
            .field("rows", &self.rows())
            .field("dim", &self.dim)
            .finish()
    }
}

impl SemanticIndex {
    /// Open (or create) an index in `dir`, loading any persisted state.
    ///
    /// Load failures are logged and produce a fresh empty index; the store
    /// must stay operational even with corrupt artifacts on disk.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CoreError::persistence("create index dir", e))?;

        let mut index = Self {
            dim: embedder.dim(),
            dir,
            chunks: Vec::new(),
            vectors: Vec::new(),
            score_floor: DEFAULT_SCORE_FLOOR,
            next_section: 0,
            embedder,
        };
        if let Err(e) = index.load() {
            tracing::warn!(error = %e, "could not load persisted index, starting fresh");
            index.chunks.clear();
            index.vectors.clear();
        }
        index.next_section = index.max_section_seq();
        Ok(index)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(INDEX_META_FILE)
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(INDEX_VECTORS_FILE)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `(rows, dim)` of the vector matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.dim)
    }

    /// Override the enhanced-score floor.
    pub fn set_score_floor(&mut self, floor: f32) {
        self.score_floor = floor;
    }

    /// First `n` chunks, for debug introspection.
    pub fn sample_chunks(&self, n: usize) -> &[IndexedChunk] {
        &self.chunks[..self.chunks.len().min(n)]
    }

    /// Whether the two on-disk artifacts currently exist.
    pub fn artifacts_exist(&self) -> (bool, bool) {
        (self.meta_path().exists(), self.vectors_path().exists())
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }

    fn max_section_seq(&self) -> usize {
        self.chunks
            .iter()
            .filter_map(|c| {
                let (head, _) = c.section_id.rsplit_once("_c")?;
                let (_, n) = head.rsplit_once("_s")?;
                n.parse::<usize>().ok()
            })
            .max()
            .unwrap_or(0)
    }

    /// Ingest documents given as `(doc_id, pdf_path)` pairs.
    ///
    /// A document that fails extraction contributes zero chunks and is
    /// reported in logs; the rest of the batch proceeds. State is
    /// persisted once at the end.
    pub fn ingest_documents(&mut self, items: &[(String, PathBuf)]) -> Result<IngestStats> {
        let mut ingested = 0;
        for (doc_id, path) in items {
            if !path.exists() {
                tracing::warn!(doc_id = %doc_id, path = %path.display(), "skipping missing pdf");
                continue;
            }
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{doc_id}.pdf"));

            let sections = match self.sections_for(path) {
                Ok(sections) => sections,
                Err(e) => {
                    tracing::warn!(doc_id = %doc_id, error = %e, "extraction failed, document skipped");
                    continue;
                }
            };
            ingested += self.index_sections(doc_id, &filename, &sections)?;
        }
        self.save()?;
        tracing::info!(ingested, "ingest complete");
        Ok(IngestStats { ingested })
    }

    fn sections_for(&self, path: &Path) -> Result<Vec<Section>> {
        let analysis = analyze_pdf(path)?;
        let outline = extract_outline(&analysis);
        Ok(build_sections(&analysis, &outline.headings))
    }

    /// Chunk, embed, and append one document's sections. Returns the number
    /// of chunks added. Callers persist via `save`.
    pub fn index_sections(
        &mut self,
        doc_id: &str,
        filename: &str,
        sections: &[Section],
    ) -> Result<usize> {
        let pdf_name = derive_pdf_name(filename);
        let mut new_chunks = Vec::new();
        let mut embed_texts = Vec::new();

        for section in sections {
            self.next_section += 1;
            let section_seq = self.next_section;
            let parts = chunk_section(&section.content);
            let multi = parts.len() > 1;
            for (chunk_no, part) in parts.iter().enumerate() {
                let title = if multi {
                    format!("{} (Part {})", section.title, chunk_no + 1)
                } else {
                    section.title.clone()
                };
                embed_texts.push(format!(
                    "{}. {}",
                    title,
                    truncate_chars(part, EMBED_CONTENT_CHARS)
                ));
                new_chunks.push(IndexedChunk {
                    section_id: format!("{doc_id}_s{section_seq}_c{}", chunk_no + 1),
                    doc_id: doc_id.to_string(),
                    filename: filename.to_string(),
                    page: section.page,
                    snippet: make_snippet(part),
                    vector_offset: 0,
                    pdf_name: pdf_name.clone(),
                    section_heading: section.title.clone(),
                    section_content: part.clone(),
                    text: part.clone(),
                    title,
                });
            }
        }
        if new_chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed(&embed_texts)?;
        let base = self.rows();
        for (i, (mut chunk, vector)) in new_chunks.into_iter().zip(vectors).enumerate() {
            if vector.len() != self.dim {
                return Err(CoreError::Persistence(format!(
                    "embedder produced dimension {} (expected {})",
                    vector.len(),
                    self.dim
                )));
            }
            chunk.vector_offset = base + i;
            self.vectors.extend_from_slice(&vector);
            self.chunks.push(chunk);
        }
        Ok(self.rows() - base)
    }

    /// Rank the top `k` chunks for a query.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchMatch>> {
        let query = text.trim();
        if query.chars().filter(|c| !c.is_whitespace()).count() < 3 {
            return Ok(Vec::new());
        }
        let rows = self.rows();
        if rows == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let q = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .unwrap_or_default();
        if q.len() != self.dim {
            return Ok(Vec::new());
        }

        let sims: Vec<f32> = (0..rows).map(|i| dot(self.row(i), &q)).collect();
        let mut order: Vec<usize> = (0..rows).collect();
        order.sort_by(|&a, &b| {
            sims[b]
                .partial_cmp(&sims[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate((4 * k).clamp(1, rows));

        let terms = query_terms(query);
        let mut results: Vec<SearchMatch> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for i in order {
            if results.len() >= k {
                break;
            }
            let chunk = &self.chunks[i];
            let semantic_score = sims[i];
            let score = enhanced_score(&terms, chunk, semantic_score);
            if score < self.score_floor {
                continue;
            }
            if !seen.insert(content_fingerprint(&chunk.section_content)) {
                continue;
            }
            results.push(SearchMatch {
                doc_id: chunk.doc_id.clone(),
                filename: chunk.filename.clone(),
                page: chunk.page,
                title: chunk.title.clone(),
                snippet: chunk.snippet.clone(),
                score,
                semantic_score,
                pdf_name: chunk.pdf_name.clone(),
                section_heading: chunk.section_heading.clone(),
                section_content: chunk.section_content.clone(),
                section_id: chunk.section_id.clone(),
                relevance_reason: relevance_reason(&terms, chunk, score),
                confidence: Confidence::from_score(score),
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// Persist both artifacts atomically: temp files, then rename, metadata
    /// first. On failure the in-memory state is untouched and retained.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::persistence("create index dir", e))?;

        let meta = serde_json::to_vec_pretty(&MetaFileRef {
            sections: &self.chunks,
        })
        .map_err(|e| CoreError::Persistence(format!("encode metadata: {e}")))?;
        let meta_tmp = self.dir.join(format!("{INDEX_META_FILE}.tmp"));
        fs::write(&meta_tmp, meta).map_err(|e| CoreError::persistence("write metadata", e))?;
        fs::rename(&meta_tmp, self.meta_path())
            .map_err(|e| CoreError::persistence("publish metadata", e))?;

        let vec_tmp = self.dir.join(format!("{INDEX_VECTORS_FILE}.tmp"));
        fs::write(&vec_tmp, self.encode_vectors())
            .map_err(|e| CoreError::persistence("write vectors", e))?;
        fs::rename(&vec_tmp, self.vectors_path())
            .map_err(|e| CoreError::persistence("publish vectors", e))?;
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let meta_path = self.meta_path();
        let vec_path = self.vectors_path();
        if !meta_path.exists() || !vec_path.exists() {
            return Ok(());
        }

        let meta: MetaFile = serde_json::from_slice(
            &fs::read(&meta_path).map_err(|e| CoreError::persistence("read metadata", e))?,
        )
        .map_err(|e| CoreError::Persistence(format!("decode metadata: {e}")))?;
        let (vectors, dim, rows) = decode_vectors(
            &fs::read(&vec_path).map_err(|e| CoreError::persistence("read vectors", e))?,
        )?;

        if rows != meta.sections.len() {
            return Err(CoreError::Persistence(format!(
                "artifact mismatch: {} chunks vs {} vector rows",
                meta.sections.len(),
                rows
            )));
        }
        self.chunks = meta.sections;
        self.vectors = vectors;
        if rows > 0 {
            self.dim = dim;
        }
        tracing::info!(chunks = self.chunks.len(), "loaded persisted index");
        Ok(())
    }

    fn encode_vectors(&self) -> Vec<u8> {
        let rows = self.rows();
        let mut buf = Vec::with_capacity(24 + self.vectors.len() * 4);
        buf.extend_from_slice(VECTORS_MAGIC);
        buf.extend_from_slice(&VECTORS_VERSION.to_le_bytes());
        buf.extend_from_slice(&(rows as u64).to_le_bytes());
        buf.extend_from_slice(&(self.dim as u64).to_le_bytes());
        for value in &self.vectors {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf
    }

    /// Drop all state and persist the empty index. The directory itself is
    /// recreated so stray files disappear with it.
    pub fn reset(&mut self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .map_err(|e| CoreError::persistence("remove index dir", e))?;
        }
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::persistence("create index dir", e))?;
        self.chunks.clear();
        self.vectors.clear();
        self.next_section = 0;
        self.save()
    }
}

fn decode_vectors(bytes: &[u8]) -> Result<(Vec<f32>, usize, usize)> {
    let header = 4 + 4 + 8 + 8;
    if bytes.len() < header || &bytes[..4] != VECTORS_MAGIC {
        return Err(CoreError::Persistence("bad vectors file header".into()));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != VECTORS_VERSION {
        return Err(CoreError::Persistence(format!(
            "unsupported vectors file version {version}"
        )));
    }
    let rows = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
    let dim = u64::from_le_bytes(bytes[16..24].try_into().unwrap()) as usize;
    let expected = header + rows.saturating_mul(dim).saturating_mul(4);
    if bytes.len() != expected {
        return Err(CoreError::Persistence(format!(
            "vectors file truncated: {} bytes, expected {expected}",
            bytes.len()
        )));
    }
    let values = bytes[header..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
        .collect();
    Ok((values, dim, rows))
}

/// Human-readable document name: strip the extension, underscores to
/// spaces, words capitalized.
pub fn derive_pdf_name(filename: &str) -> String {
    let stem = filename.strip_suffix(".pdf").unwrap_or(filename);
    stem.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased query terms longer than two characters, first-occurrence
/// order, deduplicated.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for word in query.to_lowercase().split_whitespace() {
        if word.chars().count() > 2 && !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
    }
    terms
}

/// Cosine similarity augmented by keyword, length, and heading bonuses,
/// with an asymmetric multiplicative adjustment, clamped to [0, 1].
fn enhanced_score(terms: &[String], chunk: &IndexedChunk, semantic_score: f32) -> f32 {
    let content = chunk.section_content.to_lowercase();
    let heading = chunk.section_heading.to_lowercase();

    let mut keyword_matches = 0u32;
    for term in terms {
        if content.contains(term.as_str()) {
            keyword_matches += 1;
        }
        if heading.contains(term.as_str()) {
            keyword_matches += 2;
        }
    }
    let keyword_bonus = (keyword_matches as f32 * 0.02).min(0.1);

    let content_len = content.chars().count();
    let length_bonus = if (100..=1000).contains(&content_len) {
        0.05
    } else if content_len > 1000 {
        0.02
    } else {
        0.0
    };

    let heading_bonus = if terms.iter().any(|t| heading.contains(t.as_str())) {
        0.05
    } else {
        0.0
    };

    let mut score = semantic_score + keyword_bonus + length_bonus + heading_bonus;
    if semantic_score > 0.8 {
        score *= 1.1;
    } else if semantic_score < 0.4 {
        score *= 0.9;
    }
    score.clamp(0.0, 1.0)
}

/// First 16 hex chars of the MD5 of the lowercased first 300 content chars.
fn content_fingerprint(content: &str) -> String {
    let preview = truncate_chars(content, FINGERPRINT_CHARS)
        .trim()
        .to_lowercase();
    let digest = Md5::digest(preview.as_bytes());
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()[..16]
        .to_string()
}

/// One-line, never-empty explanation of why a match ranked where it did.
fn relevance_reason(terms: &[String], chunk: &IndexedChunk, score: f32) -> String {
    let content = chunk.section_content.to_lowercase();
    let heading = chunk.section_heading.to_lowercase();
    let matching: Vec<&str> = terms
        .iter()
        .filter(|t| content.contains(t.as_str()) || heading.contains(t.as_str()))
        .map(String::as_str)
        .collect();

    if score > 0.8 {
        if !matching.is_empty() {
            return format!(
                "Highly relevant - contains key terms: {}",
                matching[..matching.len().min(3)].join(", ")
            );
        }
        "Highly relevant - strong semantic and contextual match".to_string()
    } else if score > 0.6 {
        if !matching.is_empty() {
            return format!(
                "Strongly related - discusses: {}",
                matching[..matching.len().min(2)].join(", ")
            );
        }
        if !heading.is_empty() {
            let topic = heading.split(':').next().unwrap_or(&heading).trim();
            return format!("Related section on {}", truncate_chars(topic, 40));
        }
        "Strongly related topic with similar context".to_string()
    } else if score > 0.4 {
        let in_heading: Vec<&str> = terms
            .iter()
            .filter(|t| heading.contains(t.as_str()))
            .map(String::as_str)
            .collect();
        if !in_heading.is_empty() {
            return format!(
                "Topic '{}' mentioned in heading",
                in_heading[..in_heading.len().min(2)].join(", ")
            );
        }
        "Related topic with similar themes and context".to_string()
    } else if !matching.is_empty() {
        format!(
            "Potentially related - mentions: {}",
            matching[..matching.len().min(2)].join(", ")
        )
    } else {
        "Additional context on related topic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;

    fn section(title: &str, page: i32, content: &str) -> Section {
        Section {
            title: title.to_string(),
            page,
            content: content.to_string(),
        }
    }

    fn open_index(dir: &Path) -> SemanticIndex {
        SemanticIndex::open(dir.join(INDEX_DIR_NAME), Arc::new(HashEmbedder::new())).unwrap()
    }

    fn seeded_index(dir: &Path) -> SemanticIndex {
        let mut index = open_index(dir);
        index
            .index_sections(
                "aaaa111122223333",
                "network_report.pdf",
                &[
                    section(
                        "Introduction",
                        1,
                        "This report introduces the deployed network and its topology in detail.",
                    ),
                    section(
                        "Methods",
                        2,
                        "We surveyed every switch and router, recording firmware versions and uplinks.",
                    ),
                ],
            )
            .unwrap();
        index.save().unwrap();
        index
    }

    #[test]
    fn test_offsets_track_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        assert_eq!(index.len(), index.rows());
        for (i, chunk) in index.chunks.iter().enumerate() {
            assert_eq!(chunk.vector_offset, i);
        }
    }

    #[test]
    fn test_section_id_scheme() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        assert_eq!(index.chunks[0].section_id, "aaaa111122223333_s1_c1");
        assert_eq!(index.chunks[1].section_id, "aaaa111122223333_s2_c1");
    }

    #[test]
    fn test_section_counter_continues_across_ingests() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = seeded_index(tmp.path());
        index
            .index_sections(
                "bbbb111122223333",
                "second.pdf",
                &[section("Appendix", 9, "Supplementary material with enough length to index.")],
            )
            .unwrap();
        assert_eq!(index.chunks[2].section_id, "bbbb111122223333_s3_c1");
    }

    #[test]
    fn test_query_finds_keyword_section() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        let matches = index.query("methods", 5).unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().any(|m| m.section_heading == "Methods" && m.page == 2));
        for m in &matches {
            assert!(!m.relevance_reason.is_empty());
        }
        // Sorted by enhanced score, descending.
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_empty_and_short_queries_return_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        assert!(index.query("", 5).unwrap().is_empty());
        assert!(index.query("  ", 5).unwrap().is_empty());
        assert!(index.query("ab", 5).unwrap().is_empty());
        assert!(index.query(" a b ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_on_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path());
        assert!(index.query("anything at all", 5).unwrap().is_empty());
    }

    #[test]
    fn test_k_limits_results() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = open_index(tmp.path());
        let sections: Vec<Section> = (0..8)
            .map(|i| {
                section(
                    &format!("Chapter {i}"),
                    i,
                    &format!("Chapter {i} discusses a distinct topic numbered {i} at length."),
                )
            })
            .collect();
        index
            .index_sections("cccc111122223333", "book.pdf", &sections)
            .unwrap();
        let matches = index.query("chapter topic", 3).unwrap();
        assert!(matches.len() <= 3);
    }

    #[test]
    fn test_duplicate_content_deduped_by_fingerprint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = open_index(tmp.path());
        let shared = "Preheat the oven to two hundred degrees and rest the dough for an hour.";
        index
            .index_sections("aaaa000011112222", "one.pdf", &[section("Bread", 1, shared)])
            .unwrap();
        index
            .index_sections("bbbb000011112222", "two.pdf", &[section("Bread", 1, shared)])
            .unwrap();
        let matches = index.query("rest the dough", 5).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_save_load_roundtrip_preserves_results() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        let before = index.query("switch firmware", 5).unwrap();

        let reloaded = open_index(tmp.path());
        assert_eq!(reloaded.len(), index.len());
        assert_eq!(reloaded.shape(), index.shape());
        let after = reloaded.query("switch firmware", 5).unwrap();
        let ids_before: Vec<&str> = before.iter().map(|m| m.section_id.as_str()).collect();
        let ids_after: Vec<&str> = after.iter().map(|m| m.section_id.as_str()).collect();
        assert_eq!(ids_before, ids_after);
    }

    #[test]
    fn test_mismatched_artifacts_start_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let index = seeded_index(tmp.path());
        // Truncate the vectors file behind the index's back.
        std::fs::write(index.vectors_path(), b"DSVX junk").unwrap();
        let reloaded = open_index(tmp.path());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = seeded_index(tmp.path());
        index.reset().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.rows(), 0);
        assert!(index.query("methods", 5).unwrap().is_empty());
        index.reset().unwrap();
        assert!(index.is_empty());
        let (meta, vectors) = index.artifacts_exist();
        assert!(meta && vectors, "empty state is persisted");
    }

    #[test]
    fn test_score_floor_is_tunable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = seeded_index(tmp.path());
        assert!(!index.query("methods", 5).unwrap().is_empty());
        index.set_score_floor(2.0);
        assert!(index.query("methods", 5).unwrap().is_empty());
    }

    #[test]
    fn test_enhanced_score_bonuses() {
        let chunk = IndexedChunk {
            section_id: "d_s1_c1".into(),
            doc_id: "d".into(),
            filename: "f.pdf".into(),
            page: 1,
            title: "Methods".into(),
            text: String::new(),
            snippet: String::new(),
            vector_offset: 0,
            pdf_name: "F".into(),
            section_heading: "Methods".into(),
            section_content: "x".repeat(200),
        };
        let terms = vec!["methods".to_string()];
        let score = enhanced_score(&terms, &chunk, 0.5);
        // 0.5 + keyword (heading 2 matches = 0.04) + length 0.05 + heading 0.05.
        assert!((score - 0.64).abs() < 1e-6, "score {score}");
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(Confidence::from_score(0.9), Confidence::VeryHigh);
        assert_eq!(Confidence::from_score(0.7), Confidence::High);
        assert_eq!(Confidence::from_score(0.5), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.2), Confidence::Low);
    }

    #[test]
    fn test_content_fingerprint_case_insensitive() {
        assert_eq!(
            content_fingerprint("The SAME opening text."),
            content_fingerprint("the same opening text.")
        );
        assert_eq!(content_fingerprint("anything").len(), 16);
    }

    #[test]
    fn test_derive_pdf_name() {
        assert_eq!(derive_pdf_name("south_of_france_cities.pdf"), "South Of France Cities");
        assert_eq!(derive_pdf_name("RFP_draft.pdf"), "Rfp Draft");
        assert_eq!(derive_pdf_name("plain"), "Plain");
    }
}
