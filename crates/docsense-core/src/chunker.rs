//! Sentence-aware overlapping chunking and snippet generation.
//!
//! Section content is split on sentence boundaries, accumulated into
//! chunks of roughly `CHUNK_TARGET_CHARS`, and adjacent chunks share the
//! closing sentences of their predecessor so no context is lost at a
//! boundary. Snippets are short excerpts biased toward sentences carrying
//! cue words, for display next to search results.

use once_cell::sync::Lazy;
use regex::Regex;

/// Target chunk size in characters.
pub const CHUNK_TARGET_CHARS: usize = 512;

/// Cap on the sentence overlap carried into the next chunk.
pub const CHUNK_OVERLAP_CHARS: usize = 100;

/// Snippet length cap.
const SNIPPET_MAX_CHARS: usize = 800;

/// Fallback snippet length when no usable sentences exist.
const SNIPPET_FALLBACK_CHARS: usize = 400;

/// Words that mark a sentence as a good snippet candidate.
const SNIPPET_CUE_WORDS: [&str; 5] = ["include", "such as", "example", "important", "main"];

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])\s+([A-Z0-9])").expect("static pattern"));

static NON_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\s\-_]+$").expect("static pattern"));

/// Split text into cleaned sentences.
///
/// Boundaries are `.!?` followed by whitespace and an uppercase letter or
/// digit. Sentences outside 10..=1000 characters, or consisting only of
/// digits, dashes, and whitespace, are discarded.
pub fn split_sentences(text: &str) -> Vec<String> {
    let marked = SENTENCE_BOUNDARY.replace_all(text.trim(), "${1}\n${2}");
    marked
        .split('\n')
        .map(str::trim)
        .filter(|s| {
            let len = s.chars().count();
            (10..=1000).contains(&len) && !NON_CONTENT.is_match(s)
        })
        .map(str::to_string)
        .collect()
}

/// Split `text` into overlapping chunks of at most roughly `target` chars.
///
/// When a sentence would overflow the current chunk, the chunk is closed
/// and the next one opens with the last three sentences of its
/// predecessor (capped at `overlap` characters). Text with no usable
/// sentences degrades to a single truncated chunk.
pub fn chunk_text(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return vec![truncate_chars(text, target).trim().to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in &sentences {
        if !current.is_empty()
            && current.chars().count() + sentence.chars().count() > target
        {
            chunks.push(current.trim().to_string());
            let carried = overlap_tail(&current, overlap);
            current = if carried.is_empty() {
                sentence.clone()
            } else {
                format!("{carried}. {sentence}")
            };
        } else if current.is_empty() {
            current = sentence.clone();
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    if chunks.is_empty() {
        vec![truncate_chars(text, target).trim().to_string()]
    } else {
        chunks
    }
}

/// Chunk with the default target and overlap.
pub fn chunk_section(text: &str) -> Vec<String> {
    chunk_text(text, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS)
}

/// The last up-to-three sentence fragments of a chunk, capped to `overlap`
/// characters from the tail.
fn overlap_tail(chunk: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let fragments: Vec<&str> = chunk
        .split('.')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    let start = fragments.len().saturating_sub(3);
    let tail = fragments[start..].join(". ");
    if tail.chars().count() > overlap {
        let chars: Vec<char> = tail.chars().collect();
        chars[chars.len() - overlap..].iter().collect()
    } else {
        tail
    }
}

/// Derive a 2–4 sentence display snippet for a chunk.
///
/// Sentences carrying cue words are promoted to the front; very short
/// sentences and page markers are skipped. Falls back to a plain prefix
/// when nothing qualifies.
pub fn make_snippet(text: &str) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return truncate_chars(text, SNIPPET_FALLBACK_CHARS);
    }

    let mut best: Vec<String> = Vec::new();
    for sentence in &sentences {
        let lower = sentence.to_lowercase();
        if sentence.chars().count() < 20 || lower.contains("page ") {
            continue;
        }
        if SNIPPET_CUE_WORDS.iter().any(|w| lower.contains(w)) {
            best.insert(0, sentence.clone());
        } else {
            best.push(sentence.clone());
        }
        if best.len() >= 4 {
            break;
        }
    }
    if best.len() < 2 && sentences.len() >= 2 {
        best = sentences.iter().take(4).cloned().collect();
    }

    truncate_chars(&best[..best.len().min(4)].join(" "), SNIPPET_MAX_CHARS)
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_basic() {
        let text = "This is the first sentence. Here comes the second one! Does a third follow? 4 numbers can start one.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "This is the first sentence.");
        assert_eq!(sentences[3], "4 numbers can start one.");
    }

    #[test]
    fn test_split_sentences_filters_junk() {
        let text = "1234 -- 5678 -- 9012\nA perfectly reasonable sentence stays in.\nshort.";
        let sentences = split_sentences(text);
        assert_eq!(sentences, vec!["A perfectly reasonable sentence stays in."]);
    }

    #[test]
    fn test_lowercase_continuation_not_split() {
        let text = "The ratio was approx. five to one overall.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_single_chunk_for_short_section() {
        let text = "A modest section. It easily fits inside one chunk.";
        let chunks = chunk_section(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("modest section"));
    }

    #[test]
    fn test_long_section_chunks_with_overlap() {
        let text: String = (0..40)
            .map(|i| format!("Sentence number {i} talks about the indexing pipeline at length."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_section(&text);
        assert!(chunks.len() > 1, "expected multiple chunks");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= CHUNK_TARGET_CHARS + CHUNK_OVERLAP_CHARS + 80);
        }
        // Every chunk after the first repeats material from its predecessor.
        for pair in chunks.windows(2) {
            let shared = split_sentences(&pair[1])
                .first()
                .map(|s| pair[0].contains(s.trim_end_matches('.')))
                .unwrap_or(false);
            assert!(shared, "no overlap between {:?} and {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_degenerate_text_becomes_single_truncated_chunk() {
        let text = "x".repeat(2000); // one giant "sentence", filtered by length
        let chunks = chunk_section(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), CHUNK_TARGET_CHARS);
    }

    #[test]
    fn test_snippet_prefers_cue_sentences() {
        let text = "Plain opener sentence with ordinary words inside. \
                    Ingredients include flour, butter, and three eggs. \
                    Another plain sentence follows the flavorful one here.";
        let snippet = make_snippet(text);
        assert!(snippet.starts_with("Ingredients include"));
    }

    #[test]
    fn test_snippet_skips_page_markers() {
        let text = "See page 12 for the appendix details there. \
                    The main findings cover deployment and rollback procedures. \
                    Rollback drills are rehearsed by the operations team monthly.";
        let snippet = make_snippet(text);
        assert!(!snippet.to_lowercase().contains("page 12"));
        assert!(snippet.contains("main findings"));
    }

    #[test]
    fn test_snippet_fallback_is_prefix() {
        let text = "tiny";
        assert_eq!(make_snippet(text), "tiny");
        let long = "y".repeat(1500);
        assert_eq!(make_snippet(&long).chars().count(), SNIPPET_FALLBACK_CHARS);
    }

    #[test]
    fn test_snippet_capped_at_800_chars() {
        let text: String = (0..10)
            .map(|i| format!("Sentence {i} includes a healthy amount of descriptive filler text, {}." , "x".repeat(120)))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(make_snippet(&text).chars().count() <= 800);
    }
}
