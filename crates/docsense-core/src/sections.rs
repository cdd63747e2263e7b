//! Section building: the content between consecutive headings.
//!
//! Walks page lines in reading order. On the heading's own page collection
//! starts after the heading text is encountered; intermediate pages
//! contribute every line; the end page contributes lines until the next
//! heading appears. Content is capped to bound memory, and undersized
//! sections are dropped. Documents with no outline fall back to pagewise
//! chunks.

use crate::fonts::FontAnalysis;
use crate::outline::Heading;

/// Hard cap on collected lines per section.
pub const MAX_SECTION_LINES: usize = 200;
/// Hard cap on collected characters per section.
pub const MAX_SECTION_CHARS: usize = 500;
/// Sections shorter than this are dropped.
pub const MIN_SECTION_CHARS: usize = 30;

const FALLBACK_CHUNK_CHARS: usize = 2000;
const FALLBACK_OVERLAP_CHARS: usize = 200;
const FALLBACK_MAX_SECTIONS: usize = 10;
const FALLBACK_MIN_PAGE_CHARS: usize = 50;
const FALLBACK_MIN_CHUNK_CHARS: usize = 100;

/// An outline-anchored content unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    /// Page under the document's numbering scheme (fallback sections use
    /// 1-based physical pages).
    pub page: i32,
    pub content: String,
}

/// Build sections from an analyzed document and its headings.
pub fn build_sections(analysis: &FontAnalysis, headings: &[Heading]) -> Vec<Section> {
    if headings.is_empty() {
        return fallback_sections(analysis);
    }

    let pages = page_lines(analysis);
    let mut sections = Vec::new();
    for (i, heading) in headings.iter().enumerate() {
        let content = section_content(&pages, heading, headings.get(i + 1));
        if content.chars().count() >= MIN_SECTION_CHARS {
            sections.push(Section {
                title: heading.text.clone(),
                page: heading.page,
                content,
            });
        }
    }
    sections
}

/// Whitespace-collapsed text lines per physical page, top to bottom.
fn page_lines(analysis: &FontAnalysis) -> Vec<Vec<String>> {
    (1..=analysis.page_count as u32)
        .map(|page| {
            analysis
                .page_spans(page)
                .iter()
                .map(|span| {
                    span.text
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        })
        .collect()
}

fn section_content(pages: &[Vec<String>], heading: &Heading, next: Option<&Heading>) -> String {
    let start = heading.page_index;
    let end = next.map(|n| n.page_index);
    let mut lines: Vec<&str> = Vec::new();
    let mut chars = 0usize;
    let mut capture = false;

    'pages: for idx in start..pages.len() {
        if let Some(end) = end {
            if idx > end {
                break;
            }
        }
        if idx > start {
            capture = true;
        }
        for line in &pages[idx] {
            if !capture {
                if line.contains(&heading.text) {
                    capture = true;
                }
                continue;
            }
            if let Some(next) = next {
                if idx == next.page_index && line.contains(&next.text) {
                    break 'pages;
                }
            }
            if line.is_empty() {
                continue;
            }
            lines.push(line);
            chars += line.chars().count();
            if lines.len() >= MAX_SECTION_LINES || chars > MAX_SECTION_CHARS {
                break 'pages;
            }
        }
    }

    lines.join("\n").trim().to_string()
}

/// Outline-less fallback: split every page into bounded chunks.
fn fallback_sections(analysis: &FontAnalysis) -> Vec<Section> {
    let pages = page_lines(analysis);
    let mut sections = Vec::new();

    for (idx, lines) in pages.iter().enumerate() {
        let text = lines.join("\n");
        let trimmed = text.trim();
        if trimmed.chars().count() < FALLBACK_MIN_PAGE_CHARS {
            continue;
        }
        let page = idx as i32 + 1;
        if text.chars().count() > FALLBACK_CHUNK_CHARS {
            let step = FALLBACK_CHUNK_CHARS - FALLBACK_OVERLAP_CHARS;
            let chars: Vec<char> = text.chars().collect();
            let mut part = 1;
            let mut offset = 0;
            while offset < chars.len() {
                let end = (offset + FALLBACK_CHUNK_CHARS).min(chars.len());
                let chunk: String = chars[offset..end].iter().collect();
                let chunk = chunk.trim().to_string();
                if chunk.chars().count() >= FALLBACK_MIN_CHUNK_CHARS {
                    sections.push(Section {
                        title: format!("Page {page} Content (Part {part})"),
                        page,
                        content: chunk,
                    });
                }
                part += 1;
                offset += step;
            }
        } else {
            sections.push(Section {
                title: format!("Page {page} Content"),
                page,
                content: trimmed.to_string(),
            });
        }
    }

    sections.truncate(FALLBACK_MAX_SECTIONS);
    sections
}
