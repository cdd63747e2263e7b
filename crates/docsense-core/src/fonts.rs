//! Span-level font analysis of a PDF.
//!
//! Walks every page's content stream and reconstructs the rendered text
//! lines, each with its geometry and font metadata. The outline extractor
//! classifies these spans into headings; the histogram of rounded sizes
//! yields the body-text size it compares against.
//!
//! The interpreter tracks the text and line matrices and the current font
//! through `BT`/`ET`, `Tf`, `Td`/`TD`/`Tm`/`T*`, and the show operators
//! (`Tj`, `'`, `"`, `TJ`). A new span starts whenever the baseline moves
//! vertically. String bytes are decoded as Latin-1; simple fonts cover the
//! documents this service handles, and unknown bytes degrade to their
//! one-byte code points rather than failing the page.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{CoreError, Result};

/// Kerning adjustment (thousandths of an em) treated as a word gap in `TJ`.
const TJ_SPACE_THRESHOLD: f32 = -180.0;

/// FontDescriptor ForceBold flag (bit 19).
const FORCE_BOLD_FLAG: i64 = 1 << 18;

/// One rendered text run with geometry and style attributes.
#[derive(Debug, Clone)]
pub struct Span {
    pub text: String,
    /// 1-based physical page index.
    pub page: u32,
    /// Average font size over the run, rounded to a tenth of a point.
    pub font_size: f32,
    pub font_name: String,
    pub is_bold: bool,
    pub x: f32,
    /// Lower-left baseline in PDF user space.
    pub y: f32,
    pub length: usize,
    pub word_count: usize,
}

/// Result of analyzing one document.
#[derive(Debug, Clone, Default)]
pub struct FontAnalysis {
    pub spans: Vec<Span>,
    /// Count of spans per rounded font size; keys are tenths of a point.
    pub size_histogram: BTreeMap<i32, usize>,
    pub page_count: usize,
}

impl FontAnalysis {
    /// Body-text size: the mode of rounded span sizes, ties broken by the
    /// larger size. `None` when the document had no text at all.
    pub fn body_size(&self) -> Option<f32> {
        self.size_histogram
            .iter()
            .max_by_key(|(size, count)| (**count, **size))
            .map(|(size, _)| *size as f32 / 10.0)
    }

    /// All span text lowercased and joined, for signature scanning.
    pub fn all_text_lower(&self) -> String {
        let mut text = String::new();
        for span in &self.spans {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&span.text.to_lowercase());
        }
        text
    }

    /// Spans of one physical page, in top-to-bottom reading order.
    pub fn page_spans(&self, page: u32) -> Vec<&Span> {
        let mut spans: Vec<&Span> = self.spans.iter().filter(|s| s.page == page).collect();
        spans.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });
        spans
    }
}

/// Resolved font attributes from a page resource dictionary.
#[derive(Debug, Clone, Default)]
struct FontInfo {
    name: String,
    force_bold: bool,
}

/// Analyze a PDF file into spans and a font-size histogram.
pub fn analyze_pdf(path: &Path) -> Result<FontAnalysis> {
    let doc = Document::load(path).map_err(|e| CoreError::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    analyze_document(&doc)
}

/// Analyze an already-loaded document.
pub fn analyze_document(doc: &Document) -> Result<FontAnalysis> {
    let pages = doc.get_pages();
    let mut analysis = FontAnalysis {
        page_count: pages.len(),
        ..Default::default()
    };

    for (page_no, page_id) in pages {
        let fonts = page_fonts(doc, page_id);
        let data = match doc.get_page_content(page_id) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(page = page_no, error = %e, "skipping unreadable page content");
                continue;
            }
        };
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(page = page_no, error = %e, "skipping undecodable content stream");
                continue;
            }
        };
        interpret_page(&content, &fonts, page_no, &mut analysis.spans);
    }

    for span in &analysis.spans {
        let key = (span.font_size * 10.0).round() as i32;
        *analysis.size_histogram.entry(key).or_insert(0) += 1;
    }
    Ok(analysis)
}

/// Accumulates one text line until the baseline moves.
#[derive(Debug, Default)]
struct LineBuilder {
    text: String,
    x: f32,
    y: f32,
    started: bool,
    /// (size, weight) pairs, weighted by characters shown at that size.
    sizes: Vec<(f32, usize)>,
    fonts: HashMap<String, usize>,
    bold: bool,
}

impl LineBuilder {
    fn push_run(&mut self, text: &str, size: f32, font: &FontInfo, x: f32, y: f32) {
        if text.is_empty() {
            return;
        }
        if !self.started {
            self.x = x;
            self.y = y;
            self.started = true;
        }
        self.text.push_str(text);
        self.sizes.push((size, text.chars().count()));
        *self.fonts.entry(font.name.clone()).or_insert(0) += 1;
        if font.force_bold || font.name.to_lowercase().contains("bold") {
            self.bold = true;
        }
    }

    fn flush(&mut self, page: u32, spans: &mut Vec<Span>) {
        if self.started {
            let text = self.text.trim().to_string();
            if !text.is_empty() {
                let total: usize = self.sizes.iter().map(|(_, w)| w).sum();
                let avg = if total == 0 {
                    0.0
                } else {
                    self.sizes.iter().map(|(s, w)| s * *w as f32).sum::<f32>() / total as f32
                };
                let font_name = self
                    .fonts
                    .iter()
                    .max_by_key(|&(name, count)| (*count, name.clone()))
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default();
                spans.push(Span {
                    length: text.chars().count(),
                    word_count: text.split_whitespace().count(),
                    text,
                    page,
                    font_size: (avg * 10.0).round() / 10.0,
                    font_name,
                    is_bold: self.bold,
                    x: self.x,
                    y: self.y,
                });
            }
        }
        *self = LineBuilder::default();
    }
}

fn interpret_page(
    content: &Content,
    fonts: &HashMap<Vec<u8>, FontInfo>,
    page: u32,
    spans: &mut Vec<Span>,
) {
    // Text matrix, line matrix: [a b c d e f].
    let identity = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut tm = identity;
    let mut lm = identity;
    let mut leading = 0.0f32;
    let mut font = FontInfo::default();
    let mut font_size = 0.0f32;
    let mut line = LineBuilder::default();
    let fallback = FontInfo::default();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                line.flush(page, spans);
                tm = identity;
                lm = identity;
            }
            "ET" => line.flush(page, spans),
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (operands.first(), operands.get(1).and_then(number))
                {
                    font = fonts.get(name).unwrap_or(&fallback).clone();
                    font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    if ty != 0.0 {
                        line.flush(page, spans);
                    }
                    lm = translate(lm, tx, ty);
                    tm = lm;
                }
            }
            "Tm" => {
                let values: Vec<f32> = operands.iter().filter_map(number).collect();
                if values.len() == 6 {
                    let next = [values[0], values[1], values[2], values[3], values[4], values[5]];
                    if (next[5] - tm[5]).abs() > f32::EPSILON {
                        line.flush(page, spans);
                    }
                    lm = next;
                    tm = next;
                }
            }
            "T*" => {
                line.flush(page, spans);
                lm = translate(lm, 0.0, -leading);
                tm = lm;
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_text(bytes, &mut line, &font, font_size, &tm);
                }
            }
            "'" => {
                line.flush(page, spans);
                lm = translate(lm, 0.0, -leading);
                tm = lm;
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_text(bytes, &mut line, &font, font_size, &tm);
                }
            }
            "\"" => {
                line.flush(page, spans);
                lm = translate(lm, 0.0, -leading);
                tm = lm;
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    show_text(bytes, &mut line, &font, font_size, &tm);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                show_text(bytes, &mut line, &font, font_size, &tm);
                            }
                            other => {
                                if let Some(adjust) = number(other) {
                                    if adjust < TJ_SPACE_THRESHOLD {
                                        line.push_run(
                                            " ",
                                            effective_size(font_size, &tm),
                                            &font,
                                            tm[4],
                                            tm[5],
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    line.flush(page, spans);
}

fn show_text(bytes: &[u8], line: &mut LineBuilder, font: &FontInfo, size: f32, tm: &[f32; 6]) {
    let text: String = bytes.iter().map(|&b| b as char).collect();
    line.push_run(&text, effective_size(size, tm), font, tm[4], tm[5]);
}

/// Font size scaled by the vertical component of the text matrix.
fn effective_size(size: f32, tm: &[f32; 6]) -> f32 {
    size * (tm[1] * tm[1] + tm[3] * tm[3]).sqrt()
}

fn translate(m: [f32; 6], tx: f32, ty: f32) -> [f32; 6] {
    [
        m[0],
        m[1],
        m[2],
        m[3],
        tx * m[0] + ty * m[2] + m[4],
        tx * m[1] + ty * m[3] + m[5],
    ]
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Resolve the fonts visible to a page, following the `Parent` chain for
/// inherited resources.
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let Some(resources) = page_resources(doc, page_id) else {
        return fonts;
    };
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
    else {
        return fonts;
    };

    for (name, obj) in font_dict.iter() {
        let Some(entry) = resolve_dict(doc, obj) else {
            continue;
        };
        let base_font = entry
            .get(b"BaseFont")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| match obj {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .unwrap_or_default();
        let force_bold = entry
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
            .and_then(|desc| desc.get(b"Flags").ok())
            .and_then(|obj| match resolve(doc, obj) {
                Object::Integer(flags) => Some(flags & FORCE_BOLD_FLAG != 0),
                _ => None,
            })
            .unwrap_or(false);
        fonts.insert(
            name.clone(),
            FontInfo {
                name: base_font,
                force_bold,
            },
        );
    }
    fonts
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(res) = dict.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Build a one-page document with the given (font, size, x, y, text)
    /// lines. Font keys: "F1" = Helvetica, "F2" = Helvetica-Bold.
    fn single_page_pdf(lines: &[(&str, f32, f32, f32, &str)]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        };

        let mut operations = Vec::new();
        for (font, size, x, y, text) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), (*size).into()],
            ));
            operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(*text)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_spans_carry_geometry_and_fonts() {
        let doc = single_page_pdf(&[
            ("F2", 18.0, 72.0, 700.0, "Annual Report"),
            ("F1", 12.0, 72.0, 660.0, "The quick brown fox jumps over the lazy dog."),
        ]);
        let analysis = analyze_document(&doc).unwrap();
        assert_eq!(analysis.spans.len(), 2);

        let title = &analysis.spans[0];
        assert_eq!(title.text, "Annual Report");
        assert_eq!(title.page, 1);
        assert_eq!(title.font_size, 18.0);
        assert!(title.is_bold);
        assert_eq!(title.font_name, "Helvetica-Bold");
        assert_eq!(title.word_count, 2);
        assert!((title.x - 72.0).abs() < 0.01);
        assert!((title.y - 700.0).abs() < 0.01);

        let body = &analysis.spans[1];
        assert!(!body.is_bold);
        assert_eq!(body.font_size, 12.0);
    }

    #[test]
    fn test_body_size_is_histogram_mode() {
        let doc = single_page_pdf(&[
            ("F1", 16.0, 72.0, 700.0, "Heading"),
            ("F1", 12.0, 72.0, 660.0, "body line one"),
            ("F1", 12.0, 72.0, 640.0, "body line two"),
            ("F1", 12.0, 72.0, 620.0, "body line three"),
        ]);
        let analysis = analyze_document(&doc).unwrap();
        assert_eq!(analysis.body_size(), Some(12.0));
        assert_eq!(analysis.size_histogram[&120], 3);
        assert_eq!(analysis.size_histogram[&160], 1);
    }

    #[test]
    fn test_body_size_tie_breaks_to_larger() {
        let doc = single_page_pdf(&[
            ("F1", 10.0, 72.0, 700.0, "small one"),
            ("F1", 10.0, 72.0, 680.0, "small two"),
            ("F1", 14.0, 72.0, 660.0, "large one"),
            ("F1", 14.0, 72.0, 640.0, "large two"),
        ]);
        let analysis = analyze_document(&doc).unwrap();
        assert_eq!(analysis.body_size(), Some(14.0));
    }

    #[test]
    fn test_page_spans_ordered_top_to_bottom() {
        let doc = single_page_pdf(&[
            ("F1", 12.0, 72.0, 100.0, "bottom"),
            ("F1", 12.0, 72.0, 700.0, "top"),
            ("F1", 12.0, 72.0, 400.0, "middle"),
        ]);
        let analysis = analyze_document(&doc).unwrap();
        let texts: Vec<&str> = analysis
            .page_spans(1)
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["top", "middle", "bottom"]);
    }

    #[test]
    fn test_tj_array_kerning_inserts_spaces() {
        let mut doc = single_page_pdf(&[]);
        // Rebuild the content stream with a TJ op directly.
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), 12.into()],
            ),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Hello"),
                    Object::Integer(-250),
                    Object::string_literal("world"),
                    Object::Integer(-40),
                    Object::string_literal("!"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = *doc.get_pages().values().next().unwrap();
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Contents", content_id);
        }

        let analysis = analyze_document(&doc).unwrap();
        assert_eq!(analysis.spans.len(), 1);
        assert_eq!(analysis.spans[0].text, "Hello world!");
    }

    #[test]
    fn test_empty_document() {
        let doc = single_page_pdf(&[]);
        let analysis = analyze_document(&doc).unwrap();
        assert!(analysis.spans.is_empty());
        assert_eq!(analysis.body_size(), None);
        assert_eq!(analysis.page_count, 1);
    }
}
