//! Shared fixtures: synthetic PDFs built with lopdf so the whole pipeline
//! runs hermetically.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One rendered line: font key ("F1" regular, "F2" bold), size, y, text.
pub type Line<'a> = (&'a str, f32, f32, &'a str);

/// Build a PDF with one content page per entry in `pages`.
pub fn pdf_bytes(pages: &[Vec<Line<'_>>]) -> Vec<u8> {
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

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (font, size, y, text) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), (*size).into()],
            ));
            operations.push(Operation::new("Td", vec![72.into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => regular, "F2" => bold },
            },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// A three-page study report: 24pt title, 16pt headings, 12pt body.
pub fn study_report() -> Vec<u8> {
    pdf_bytes(&[
        vec![
            ("F1", 24.0, 780.0, "Sample Study Report"),
            ("F1", 16.0, 700.0, "Introduction"),
            ("F1", 12.0, 660.0, "This study examines indexing behavior across documents."),
            ("F1", 12.0, 640.0, "The introduction motivates the research questions involved."),
        ],
        vec![
            ("F1", 16.0, 700.0, "Methods"),
            ("F1", 12.0, 660.0, "We ingested a corpus of reports and measured recall."),
            ("F1", 12.0, 640.0, "Each query was repeated five times for stability."),
        ],
        vec![
            ("F1", 16.0, 700.0, "Results"),
            ("F1", 12.0, 660.0, "Recall improved once heading bonuses were applied."),
            ("F1", 12.0, 640.0, "Latency stayed flat across the corpus sizes tested."),
        ],
    ])
}
