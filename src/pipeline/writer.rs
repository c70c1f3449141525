//! Document assembly: ordered sections → one DOCX package.
//!
//! Assembly runs in two steps. [`DocumentWriter::layout`] flattens the
//! sections into a list of [`Block`]s, a pure function of its input that
//! tests can compare directly. [`DocumentWriter::render_layout`] then maps
//! each block to a docx-rs paragraph and packs the zip container. The
//! package itself is not byte-stable (docx-rs assigns fresh paragraph ids),
//! so equality checks belong on the layout or on the extracted text.
//!
//! ```text
//! Title                      (optional)
//! survey_a.pdf               Heading 1, one per section
//!   Processed at: …          (optional)
//!   --- Page 1 ---           PageMarker
//!   Q1: …                    body, line breaks kept
//!   --- Page 2 ---
//!   …
//! survey_b.pdf
//!   …
//! Notice                     (optional)
//! ```

use crate::config::DocumentOptions;
use crate::error::HandscriptError;
use crate::output::DocumentSection;
use chrono::{DateTime, Local};
use docx_rs::{
    AlignmentType, BreakType, Docx, Paragraph, Run, RunFonts, Style, StyleType,
};
use std::io::Cursor;
use tracing::debug;

const NOTICE_HEADING: &str = "Note";

const NOTICE_TEXT: &str = "This document was produced by automatic handwriting recognition.\n\
Recognition is not perfect and some characters may be misread.\n\
Check the original sheets for anything important.";

/// One paragraph-level element of the generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    /// Source filename.
    SectionHeading(String),
    Metadata { label: String, value: String },
    /// `--- Page N ---`
    PageMarker(usize),
    /// One page's text; `\n` becomes an in-paragraph line break.
    Body(String),
    Notice { heading: String, text: String },
}

/// The document structure before packing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLayout {
    pub blocks: Vec<Block>,
}

impl DocumentLayout {
    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::SectionHeading(h) => Some(h.as_str()),
            _ => None,
        })
    }

    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Body(t) => Some(t.as_str()),
            _ => None,
        })
    }
}

/// Marker paragraph text for a page boundary.
pub fn page_marker(page_num: usize) -> String {
    format!("--- Page {page_num} ---")
}

/// Renders sections into a Word document.
#[derive(Debug, Clone, Default)]
pub struct DocumentWriter {
    options: DocumentOptions,
}

impl DocumentWriter {
    pub fn new(options: DocumentOptions) -> Self {
        Self { options }
    }

    /// Flatten `sections` into blocks.
    ///
    /// `processed_at` fills the per-section metadata line when
    /// `include_timestamp` is on; pass the same value to get the same layout.
    pub fn layout(
        &self,
        sections: &[DocumentSection],
        processed_at: Option<DateTime<Local>>,
    ) -> DocumentLayout {
        let mut blocks = Vec::new();

        if let Some(title) = self.options.title.as_deref().filter(|t| !t.trim().is_empty()) {
            blocks.push(Block::Title(title.to_string()));
        }

        for section in sections {
            blocks.push(Block::SectionHeading(section.filename.clone()));
            if self.options.include_timestamp {
                if let Some(ts) = processed_at {
                    blocks.push(Block::Metadata {
                        label: "Processed at: ".into(),
                        value: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    });
                }
            }
            for page in &section.pages {
                blocks.push(Block::PageMarker(page.page_num));
                blocks.push(Block::Body(page.text.clone()));
            }
        }

        if self.options.include_notice {
            blocks.push(Block::Notice {
                heading: NOTICE_HEADING.into(),
                text: NOTICE_TEXT.into(),
            });
        }

        DocumentLayout { blocks }
    }

    /// Lay out and pack `sections`, stamping them with the current time.
    pub fn render(&self, sections: &[DocumentSection]) -> Result<Vec<u8>, HandscriptError> {
        let now = self.options.include_timestamp.then(Local::now);
        self.render_layout(&self.layout(sections, now))
    }

    /// Pack a prepared layout into DOCX bytes.
    pub fn render_layout(&self, layout: &DocumentLayout) -> Result<Vec<u8>, HandscriptError> {
        let font = &self.options.font_family;
        let half_points = self.options.font_size_pt * 2;

        let mut docx = Docx::new()
            .default_fonts(
                RunFonts::new()
                    .ascii(font)
                    .east_asia(font)
                    .hi_ansi(font)
                    .cs(font),
            )
            .default_size(half_points)
            .add_style(
                Style::new("Title", StyleType::Paragraph)
                    .name("Title")
                    .size(half_points + 10)
                    .bold(),
            )
            .add_style(
                Style::new("Heading1", StyleType::Paragraph)
                    .name("Heading 1")
                    .size(half_points + 6)
                    .bold(),
            )
            .add_style(
                Style::new("PageMarker", StyleType::Paragraph)
                    .name("Page Marker")
                    .color("808080"),
            );

        for block in &layout.blocks {
            for paragraph in paragraphs_for(block) {
                docx = docx.add_paragraph(paragraph);
            }
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| HandscriptError::DocumentAssembly(e.to_string()))?;

        let bytes = buf.into_inner();
        debug!(
            "Packed DOCX: {} blocks → {} bytes",
            layout.blocks.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn paragraphs_for(block: &Block) -> Vec<Paragraph> {
    match block {
        Block::Title(title) => vec![Paragraph::new()
            .style("Title")
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text(title))],
        Block::SectionHeading(name) => {
            vec![Paragraph::new().style("Heading1").add_run(Run::new().add_text(name))]
        }
        Block::Metadata { label, value } => vec![Paragraph::new()
            .add_run(Run::new().add_text(label).bold())
            .add_run(Run::new().add_text(value))],
        Block::PageMarker(n) => vec![Paragraph::new()
            .style("PageMarker")
            .add_run(Run::new().add_text(page_marker(*n)))],
        Block::Body(text) => vec![Paragraph::new().add_run(multiline_run(text))],
        Block::Notice { heading, text } => vec![
            Paragraph::new().add_run(Run::new().add_text(heading).bold()),
            Paragraph::new().add_run(multiline_run(text).italic()),
        ],
    }
}

/// One run with a text-wrapping break between lines.
fn multiline_run(text: &str) -> Run {
    let mut run = Run::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageTranscript;
    use chrono::TimeZone;

    fn section(name: &str, texts: &[&str]) -> DocumentSection {
        DocumentSection {
            filename: name.into(),
            pages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| PageTranscript::recognised(i + 1, *t))
                .collect(),
        }
    }

    fn bare_writer() -> DocumentWriter {
        DocumentWriter::new(DocumentOptions {
            title: None,
            include_timestamp: false,
            include_notice: false,
            ..Default::default()
        })
    }

    #[test]
    fn layout_has_heading_marker_and_body_per_page() {
        let layout = bare_writer().layout(&[section("a.pdf", &["Hello", "World"])], None);
        assert_eq!(
            layout.blocks,
            vec![
                Block::SectionHeading("a.pdf".into()),
                Block::PageMarker(1),
                Block::Body("Hello".into()),
                Block::PageMarker(2),
                Block::Body("World".into()),
            ]
        );
    }

    #[test]
    fn layout_preserves_section_order() {
        let sections = [section("b.pdf", &["2"]), section("a.pdf", &["1"])];
        let layout = bare_writer().layout(&sections, None);
        assert_eq!(layout.headings().collect::<Vec<_>>(), vec!["b.pdf", "a.pdf"]);
        assert_eq!(layout.bodies().collect::<Vec<_>>(), vec!["2", "1"]);
    }

    #[test]
    fn layout_is_deterministic() {
        let w = DocumentWriter::default();
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let sections = [section("a.pdf", &["x", "y"])];
        assert_eq!(w.layout(&sections, Some(ts)), w.layout(&sections, Some(ts)));
    }

    #[test]
    fn template_parts_follow_options() {
        let w = DocumentWriter::new(DocumentOptions {
            include_timestamp: true,
            ..Default::default()
        });
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let layout = w.layout(&[section("a.pdf", &["x"])], Some(ts));

        assert_eq!(
            layout.blocks.first(),
            Some(&Block::Title("Handwritten Questionnaire Transcription".into()))
        );
        assert!(layout.blocks.contains(&Block::Metadata {
            label: "Processed at: ".into(),
            value: "2024-05-01 09:30:00".into(),
        }));
        assert!(matches!(layout.blocks.last(), Some(Block::Notice { .. })));
    }

    #[test]
    fn empty_section_list_keeps_template_only() {
        let layout = DocumentWriter::default().layout(&[], None);
        assert_eq!(layout.headings().count(), 0);
        assert_eq!(layout.blocks.len(), 2);
    }

    #[test]
    fn page_marker_text() {
        assert_eq!(page_marker(7), "--- Page 7 ---");
    }

    #[test]
    fn renders_zip_package() {
        let bytes = DocumentWriter::default()
            .render(&[section("a.pdf", &["line one\nline two"])])
            .unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
