//! Minimal WordprocessingML writer.
//!
//! Produces the four parts Word needs to open a document: content types,
//! package relationships, the main document and its styles.

use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::LetterError;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// US Letter in twentieths of a point, with one-inch margins.
const PAGE_WIDTH: &str = "12240";
const PAGE_HEIGHT: &str = "15840";
const PAGE_MARGIN: &str = "1440";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn as_word_value(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

/// A span of uniformly formatted text. `\n` becomes a line break.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    /// Font size in points; the document default when unset.
    pub size_pt: Option<u32>,
    pub bold: bool,
    pub underline: bool,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn size(mut self, size_pt: u32) -> Self {
        self.size_pt = Some(size_pt);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub alignment: Alignment,
    /// Spacing in twentieths of a point.
    pub spacing_before: u32,
    pub spacing_after: u32,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(run: Run) -> Self {
        Self::new().run(run)
    }

    pub fn run(mut self, run: Run) -> Self {
        self.runs.push(run);
        self
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn spacing(mut self, before: u32, after: u32) -> Self {
        self.spacing_before = before;
        self.spacing_after = after;
        self
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    /// A single borderless table row, one paragraph per cell.
    Row(Vec<Paragraph>),
    PageBreak,
}

pub const DEFAULT_FONT: &str = "Franklin Gothic Book";
pub const DEFAULT_FONT_SIZE: u32 = 12;

pub struct DocxWriter {
    font: String,
    size_pt: u32,
}

impl Default for DocxWriter {
    fn default() -> Self {
        Self::new(DEFAULT_FONT, DEFAULT_FONT_SIZE)
    }
}

impl DocxWriter {
    pub fn new(font: impl Into<String>, size_pt: u32) -> Self {
        Self {
            font: font.into(),
            size_pt,
        }
    }

    pub fn write_to_path(&self, blocks: &[Block], path: &Path) -> Result<(), LetterError> {
        let bytes = self.to_bytes(blocks)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LetterError::WriteDocument {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, bytes).map_err(|e| LetterError::WriteDocument {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Serializes the blocks into a DOCX package.
    pub fn to_bytes(&self, blocks: &[Block]) -> Result<Vec<u8>, LetterError> {
        let document_xml = self.document_xml(blocks)?;
        let styles_xml = self.styles_xml()?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, &[u8]); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
            ("_rels/.rels", PACKAGE_RELS_XML.as_bytes()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.as_bytes()),
            ("word/document.xml", &document_xml),
            ("word/styles.xml", &styles_xml),
        ];
        for (name, content) in parts {
            zip.start_file(name, options).map_err(docx_error)?;
            zip.write_all(content).map_err(docx_error)?;
        }

        let cursor = zip.finish().map_err(docx_error)?;
        Ok(cursor.into_inner())
    }

    fn document_xml(&self, blocks: &[Block]) -> Result<Vec<u8>, LetterError> {
        let mut xml = XmlOut::new()?;

        xml.start("w:document", &[("xmlns:w", WORD_NS)])?;
        xml.start("w:body", &[])?;

        for block in blocks {
            match block {
                Block::Paragraph(paragraph) => self.write_paragraph(&mut xml, paragraph)?,
                Block::Row(cells) => self.write_row(&mut xml, cells)?,
                Block::PageBreak => {
                    xml.start("w:p", &[])?;
                    xml.start("w:r", &[])?;
                    xml.empty("w:br", &[("w:type", "page")])?;
                    xml.end("w:r")?;
                    xml.end("w:p")?;
                }
            }
        }

        xml.start("w:sectPr", &[])?;
        xml.empty("w:pgSz", &[("w:w", PAGE_WIDTH), ("w:h", PAGE_HEIGHT)])?;
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", PAGE_MARGIN),
                ("w:right", PAGE_MARGIN),
                ("w:bottom", PAGE_MARGIN),
                ("w:left", PAGE_MARGIN),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        )?;
        xml.end("w:sectPr")?;

        xml.end("w:body")?;
        xml.end("w:document")?;
        Ok(xml.into_bytes())
    }

    fn write_paragraph(&self, xml: &mut XmlOut, paragraph: &Paragraph) -> Result<(), LetterError> {
        xml.start("w:p", &[])?;

        xml.start("w:pPr", &[])?;
        let before = paragraph.spacing_before.to_string();
        let after = paragraph.spacing_after.to_string();
        xml.empty("w:spacing", &[("w:before", &before), ("w:after", &after)])?;
        xml.empty("w:jc", &[("w:val", paragraph.alignment.as_word_value())])?;
        xml.end("w:pPr")?;

        for run in &paragraph.runs {
            self.write_run(xml, run)?;
        }

        xml.end("w:p")
    }

    fn write_run(&self, xml: &mut XmlOut, run: &Run) -> Result<(), LetterError> {
        xml.start("w:r", &[])?;

        xml.start("w:rPr", &[])?;
        if run.bold {
            xml.empty("w:b", &[])?;
        }
        if let Some(size) = run.size_pt {
            // Word sizes are in half-points
            let half_points = (size * 2).to_string();
            xml.empty("w:sz", &[("w:val", &half_points)])?;
            xml.empty("w:szCs", &[("w:val", &half_points)])?;
        }
        if run.underline {
            xml.empty("w:u", &[("w:val", "single")])?;
        }
        xml.end("w:rPr")?;

        for (i, line) in run.text.split('\n').enumerate() {
            if i > 0 {
                xml.empty("w:br", &[])?;
            }
            if !line.is_empty() {
                xml.start("w:t", &[("xml:space", "preserve")])?;
                xml.text(line)?;
                xml.end("w:t")?;
            }
        }

        xml.end("w:r")
    }

    fn write_row(&self, xml: &mut XmlOut, cells: &[Paragraph]) -> Result<(), LetterError> {
        let cell_pct = (5000 / cells.len().max(1)).to_string();

        xml.start("w:tbl", &[])?;
        xml.start("w:tblPr", &[])?;
        xml.empty("w:tblW", &[("w:w", "5000"), ("w:type", "pct")])?;
        xml.end("w:tblPr")?;

        xml.start("w:tblGrid", &[])?;
        for _ in cells {
            xml.empty("w:gridCol", &[])?;
        }
        xml.end("w:tblGrid")?;

        xml.start("w:tr", &[])?;
        for cell in cells {
            xml.start("w:tc", &[])?;
            xml.start("w:tcPr", &[])?;
            xml.empty("w:tcW", &[("w:w", &cell_pct), ("w:type", "pct")])?;
            xml.end("w:tcPr")?;
            self.write_paragraph(xml, cell)?;
            xml.end("w:tc")?;
        }
        xml.end("w:tr")?;

        xml.end("w:tbl")
    }

    fn styles_xml(&self) -> Result<Vec<u8>, LetterError> {
        let mut xml = XmlOut::new()?;
        let half_points = (self.size_pt * 2).to_string();
        let fonts = [
            ("w:ascii", self.font.as_str()),
            ("w:hAnsi", self.font.as_str()),
            ("w:cs", self.font.as_str()),
        ];

        xml.start("w:styles", &[("xmlns:w", WORD_NS)])?;

        xml.start("w:docDefaults", &[])?;
        xml.start("w:rPrDefault", &[])?;
        xml.start("w:rPr", &[])?;
        xml.empty("w:rFonts", &fonts)?;
        xml.empty("w:sz", &[("w:val", &half_points)])?;
        xml.empty("w:szCs", &[("w:val", &half_points)])?;
        xml.end("w:rPr")?;
        xml.end("w:rPrDefault")?;
        xml.end("w:docDefaults")?;

        xml.start(
            "w:style",
            &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")],
        )?;
        xml.empty("w:name", &[("w:val", "Normal")])?;
        xml.start("w:rPr", &[])?;
        xml.empty("w:rFonts", &fonts)?;
        xml.empty("w:sz", &[("w:val", &half_points)])?;
        xml.end("w:rPr")?;
        xml.end("w:style")?;

        xml.end("w:styles")?;
        Ok(xml.into_bytes())
    }
}

fn docx_error(e: impl std::fmt::Display) -> LetterError {
    LetterError::Docx(e.to_string())
}

/// Thin wrapper over the quick-xml writer that maps errors once.
struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Result<Self, LetterError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(docx_error)?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), LetterError> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(docx_error)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), LetterError> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.writer
            .write_event(Event::Empty(elem))
            .map_err(docx_error)
    }

    fn end(&mut self, name: &str) -> Result<(), LetterError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(docx_error)
    }

    fn text(&mut self, text: &str) -> Result<(), LetterError> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(docx_error)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quick_xml::Reader;
    use std::io::Read;

    /// Reads a part of a DOCX package as a string.
    pub(crate) fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut content = String::new();
        part.read_to_string(&mut content).unwrap();
        content
    }

    /// Concatenated `w:t` text of the main document, one line per paragraph.
    pub(crate) fn document_text(bytes: &[u8]) -> String {
        let xml = read_part(bytes, "word/document.xml");
        let mut reader = Reader::from_str(&xml);
        let mut text = String::new();
        let mut in_text = false;

        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
                Event::End(e) if e.local_name().as_ref() == b"t" => in_text = false,
                Event::End(e) if e.local_name().as_ref() == b"p" => text.push('\n'),
                Event::Text(e) if in_text => text.push_str(&e.decode().unwrap()),
                Event::GeneralRef(e) if in_text => match e.resolve_char_ref().unwrap() {
                    Some(ch) => text.push(ch),
                    None => {
                        let name = e.decode().unwrap();
                        text.push_str(quick_xml::escape::resolve_predefined_entity(&name).unwrap());
                    }
                },
                Event::Eof => break,
                _ => {}
            }
        }
        text
    }

    fn writer() -> DocxWriter {
        DocxWriter::default()
    }

    #[test]
    fn test_package_has_required_parts() {
        let bytes = writer()
            .to_bytes(&[Block::Paragraph(Paragraph::with_run(Run::new("Hello")))])
            .unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }
    }

    #[test]
    fn test_text_is_escaped_and_round_trips() {
        let bytes = writer()
            .to_bytes(&[Block::Paragraph(Paragraph::with_run(Run::new(
                "Smith & Sons <Insurance>",
            )))])
            .unwrap();

        assert!(read_part(&bytes, "word/document.xml").contains("Smith &amp; Sons &lt;Insurance&gt;"));
        assert_eq!(document_text(&bytes), "Smith & Sons <Insurance>\n");
    }

    #[test]
    fn test_run_formatting() {
        let paragraph = Paragraph::with_run(Run::new("TITLE").size(18).bold().underline())
            .align(Alignment::Justify)
            .spacing(80, 40);
        let bytes = writer().to_bytes(&[Block::Paragraph(paragraph)]).unwrap();
        let xml = read_part(&bytes, "word/document.xml");

        assert!(xml.contains(r#"<w:sz w:val="36"/>"#));
        assert!(xml.contains("<w:b/>"));
        assert!(xml.contains(r#"<w:u w:val="single"/>"#));
        assert!(xml.contains(r#"<w:jc w:val="both"/>"#));
        assert!(xml.contains(r#"<w:spacing w:before="80" w:after="40"/>"#));
    }

    #[test]
    fn test_newlines_become_breaks_and_page_breaks() {
        let bytes = writer()
            .to_bytes(&[
                Block::Paragraph(Paragraph::with_run(Run::new("line one\nline two"))),
                Block::PageBreak,
            ])
            .unwrap();
        let xml = read_part(&bytes, "word/document.xml");

        assert!(xml.contains("line one</w:t><w:br/>"));
        assert!(xml.contains(r#"<w:br w:type="page"/>"#));
    }

    #[test]
    fn test_row_renders_table_cells() {
        let bytes = writer()
            .to_bytes(&[Block::Row(vec![
                Paragraph::with_run(Run::new("left")),
                Paragraph::with_run(Run::new("right")).align(Alignment::Right),
            ])])
            .unwrap();
        let xml = read_part(&bytes, "word/document.xml");

        assert_eq!(xml.matches("<w:tc>").count(), 2);
        assert!(xml.contains(r#"<w:tcW w:w="2500" w:type="pct"/>"#));
    }

    #[test]
    fn test_styles_default_font() {
        let bytes = writer().to_bytes(&[]).unwrap();
        let styles = read_part(&bytes, "word/styles.xml");

        assert!(styles.contains(r#"w:ascii="Franklin Gothic Book""#));
        assert!(styles.contains(r#"<w:sz w:val="24"/>"#));
    }

    #[test]
    fn test_write_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letters/out.docx");

        writer().write_to_path(&[Block::PageBreak], &path).unwrap();
        assert!(path.exists());
    }
}
