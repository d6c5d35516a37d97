//! Minimal DOCX writer.
//!
//! A DOCX file is a zip container of OOXML parts. Three parts are enough
//! for Word, LibreOffice and pandoc to open it: the content-type map, the
//! package relationships, and the main document. The whole text goes into
//! one paragraph, each input line separated by a line break.

use crate::error::ConvertError;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Write `text` to `path` as a single-paragraph DOCX document.
pub fn write_docx(path: &Path, text: &str) -> Result<(), ConvertError> {
    let docx_err = |detail: String| ConvertError::Docx {
        path: path.to_path_buf(),
        detail,
    };

    let file = File::create(path).map_err(|e| ConvertError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/document.xml", document_xml(text)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)
            .map_err(|e| docx_err(format!("cannot start part {name}: {e}")))?;
        zip.write_all(body.as_bytes())
            .map_err(|e| docx_err(format!("cannot write part {name}: {e}")))?;
    }
    zip.finish()
        .map_err(|e| docx_err(format!("cannot finalise archive: {e}")))?;
    Ok(())
}

/// Render the main document part.
pub fn document_xml(text: &str) -> String {
    let mut run = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push_str("<w:br/>");
        }
        run.push_str("<w:t xml:space=\"preserve\">");
        run.push_str(&escape_xml(line.trim_end_matches('\r')));
        run.push_str("</w:t>");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
<w:body><w:p><w:r>{run}</w:r></w:p><w:sectPr/></w:body></w:document>"
    )
}

/// Escape markup characters and drop code points XML 1.0 forbids
/// (PDF text extraction regularly yields form feeds and NULs).
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push('\t'),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
