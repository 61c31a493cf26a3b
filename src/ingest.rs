//! Source document ingestion.
//!
//! Turns an uploaded file into plain text for the extraction prompt. Text
//! formats are read directly, PDFs through their text layer, DOCX through the
//! main document part. Scans and images go through the OCR endpoint.
use crate::config::SessionConfig;
use crate::lm::OcrProvider;
use crate::session::TextMethod;
use crate::util::truncate_chars;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;

/// File formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Pdf,
    Docx,
    Image { mime: &'static str },
}

impl SourceFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Image { mime } => mime,
        }
    }
}

/// Text obtained from a source, ready for prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub method: TextMethod,
    /// True when the text was cut at `max_document_chars`.
    pub truncated: bool,
}

/// Determine the upload format from the file extension.
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| anyhow!("cannot determine file type of {}", path.display()))?;
    match ext.as_str() {
        "txt" | "md" | "text" => Ok(SourceFormat::Text),
        "pdf" => Ok(SourceFormat::Pdf),
        "docx" => Ok(SourceFormat::Docx),
        "png" => Ok(SourceFormat::Image { mime: "image/png" }),
        "jpg" | "jpeg" => Ok(SourceFormat::Image { mime: "image/jpeg" }),
        other => Err(anyhow!(
            "unsupported file type .{other} for {} (expected pdf, txt, docx, png, jpg)",
            path.display()
        )),
    }
}

/// Read the text of a source, falling back to OCR for scans and images.
pub fn read_source_text(
    path: &Path,
    bytes: &[u8],
    config: &SessionConfig,
    ocr: Option<&dyn OcrProvider>,
) -> Result<SourceText> {
    let format = detect_format(path)?;
    let (raw, method) = match format {
        SourceFormat::Text => (String::from_utf8_lossy(bytes).into_owned(), TextMethod::Text),
        SourceFormat::Docx => (
            docx_text(bytes).with_context(|| format!("read docx {}", path.display()))?,
            TextMethod::Docx,
        ),
        SourceFormat::Pdf => {
            let text = match pdf_extract::extract_text_from_mem(bytes) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "pdf text layer unreadable");
                    String::new()
                }
            };
            if text.trim().chars().count() >= config.min_pdf_text_chars {
                (text, TextMethod::PdfText)
            } else {
                tracing::info!(path = %path.display(), "pdf has no usable text layer; using OCR");
                (run_ocr(path, bytes, format, ocr)?, TextMethod::Ocr)
            }
        }
        SourceFormat::Image { .. } => (run_ocr(path, bytes, format, ocr)?, TextMethod::Ocr),
    };
    let normalized = normalize_text(&raw);
    if normalized.is_empty() {
        return Err(anyhow!("no text found in {}", path.display()));
    }
    let truncated_text = truncate_chars(&normalized, config.max_document_chars);
    let truncated = truncated_text.len() < normalized.len();
    if truncated {
        tracing::warn!(
            path = %path.display(),
            max_chars = config.max_document_chars,
            "document text truncated"
        );
    }
    Ok(SourceText {
        text: truncated_text,
        method,
        truncated,
    })
}

fn run_ocr(
    path: &Path,
    bytes: &[u8],
    format: SourceFormat,
    ocr: Option<&dyn OcrProvider>,
) -> Result<String> {
    let provider = ocr.ok_or_else(|| {
        anyhow!(
            "{} needs OCR, which requires the http backend",
            path.display()
        )
    })?;
    provider
        .ocr(bytes, format.mime())
        .with_context(|| format!("OCR {}", path.display()))
}

/// Extract paragraph text from the main part of a DOCX container.
pub fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open docx container")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("docx has no word/document.xml")?
        .read_to_string(&mut xml)
        .context("read word/document.xml")?;

    let pattern = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>")
        .context("compile docx text pattern")?;
    let mut text = String::new();
    for caps in pattern.captures_iter(&xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None if caps[0].starts_with("<w:tab") => text.push('\t'),
            None => text.push('\n'),
        }
    }
    Ok(text)
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapse whitespace inside lines and runs of blank lines.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0usize;
    for line in raw.replace('\r', "").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(&collapsed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::io::Write;
    use std::path::PathBuf;

    struct FakeOcr;

    impl OcrProvider for FakeOcr {
        fn ocr(&self, _bytes: &[u8], mime: &str) -> Result<String> {
            Ok(format!("testo da ocr ({mime})"))
        }
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("a/B.PDF")).unwrap(), SourceFormat::Pdf);
        assert_eq!(detect_format(Path::new("x.txt")).unwrap(), SourceFormat::Text);
        assert_eq!(
            detect_format(Path::new("x.jpeg")).unwrap(),
            SourceFormat::Image { mime: "image/jpeg" }
        );
        let err = detect_format(Path::new("x.xls")).unwrap_err();
        assert!(err.to_string().contains(".xls"));
        assert!(detect_format(Path::new("noext")).is_err());
    }

    #[test]
    fn normalize_text_collapses_spacing() {
        let raw = "Denominazione:   ALFA  S.R.L.\r\n\r\n\r\n  Sede:\tMilano \n";
        assert_eq!(
            normalize_text(raw),
            "Denominazione: ALFA S.R.L.\n\nSede: Milano"
        );
    }

    #[test]
    fn docx_text_joins_runs_and_paragraphs() {
        let xml = r#"<w:document><w:body>
<w:p><w:r><w:t>Alfa</w:t></w:r><w:r><w:t xml:space="preserve"> S.r.l. &amp; C.</w:t></w:r></w:p>
<w:p><w:r><w:t>Capitale</w:t><w:tab/><w:t>10.000</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cella</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;
        let text = docx_text(&docx_bytes(xml)).unwrap();
        assert_eq!(normalize_text(&text), "Alfa S.r.l. & C.\nCapitale 10.000\nCella");
    }

    #[test]
    fn read_text_source_truncates_to_limit() {
        let mut config = default_config();
        config.max_document_chars = 5;
        let text = read_source_text(Path::new("a.txt"), "àèìòù tail".as_bytes(), &config, None)
            .unwrap();
        assert_eq!(text.text, "àèìòù");
        assert!(text.truncated);
        assert_eq!(text.method, TextMethod::Text);
    }

    #[test]
    fn images_require_ocr_provider() {
        let config = default_config();
        let path = PathBuf::from("scan.png");
        let err = read_source_text(&path, b"\x89PNG", &config, None).unwrap_err();
        assert!(err.to_string().contains("OCR"));

        let text = read_source_text(&path, b"\x89PNG", &config, Some(&FakeOcr)).unwrap();
        assert_eq!(text.method, TextMethod::Ocr);
        assert_eq!(text.text, "testo da ocr (image/png)");
    }

    #[test]
    fn unreadable_pdf_falls_back_to_ocr() {
        let config = default_config();
        let text =
            read_source_text(Path::new("scan.pdf"), b"not a pdf", &config, Some(&FakeOcr))
                .unwrap();
        assert_eq!(text.method, TextMethod::Ocr);
        assert!(text.text.contains("application/pdf"));
    }

    #[test]
    fn empty_text_is_an_error() {
        let config = default_config();
        assert!(read_source_text(Path::new("a.txt"), b"  \n\n ", &config, None).is_err());
    }
}
