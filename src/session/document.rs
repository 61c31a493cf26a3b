//! Extraction results persisted per uploaded document.
use super::{read_json, write_json, SessionPaths};
use crate::processors::DocumentKind;
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// Schema version for `documents/<id>.json`.
pub const DOCUMENT_SCHEMA_VERSION: u32 = 1;

/// How the text of a source was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMethod {
    Text,
    PdfText,
    Docx,
    Ocr,
}

/// Provenance of an extracted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// File name as uploaded.
    pub original_name: String,
    /// Copy inside `sources/`, relative to the session root.
    pub stored_path: String,
    pub sha256: String,
    pub bytes: u64,
    pub text_method: TextMethod,
    /// Characters of text sent to the model (after truncation).
    pub chars: usize,
}

/// One uploaded document and the fields extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub schema_version: u32,
    pub id: String,
    pub kind: DocumentKind,
    pub source: SourceRef,
    pub extracted_at_epoch_ms: u128,
    pub fields: Map<String, Value>,
    /// Set when extraction failed and `fields` holds the kind's defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedDocument {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// String value of a top-level field, if present and non-empty.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Copy an uploaded file into `sources/`, named by content hash.
///
/// Returns the stored path relative to the session root and the hash.
pub fn store_source(paths: &SessionPaths, original: &Path, bytes: &[u8]) -> Result<(String, String)> {
    let sha256 = sha256_hex(bytes);
    let file_name = original
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("source path has no file name: {}", original.display()))?;
    let stored_name = format!("{}-{}", &sha256[..12], file_name);
    let dir = paths.sources_dir();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let target = dir.join(&stored_name);
    if !target.is_file() {
        fs::write(&target, bytes).with_context(|| format!("write {}", target.display()))?;
    }
    Ok((format!("sources/{stored_name}"), sha256))
}

/// Next free `doc-NNN` id.
pub fn next_document_id(paths: &SessionPaths) -> Result<String> {
    let max = document_files(paths)?
        .iter()
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
        .filter_map(id_number)
        .max()
        .unwrap_or(0);
    Ok(format!("doc-{:03}", max + 1))
}

pub fn load_document(paths: &SessionPaths, id: &str) -> Result<ExtractedDocument> {
    let path = paths.document_path(id);
    if !path.is_file() {
        return Err(anyhow!("unknown document id {id:?}"));
    }
    let doc: ExtractedDocument = read_json(&path)?;
    if doc.schema_version != DOCUMENT_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported document schema_version {} in {}",
            doc.schema_version,
            path.display()
        ));
    }
    Ok(doc)
}

/// Load every extracted document, ordered by id.
pub fn load_documents(paths: &SessionPaths) -> Result<Vec<ExtractedDocument>> {
    let mut docs = Vec::new();
    for path in document_files(paths)? {
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        docs.push(load_document(paths, id)?);
    }
    docs.sort_by(|a, b| compare_ids(&a.id, &b.id));
    Ok(docs)
}

pub fn write_document(paths: &SessionPaths, doc: &ExtractedDocument) -> Result<()> {
    write_json(&paths.document_path(&doc.id), doc)
}

/// Order document ids by their numeric suffix, so `doc-999` precedes `doc-1000`.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    id_number(a).cmp(&id_number(b)).then_with(|| a.cmp(b))
}

fn id_number(id: &str) -> Option<u32> {
    id.strip_prefix("doc-")?.parse().ok()
}

/// Find a successful extraction of the same content for the same kind.
pub fn find_by_hash<'a>(
    docs: &'a [ExtractedDocument],
    kind: DocumentKind,
    sha256: &str,
) -> Option<&'a ExtractedDocument> {
    docs.iter()
        .find(|doc| doc.kind == kind && doc.source.sha256 == sha256 && !doc.is_failed())
}

/// A failed extraction of the same content for the same kind, which a new
/// attempt replaces in place.
pub fn find_failed_by_hash<'a>(
    docs: &'a [ExtractedDocument],
    kind: DocumentKind,
    sha256: &str,
) -> Option<&'a ExtractedDocument> {
    docs.iter()
        .find(|doc| doc.kind == kind && doc.source.sha256 == sha256 && doc.is_failed())
}

fn document_files(paths: &SessionPaths) -> Result<Vec<PathBuf>> {
    let dir = paths.documents_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry.context("read documents entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, sha: &str, error: Option<&str>) -> ExtractedDocument {
        ExtractedDocument {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            id: id.to_string(),
            kind: DocumentKind::Visura,
            source: SourceRef {
                original_name: "visura.pdf".to_string(),
                stored_path: "sources/x-visura.pdf".to_string(),
                sha256: sha.to_string(),
                bytes: 10,
                text_method: TextMethod::PdfText,
                chars: 10,
            },
            extracted_at_epoch_ms: 0,
            fields: Map::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn ids_increase_past_the_highest_existing_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SessionPaths::new(dir.path().to_path_buf());
        assert_eq!(next_document_id(&paths).unwrap(), "doc-001");

        write_document(&paths, &sample("doc-001", "aa", None)).unwrap();
        write_document(&paths, &sample("doc-007", "bb", None)).unwrap();
        assert_eq!(next_document_id(&paths).unwrap(), "doc-008");

        let docs = load_documents(&paths).unwrap();
        let ids: Vec<_> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-001", "doc-007"]);
    }

    #[test]
    fn ids_sort_numerically_past_three_digits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SessionPaths::new(dir.path().to_path_buf());
        write_document(&paths, &sample("doc-1000", "aa", None)).unwrap();
        write_document(&paths, &sample("doc-999", "bb", None)).unwrap();
        write_document(&paths, &sample("doc-002", "cc", None)).unwrap();

        let docs = load_documents(&paths).unwrap();
        let ids: Vec<_> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-002", "doc-999", "doc-1000"]);
        assert_eq!(next_document_id(&paths).unwrap(), "doc-1001");
    }

    #[test]
    fn find_by_hash_ignores_failed_extractions() {
        let docs = vec![
            sample("doc-001", "aa", Some("timeout")),
            sample("doc-002", "aa", None),
        ];
        let found = find_by_hash(&docs, DocumentKind::Visura, "aa").expect("match");
        assert_eq!(found.id, "doc-002");
        assert!(find_by_hash(&docs, DocumentKind::Bilancio, "aa").is_none());

        let failed = find_failed_by_hash(&docs, DocumentKind::Visura, "aa").expect("failed match");
        assert_eq!(failed.id, "doc-001");
        assert!(find_failed_by_hash(&docs, DocumentKind::Visura, "bb").is_none());
    }

    #[test]
    fn store_source_is_content_addressed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SessionPaths::new(dir.path().to_path_buf());
        let (rel, sha) = store_source(&paths, Path::new("/tmp/in/visura.txt"), b"ciao").unwrap();
        assert!(rel.starts_with("sources/"));
        assert!(rel.ends_with("-visura.txt"));
        assert_eq!(sha, sha256_hex(b"ciao"));
        assert!(dir.path().join(&rel).is_file());
    }

    #[test]
    fn field_str_skips_blank_values() {
        let mut doc = sample("doc-001", "aa", None);
        doc.fields
            .insert("denominazione".to_string(), Value::String("  ".to_string()));
        doc.fields
            .insert("pec".to_string(), Value::String(" a@pec.it ".to_string()));
        assert_eq!(doc.field_str("denominazione"), None);
        assert_eq!(doc.field_str("pec"), Some("a@pec.it"));
    }
}
