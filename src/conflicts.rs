//! Cross-document conflict detection on company identity fields.
use crate::processors::DocumentKind;
use crate::session::{compare_ids, ExtractedDocument};
use crate::util::normalize_for_compare;
use serde::Serialize;

/// Fields compared across documents.
pub const CONFLICT_FIELDS: [&str; 8] = [
    "denominazione",
    "codice_fiscale",
    "partita_iva",
    "sede_legale",
    "capitale_sociale",
    "numero_rea",
    "forma_giuridica",
    "pec",
];

/// One field on which at least two documents disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub field: String,
    /// Every distinct (document id, value) pair involved, in document order.
    pub values: Vec<ConflictValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictValue {
    pub document_id: String,
    pub value: String,
}

/// Kinds whose top-level fields describe the company itself.
///
/// An identity card's `codice_fiscale` belongs to a person, and invoices and
/// contracts name counterparties, so those kinds are never compared.
fn describes_company(kind: DocumentKind) -> bool {
    matches!(
        kind,
        DocumentKind::Visura | DocumentKind::Bilancio | DocumentKind::Generico
    )
}

/// Compare every pair of company documents on every tracked field.
///
/// Blank values never conflict; values are compared after trimming,
/// lowercasing and collapsing whitespace. Failed extractions are skipped.
pub fn detect_conflicts(docs: &[ExtractedDocument]) -> Vec<Conflict> {
    let usable: Vec<&ExtractedDocument> = docs
        .iter()
        .filter(|doc| !doc.is_failed() && describes_company(doc.kind))
        .collect();
    let mut conflicts = Vec::new();
    for field in CONFLICT_FIELDS {
        let mut values: Vec<ConflictValue> = Vec::new();
        for (i, left) in usable.iter().enumerate() {
            for right in &usable[i + 1..] {
                let (Some(a), Some(b)) = (left.field_str(field), right.field_str(field)) else {
                    continue;
                };
                if normalize_for_compare(a) == normalize_for_compare(b) {
                    continue;
                }
                push_distinct(&mut values, &left.id, a);
                push_distinct(&mut values, &right.id, b);
            }
        }
        if !values.is_empty() {
            values.sort_by(|a, b| compare_ids(&a.document_id, &b.document_id));
            conflicts.push(Conflict {
                field: field.to_string(),
                values,
            });
        }
    }
    conflicts
}

fn push_distinct(values: &mut Vec<ConflictValue>, document_id: &str, value: &str) {
    if values.iter().any(|existing| existing.document_id == document_id) {
        return;
    }
    values.push(ConflictValue {
        document_id: document_id.to_string(),
        value: value.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SourceRef, TextMethod, DOCUMENT_SCHEMA_VERSION};
    use serde_json::{json, Value};

    fn doc(id: &str, fields: Value) -> ExtractedDocument {
        doc_of(id, DocumentKind::Visura, fields)
    }

    fn doc_of(id: &str, kind: DocumentKind, fields: Value) -> ExtractedDocument {
        let Value::Object(fields) = fields else {
            panic!("object");
        };
        ExtractedDocument {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            id: id.to_string(),
            kind,
            source: SourceRef {
                original_name: "a.txt".to_string(),
                stored_path: "sources/a.txt".to_string(),
                sha256: id.to_string(),
                bytes: 1,
                text_method: TextMethod::Text,
                chars: 1,
            },
            extracted_at_epoch_ms: 0,
            fields,
            error: None,
        }
    }

    #[test]
    fn differing_values_are_reported_once_per_field() {
        let docs = vec![
            doc("doc-001", json!({"denominazione": "Alfa S.r.l.", "pec": "a@pec.it"})),
            doc("doc-002", json!({"denominazione": "Beta S.r.l.", "pec": "A@PEC.IT "})),
            doc("doc-003", json!({"denominazione": "Gamma S.r.l."})),
        ];
        let conflicts = detect_conflicts(&docs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "denominazione");
        let ids: Vec<_> = conflicts[0]
            .values
            .iter()
            .map(|value| value.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["doc-001", "doc-002", "doc-003"]);
        assert_eq!(conflicts[0].values[1].value, "Beta S.r.l.");
    }

    #[test]
    fn blanks_and_whitespace_differences_never_conflict() {
        let docs = vec![
            doc("doc-001", json!({"sede_legale": "Via  Roma 1,\nMilano", "codice_fiscale": ""})),
            doc("doc-002", json!({"sede_legale": "via roma 1, milano", "codice_fiscale": "0123"})),
            doc("doc-003", json!({"numero_rea": 12345})),
        ];
        assert!(detect_conflicts(&docs).is_empty());
    }

    #[test]
    fn failed_documents_are_ignored() {
        let mut failed = doc("doc-001", json!({"denominazione": "Errata"}));
        failed.error = Some("timeout".to_string());
        let docs = vec![failed, doc("doc-002", json!({"denominazione": "Alfa"}))];
        assert!(detect_conflicts(&docs).is_empty());
    }

    #[test]
    fn person_and_counterparty_documents_are_not_compared() {
        let docs = vec![
            doc("doc-001", json!({"codice_fiscale": "01234567890", "denominazione": "Alfa S.r.l."})),
            doc_of(
                "doc-002",
                DocumentKind::DocumentoIdentita,
                json!({"codice_fiscale": "RSSMRA70A01F205X"}),
            ),
            doc_of(
                "doc-003",
                DocumentKind::Fattura,
                json!({"denominazione": "Fornitore S.p.A.", "partita_iva": "09876543210"}),
            ),
            doc_of(
                "doc-004",
                DocumentKind::Bilancio,
                json!({"codice_fiscale": "01234567890"}),
            ),
        ];
        assert!(detect_conflicts(&docs).is_empty());
    }

    #[test]
    fn values_follow_numeric_id_order() {
        let docs = vec![
            doc("doc-1000", json!({"denominazione": "Nuova"})),
            doc("doc-999", json!({"denominazione": "Vecchia"})),
        ];
        let conflicts = detect_conflicts(&docs);
        let ids: Vec<_> = conflicts[0]
            .values
            .iter()
            .map(|value| value.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["doc-999", "doc-1000"]);
    }
}
