use super::*;
use crate::fieldpath::{as_append, parse_set_arg};
use crate::session::{SourceRef, TextMethod, DOCUMENT_SCHEMA_VERSION};

fn doc(id: &str, kind: DocumentKind, fields: Value) -> ExtractedDocument {
    let Value::Object(fields) = fields else {
        panic!("fields must be an object");
    };
    ExtractedDocument {
        schema_version: DOCUMENT_SCHEMA_VERSION,
        id: id.to_string(),
        kind,
        source: SourceRef {
            original_name: format!("{id}.pdf"),
            stored_path: format!("sources/{id}.pdf"),
            sha256: id.to_string(),
            bytes: 1,
            text_method: TextMethod::PdfText,
            chars: 1,
        },
        extracted_at_epoch_ms: 0,
        fields,
        error: None,
    }
}

fn visura(id: &str, denominazione: &str, pec: &str) -> ExtractedDocument {
    doc(
        id,
        DocumentKind::Visura,
        json!({
            "denominazione": denominazione,
            "pec": pec,
            "soci": [],
            "amministratori": []
        }),
    )
}

#[test]
fn first_non_blank_value_wins_with_provenance() {
    let docs = vec![
        visura("doc-001", "Alfa S.r.l.", ""),
        visura("doc-002", "ALFA SRL", "alfa@pec.it"),
    ];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["denominazione"], "Alfa S.r.l.");
    assert_eq!(merged.fields["pec"], "alfa@pec.it");
    assert_eq!(merged.provenance["denominazione"], "doc-001");
    assert_eq!(merged.provenance["pec"], "doc-002");
    assert_eq!(merged.documents, vec!["doc-001", "doc-002"]);
}

#[test]
fn preferred_documents_are_visited_first() {
    let docs = vec![
        visura("doc-001", "Alfa S.r.l.", ""),
        visura("doc-002", "ALFA SRL", "alfa@pec.it"),
    ];
    let merged = build_merged(&docs, &["doc-002".to_string()], &[]).unwrap();
    assert_eq!(merged.fields["denominazione"], "ALFA SRL");
    assert_eq!(merged.provenance["denominazione"], "doc-002");
    assert_eq!(merged.documents, vec!["doc-002", "doc-001"]);
}

#[test]
fn unknown_preferred_id_is_an_error() {
    let docs = vec![visura("doc-001", "Alfa", "")];
    let err = build_merged(&docs, &["doc-009".to_string()], &[]).unwrap_err();
    assert!(err.to_string().contains("doc-009"));
}

#[test]
fn failed_extractions_do_not_contribute() {
    let mut failed = visura("doc-001", "Sbagliata", "");
    failed.error = Some("timeout".to_string());
    let docs = vec![failed, visura("doc-002", "Alfa", "")];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["denominazione"], "Alfa");
}

#[test]
fn person_lists_union_by_codice_fiscale_then_name() {
    let first = doc(
        "doc-001",
        DocumentKind::Visura,
        json!({
            "soci": [
                {"nome": "Mario Rossi", "codice_fiscale": "RSSMRA80A01H501U", "quota": ""},
                {"nome": "Anna Bianchi", "codice_fiscale": "", "quota": "40%"}
            ]
        }),
    );
    let second = doc(
        "doc-002",
        DocumentKind::Generico,
        json!({
            "soci": [
                {"nome": "ROSSI MARIO", "codice_fiscale": "rssmra80a01h501u", "quota": "60%"},
                {"nome": "anna  bianchi", "codice_fiscale": "", "quota": "10%"},
                {"nome": "Carlo Verdi", "codice_fiscale": ""}
            ]
        }),
    );
    let merged = build_merged(&[first, second], &[], &[]).unwrap();
    let soci = merged.fields["soci"].as_array().unwrap();
    assert_eq!(soci.len(), 3);
    assert_eq!(soci[0]["nome"], "Mario Rossi");
    assert_eq!(soci[0]["quota"], "60%");
    assert_eq!(soci[1]["quota"], "40%");
    assert_eq!(soci[2]["nome"], "Carlo Verdi");
    assert_eq!(merged.provenance["soci"], "doc-001");
}

#[test]
fn bilancio_fills_its_own_block_and_missing_identity() {
    let docs = vec![
        doc(
            "doc-001",
            DocumentKind::Bilancio,
            json!({
                "denominazione": "Alfa S.r.l.",
                "codice_fiscale": "01234567890",
                "esercizio": "2025",
                "utile_perdita": "12.500"
            }),
        ),
        visura("doc-002", "", "alfa@pec.it"),
    ];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["bilancio"]["esercizio"], "2025");
    assert_eq!(merged.fields["denominazione"], "Alfa S.r.l.");
    assert_eq!(merged.fields["codice_fiscale"], "01234567890");
    assert_eq!(merged.provenance["bilancio.esercizio"], "doc-001");
    assert_eq!(merged.provenance["denominazione"], "doc-001");
}

#[test]
fn per_document_kinds_are_collected_into_lists() {
    let docs = vec![
        doc(
            "doc-001",
            DocumentKind::DocumentoIdentita,
            json!({"nome": "Mario", "cognome": "Rossi", "codice_fiscale": "X"}),
        ),
        doc(
            "doc-002",
            DocumentKind::Fattura,
            json!({"numero": "12", "importo_totale": "100"}),
        ),
        doc(
            "doc-003",
            DocumentKind::Contratto,
            json!({"tipo": "locazione", "parti": []}),
        ),
    ];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["persone"][0]["nome_completo"], "Mario Rossi");
    assert_eq!(merged.fields["persone"][0]["documento_id"], "doc-001");
    assert_eq!(merged.fields["fatture"][0]["numero"], "12");
    assert_eq!(merged.fields["fatture"][0]["documento_id"], "doc-002");
    assert_eq!(merged.fields["contratti"][0]["documento_id"], "doc-003");
}

#[test]
fn assemblea_block_always_exists_and_presidente_defaults() {
    let empty = build_merged(&[], &[], &[]).unwrap();
    assert_eq!(empty.fields["assemblea"]["tipo"], "");
    assert_eq!(empty.fields["assemblea"]["totalitaria"], true);
    assert_eq!(empty.fields["soci"], json!([]));

    let docs = vec![doc(
        "doc-001",
        DocumentKind::Visura,
        json!({"amministratori": [{"nome": " ", "carica": ""}, {"nome": "Luca Neri", "carica": "amministratore unico"}]}),
    )];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["assemblea"]["presidente"], "Luca Neri");
}

#[test]
fn edits_are_replayed_and_stale_edits_kept() {
    let docs = vec![visura("doc-001", "Alfa", "")];
    let edits = vec![
        Edit::Set {
            path: "assemblea.data".to_string(),
            value: json!("30/04/2026"),
        },
        Edit::Set {
            path: "denominazione".to_string(),
            value: json!("Alfa S.r.l."),
        },
        Edit::Set {
            path: "soci.3.nome".to_string(),
            value: json!("Nessuno"),
        },
    ];
    let merged = build_merged(&docs, &[], &edits).unwrap();
    assert_eq!(merged.fields["assemblea"]["data"], "30/04/2026");
    assert_eq!(merged.fields["denominazione"], "Alfa S.r.l.");
    assert_eq!(merged.edits.len(), 3);
}

#[test]
fn appended_person_survives_a_merge_that_grows_the_list() {
    let first = doc(
        "doc-001",
        DocumentKind::Visura,
        json!({"soci": [{"nome": "Mario Rossi"}, {"nome": "Anna Bianchi"}]}),
    );
    let merged = build_merged(std::slice::from_ref(&first), &[], &[]).unwrap();
    let edit = as_append(
        &merged.fields,
        parse_set_arg("soci.2={\"nome\":\"Carlo Verdi\"}").unwrap(),
    );
    assert_eq!(edit.path(), "soci.-");

    let second = doc(
        "doc-002",
        DocumentKind::Generico,
        json!({"soci": [{"nome": "Luca Neri"}]}),
    );
    let merged = build_merged(&[first, second], &[], &[edit]).unwrap();
    let names: Vec<_> = merged.fields["soci"]
        .as_array()
        .unwrap()
        .iter()
        .map(|socio| socio["nome"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Mario Rossi", "Anna Bianchi", "Luca Neri", "Carlo Verdi"]);
}

#[test]
fn unpreferred_documents_merge_in_numeric_id_order() {
    let docs = vec![
        visura("doc-1000", "Nuova S.r.l.", ""),
        visura("doc-999", "Vecchia S.r.l.", ""),
    ];
    let merged = build_merged(&docs, &[], &[]).unwrap();
    assert_eq!(merged.fields["denominazione"], "Vecchia S.r.l.");
    assert_eq!(merged.documents, vec!["doc-999", "doc-1000"]);
}

#[test]
fn data_file_round_trips_through_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = SessionPaths::new(dir.path().to_path_buf());
    assert!(load_merged_optional(&paths).unwrap().is_none());

    let merged = build_merged(&[visura("doc-001", "Alfa", "")], &[], &[]).unwrap();
    write_merged(&paths, &merged).unwrap();
    let loaded = load_merged_optional(&paths).unwrap().expect("data.json");
    assert_eq!(loaded, merged);
}
