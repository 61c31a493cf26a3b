//! Merge extracted documents into the data a template consumes.
//!
//! Documents are visited in preference order; for scalar fields the first
//! non-blank value wins, person lists are unioned, and per-person or
//! per-contract documents are collected into lists. Stored user edits are
//! replayed after every merge so re-running extraction never loses them.
use crate::fieldpath::{apply_edit, is_blank, Edit};
use crate::processors::DocumentKind;
use crate::session::{compare_ids, read_json, write_json, ExtractedDocument, SessionPaths};
use crate::util::{now_epoch_ms, normalize_for_compare};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Schema version for `data.json`.
pub const DATA_SCHEMA_VERSION: u32 = 1;

/// Lists of natural persons unioned across documents.
pub const PERSON_LISTS: [&str; 3] = ["soci", "amministratori", "sindaci"];

/// Company identity fields a balance sheet may supply.
const IDENTITY_FIELDS: [&str; 2] = ["denominazione", "codice_fiscale"];

/// Merged data, its provenance, and the user's edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedData {
    pub schema_version: u32,
    pub merged_at_epoch_ms: u128,
    /// Document ids given priority, in order.
    #[serde(default)]
    pub preferred: Vec<String>,
    /// Every document id that took part in the merge.
    #[serde(default)]
    pub documents: Vec<String>,
    pub fields: Map<String, Value>,
    /// Field path → id of the document that supplied it.
    #[serde(default)]
    pub provenance: BTreeMap<String, String>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

/// Default meeting block, always present so it can be edited.
///
/// An empty `tipo` means the chosen template's meeting type; a non-empty
/// `ordine_del_giorno` replaces the template's agenda.
pub fn assemblea_defaults() -> Value {
    json!({
        "data": "",
        "ora": "",
        "ora_chiusura": "",
        "luogo": "",
        "presidente": "",
        "segretario": "",
        "tipo": "",
        "convocazione": "",
        "totalitaria": true,
        "presenti": [],
        "ordine_del_giorno": []
    })
}

pub fn load_merged_optional(paths: &SessionPaths) -> Result<Option<MergedData>> {
    let path = paths.data_path();
    if !path.is_file() {
        return Ok(None);
    }
    let data: MergedData = read_json(&path)?;
    if data.schema_version != DATA_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported data.json schema_version {}",
            data.schema_version
        ));
    }
    Ok(Some(data))
}

pub fn write_merged(paths: &SessionPaths, data: &MergedData) -> Result<()> {
    write_json(&paths.data_path(), data)
}

/// Merge documents and replay edits.
///
/// Documents outside `preferred` are visited in numeric id order. Edits that
/// no longer apply (e.g. an index past the end of a shorter list)
/// are skipped with a warning but kept for later merges.
pub fn build_merged(
    docs: &[ExtractedDocument],
    preferred: &[String],
    edits: &[Edit],
) -> Result<MergedData> {
    let ordered = order_documents(docs, preferred)?;
    let mut merger = Merger::default();
    for doc in &ordered {
        if doc.is_failed() {
            tracing::debug!(id = %doc.id, "skip failed extraction in merge");
            continue;
        }
        merger.add(doc);
    }
    let mut fields = merger.finish();

    for edit in edits {
        if let Err(err) = apply_edit(&mut fields, edit) {
            tracing::warn!(path = edit.path(), error = %err, "stored edit no longer applies");
        }
    }

    Ok(MergedData {
        schema_version: DATA_SCHEMA_VERSION,
        merged_at_epoch_ms: now_epoch_ms()?,
        preferred: preferred.to_vec(),
        documents: ordered.iter().map(|doc| doc.id.clone()).collect(),
        fields,
        provenance: merger.provenance,
        edits: edits.to_vec(),
    })
}

fn order_documents<'a>(
    docs: &'a [ExtractedDocument],
    preferred: &[String],
) -> Result<Vec<&'a ExtractedDocument>> {
    let mut ordered = Vec::with_capacity(docs.len());
    for id in preferred {
        let doc = docs
            .iter()
            .find(|doc| &doc.id == id)
            .ok_or_else(|| anyhow!("--prefer names unknown document {id:?}"))?;
        if !ordered.iter().any(|seen: &&ExtractedDocument| seen.id == doc.id) {
            ordered.push(doc);
        }
    }
    let mut rest: Vec<&ExtractedDocument> = docs
        .iter()
        .filter(|doc| !preferred.contains(&doc.id))
        .collect();
    rest.sort_by(|a, b| compare_ids(&a.id, &b.id));
    ordered.extend(rest);
    Ok(ordered)
}

#[derive(Default)]
struct Merger {
    root: Map<String, Value>,
    bilancio: Map<String, Value>,
    persone: Vec<Value>,
    fatture: Vec<Value>,
    contratti: Vec<Value>,
    provenance: BTreeMap<String, String>,
}

impl Merger {
    fn add(&mut self, doc: &ExtractedDocument) {
        match doc.kind {
            DocumentKind::Visura | DocumentKind::Generico => {
                merge_first_wins(&mut self.root, &doc.fields, &doc.id, "", &mut self.provenance);
            }
            DocumentKind::Bilancio => {
                merge_first_wins(
                    &mut self.bilancio,
                    &doc.fields,
                    &doc.id,
                    "bilancio.",
                    &mut self.provenance,
                );
            }
            DocumentKind::DocumentoIdentita => {
                self.persone.push(with_document_id(person_record(&doc.fields), &doc.id));
            }
            DocumentKind::Fattura => {
                self.fatture.push(with_document_id(doc.fields.clone(), &doc.id));
            }
            DocumentKind::Contratto => {
                self.contratti.push(with_document_id(doc.fields.clone(), &doc.id));
            }
        }
    }

    fn finish(&mut self) -> Map<String, Value> {
        let mut fields = std::mem::take(&mut self.root);

        for key in IDENTITY_FIELDS {
            let root_blank = fields.get(key).map(is_blank).unwrap_or(true);
            let candidate = self.bilancio.get(key).filter(|value| !is_blank(value));
            if let (true, Some(value)) = (root_blank, candidate) {
                fields.insert(key.to_string(), value.clone());
                if let Some(source) = self.provenance.get(&format!("bilancio.{key}")).cloned() {
                    self.provenance.insert(key.to_string(), source);
                }
            }
        }
        for key in PERSON_LISTS {
            fields
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
        }

        fields.insert(
            "bilancio".to_string(),
            Value::Object(std::mem::take(&mut self.bilancio)),
        );
        fields.insert(
            "persone".to_string(),
            Value::Array(std::mem::take(&mut self.persone)),
        );
        fields.insert(
            "fatture".to_string(),
            Value::Array(std::mem::take(&mut self.fatture)),
        );
        fields.insert(
            "contratti".to_string(),
            Value::Array(std::mem::take(&mut self.contratti)),
        );

        let mut assemblea = assemblea_defaults();
        if let Some(presidente) = first_administrator(&fields) {
            assemblea["presidente"] = Value::String(presidente);
        }
        fields.insert("assemblea".to_string(), assemblea);
        fields
            .entry("delibera".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        fields
    }
}

fn merge_first_wins(
    target: &mut Map<String, Value>,
    source: &Map<String, Value>,
    doc_id: &str,
    prefix: &str,
    provenance: &mut BTreeMap<String, String>,
) {
    for (key, value) in source {
        if PERSON_LISTS.contains(&key.as_str()) {
            let list = target
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let (Value::Array(existing), Value::Array(incoming)) = (list, value) {
                if union_persons(existing, incoming) {
                    provenance
                        .entry(format!("{prefix}{key}"))
                        .or_insert_with(|| doc_id.to_string());
                }
            }
            continue;
        }
        let current_blank = target.get(key).map(is_blank).unwrap_or(true);
        if current_blank {
            let incoming_blank = is_blank(value);
            if !incoming_blank || !target.contains_key(key) {
                target.insert(key.clone(), value.clone());
            }
            if !incoming_blank {
                provenance.insert(format!("{prefix}{key}"), doc_id.to_string());
            }
        }
    }
}

/// Union `incoming` persons into `existing`; returns true when anything changed.
fn union_persons(existing: &mut Vec<Value>, incoming: &[Value]) -> bool {
    let mut changed = false;
    for person in incoming {
        let Value::Object(person_map) = person else {
            continue;
        };
        let Some(key) = person_key(person_map) else {
            continue;
        };
        let matched = existing.iter_mut().find_map(|current| match current {
            Value::Object(map) if person_key(map).as_deref() == Some(key.as_str()) => Some(map),
            _ => None,
        });
        match matched {
            Some(current) => {
                for (field, value) in person_map {
                    let blank = current.get(field).map(is_blank).unwrap_or(true);
                    if blank && !is_blank(value) {
                        current.insert(field.clone(), value.clone());
                        changed = true;
                    }
                }
            }
            None => {
                existing.push(person.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Identity of a person: codice fiscale when known, else the name.
fn person_key(person: &Map<String, Value>) -> Option<String> {
    let text = |key: &str| {
        person
            .get(key)
            .and_then(Value::as_str)
            .map(normalize_for_compare)
            .filter(|value| !value.is_empty())
    };
    text("codice_fiscale")
        .map(|cf| format!("cf:{cf}"))
        .or_else(|| text("nome").map(|nome| format!("nome:{nome}")))
}

fn person_record(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut record = fields.clone();
    let part = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };
    let full_name = format!("{} {}", part("nome"), part("cognome"))
        .trim()
        .to_string();
    record.insert("nome_completo".to_string(), Value::String(full_name));
    record
}

fn with_document_id(mut record: Map<String, Value>, doc_id: &str) -> Value {
    record.insert(
        "documento_id".to_string(),
        Value::String(doc_id.to_string()),
    );
    Value::Object(record)
}

fn first_administrator(fields: &Map<String, Value>) -> Option<String> {
    fields
        .get("amministratori")?
        .as_array()?
        .iter()
        .filter_map(|admin| admin.get("nome").and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
