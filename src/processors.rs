//! Per-document-type extraction processors.
//!
//! Each source document type carries a fixed prompt and a default field
//! dictionary. The defaults double as the JSON template shown to the model and
//! as the fallback stored when extraction fails.
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const EXTRACTION_BASE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/extraction_base.md"
));
const KIND_VISURA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/visura.md"
));
const KIND_BILANCIO: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/bilancio.md"
));
const KIND_DOCUMENTO_IDENTITA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/documento_identita.md"
));
const KIND_FATTURA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/fattura.md"
));
const KIND_CONTRATTO: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/contratto.md"
));
const KIND_GENERICO: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/kinds/generico.md"
));

/// Source document types understood by the extractor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// Visura camerale (chamber-of-commerce registry extract).
    Visura,
    /// Bilancio d'esercizio (annual financial statements).
    Bilancio,
    /// Identity document of a natural person.
    DocumentoIdentita,
    /// Invoice.
    Fattura,
    /// Contract.
    Contratto,
    /// Anything else.
    Generico,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        Self::Visura,
        Self::Bilancio,
        Self::DocumentoIdentita,
        Self::Fattura,
        Self::Contratto,
        Self::Generico,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visura => "visura",
            Self::Bilancio => "bilancio",
            Self::DocumentoIdentita => "documento-identita",
            Self::Fattura => "fattura",
            Self::Contratto => "contratto",
            Self::Generico => "generico",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt and defaults for one document kind.
#[derive(Debug, Clone, Copy)]
pub struct DocumentProcessor {
    pub kind: DocumentKind,
    pub label: &'static str,
    instructions: &'static str,
}

/// Select the processor for a document kind.
pub fn processor_for(kind: DocumentKind) -> DocumentProcessor {
    let (label, instructions) = match kind {
        DocumentKind::Visura => ("Visura camerale", KIND_VISURA),
        DocumentKind::Bilancio => ("Bilancio d'esercizio", KIND_BILANCIO),
        DocumentKind::DocumentoIdentita => ("Documento d'identità", KIND_DOCUMENTO_IDENTITA),
        DocumentKind::Fattura => ("Fattura", KIND_FATTURA),
        DocumentKind::Contratto => ("Contratto", KIND_CONTRATTO),
        DocumentKind::Generico => ("Documento generico", KIND_GENERICO),
    };
    DocumentProcessor {
        kind,
        label,
        instructions,
    }
}

impl DocumentProcessor {
    /// Default field dictionary for this kind.
    pub fn default_fields(&self) -> Map<String, Value> {
        let value = match self.kind {
            DocumentKind::Visura => json!({
                "denominazione": "",
                "forma_giuridica": "",
                "codice_fiscale": "",
                "partita_iva": "",
                "numero_rea": "",
                "sede_legale": "",
                "pec": "",
                "capitale_sociale": "",
                "capitale_versato": "",
                "data_costituzione": "",
                "oggetto_sociale": "",
                "sistema_amministrazione": "",
                "soci": [],
                "amministratori": [],
                "sindaci": []
            }),
            DocumentKind::Bilancio => json!({
                "denominazione": "",
                "codice_fiscale": "",
                "esercizio": "",
                "data_chiusura": "",
                "totale_attivo": "",
                "patrimonio_netto": "",
                "ricavi": "",
                "utile_perdita": "",
                "risultato": ""
            }),
            DocumentKind::DocumentoIdentita => json!({
                "nome": "",
                "cognome": "",
                "codice_fiscale": "",
                "data_nascita": "",
                "luogo_nascita": "",
                "residenza": "",
                "cittadinanza": "",
                "tipo_documento": "",
                "numero_documento": "",
                "rilasciato_da": "",
                "data_scadenza": ""
            }),
            DocumentKind::Fattura => json!({
                "numero": "",
                "data": "",
                "fornitore": "",
                "partita_iva_fornitore": "",
                "cliente": "",
                "partita_iva_cliente": "",
                "descrizione": "",
                "imponibile": "",
                "iva": "",
                "totale": ""
            }),
            DocumentKind::Contratto => json!({
                "tipo_contratto": "",
                "data": "",
                "parti": [],
                "oggetto": "",
                "corrispettivo": "",
                "durata": "",
                "decorrenza": ""
            }),
            DocumentKind::Generico => json!({
                "denominazione": "",
                "codice_fiscale": "",
                "partita_iva": "",
                "sede_legale": "",
                "note": ""
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// JSON template shown to the model: defaults with list items expanded.
    fn fields_template(&self) -> Value {
        let mut template = self.default_fields();
        for (key, value) in template.iter_mut() {
            if let (Value::Array(items), Some(item)) = (&mut *value, list_item_defaults(key)) {
                items.push(Value::Object(item));
            }
        }
        Value::Object(template)
    }

    /// Assemble the extraction prompt for a document text.
    pub fn build_prompt(&self, document_text: &str) -> String {
        let fields_json = serde_json::to_string_pretty(&self.fields_template())
            .unwrap_or_else(|_| "{}".to_string());
        EXTRACTION_BASE
            .replace("{kind_label}", self.label)
            .replace("{kind_instructions}", self.instructions.trim())
            .replace("{fields_json}", &fields_json)
            .replace("{document_text}", document_text)
    }

    /// Complete model output with defaults and coerce values to the expected shapes.
    pub fn normalize(&self, raw: Map<String, Value>) -> Map<String, Value> {
        normalize_fields(&self.default_fields(), raw)
    }
}

/// Item defaults for list-valued fields.
pub fn list_item_defaults(list_key: &str) -> Option<Map<String, Value>> {
    let value = match list_key {
        "soci" => json!({
            "nome": "",
            "codice_fiscale": "",
            "quota_percentuale": "",
            "quota_valore": "",
            "diritto": ""
        }),
        "amministratori" => json!({
            "nome": "",
            "carica": "",
            "codice_fiscale": "",
            "data_nomina": "",
            "durata": ""
        }),
        "sindaci" => json!({
            "nome": "",
            "carica": "",
            "codice_fiscale": "",
            "data_nomina": ""
        }),
        "parti" => json!({
            "nome": "",
            "ruolo": "",
            "codice_fiscale": ""
        }),
        _ => return None,
    };
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Overlay `raw` on `defaults`, coercing each value to the default's shape.
///
/// Keys absent from the defaults are kept (with `null` mapped to `""`).
pub fn normalize_fields(defaults: &Map<String, Value>, raw: Map<String, Value>) -> Map<String, Value> {
    let mut out = defaults.clone();
    for (key, value) in raw {
        let normalized = match defaults.get(&key) {
            Some(default) => normalize_value(&key, default, value),
            None => match value {
                Value::Null => Value::String(String::new()),
                Value::String(text) => Value::String(text.trim().to_string()),
                other => other,
            },
        };
        out.insert(key, normalized);
    }
    out
}

fn normalize_value(key: &str, default: &Value, value: Value) -> Value {
    match (default, value) {
        (_, Value::Null) => default.clone(),
        (Value::String(_), Value::String(text)) => Value::String(text.trim().to_string()),
        (Value::String(_), Value::Number(number)) => Value::String(number.to_string()),
        (Value::String(_), Value::Bool(flag)) => {
            Value::String(if flag { "sì" } else { "no" }.to_string())
        }
        (Value::String(_), Value::Array(items)) => Value::String(
            items
                .iter()
                .filter_map(scalar_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (Value::String(_), Value::Object(_)) => default.clone(),
        (Value::Array(_), Value::Array(items)) => Value::Array(normalize_list(key, items)),
        (Value::Array(_), _) => default.clone(),
        (Value::Object(defaults), Value::Object(map)) => {
            Value::Object(normalize_fields(defaults, map))
        }
        (Value::Object(_), _) => default.clone(),
        (Value::Bool(_), Value::String(text)) => Value::Bool(matches!(
            text.trim().to_lowercase().as_str(),
            "true" | "sì" | "si" | "yes" | "1"
        )),
        (_, other) => other,
    }
}

fn normalize_list(key: &str, items: Vec<Value>) -> Vec<Value> {
    let Some(item_defaults) = list_item_defaults(key) else {
        return items
            .into_iter()
            .filter(|item| !item.is_null())
            .collect();
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            Value::String(name) if !name.trim().is_empty() => {
                let mut map = Map::new();
                map.insert("nome".to_string(), Value::String(name.trim().to_string()));
                Some(map)
            }
            _ => None,
        })
        .map(|map| Value::Object(normalize_fields(&item_defaults, map)))
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn every_kind_has_defaults_and_a_prompt() {
        for kind in DocumentKind::ALL {
            let processor = processor_for(kind);
            assert!(!processor.default_fields().is_empty(), "{kind} defaults");
            let prompt = processor.build_prompt("TESTO DEL DOCUMENTO");
            assert!(prompt.contains("TESTO DEL DOCUMENTO"));
            assert!(prompt.contains(processor.label));
            assert!(!prompt.contains("{fields_json}"));
        }
    }

    #[test]
    fn visura_prompt_template_shows_list_item_shape() {
        let prompt = processor_for(DocumentKind::Visura).build_prompt("x");
        assert!(prompt.contains("\"quota_percentuale\""));
        assert!(prompt.contains("\"carica\""));
    }

    #[test]
    fn normalize_fills_missing_keys_and_maps_null_to_empty() {
        let processor = processor_for(DocumentKind::Visura);
        let fields = processor.normalize(object(json!({
            "denominazione": "  Alfa S.r.l. ",
            "pec": null,
            "capitale_sociale": 10000
        })));
        assert_eq!(fields["denominazione"], "Alfa S.r.l.");
        assert_eq!(fields["pec"], "");
        assert_eq!(fields["capitale_sociale"], "10000");
        assert_eq!(fields["partita_iva"], "");
        assert_eq!(fields["soci"], json!([]));
    }

    #[test]
    fn normalize_completes_list_items_and_drops_garbage() {
        let processor = processor_for(DocumentKind::Visura);
        let fields = processor.normalize(object(json!({
            "soci": [
                {"nome": "Mario Rossi", "quota_percentuale": 60},
                "Anna Bianchi",
                42,
                null
            ],
            "amministratori": "Mario Rossi"
        })));
        let soci = fields["soci"].as_array().expect("soci list");
        assert_eq!(soci.len(), 2);
        assert_eq!(soci[0]["quota_percentuale"], "60");
        assert_eq!(soci[0]["codice_fiscale"], "");
        assert_eq!(soci[1]["nome"], "Anna Bianchi");
        assert_eq!(fields["amministratori"], json!([]));
    }

    #[test]
    fn normalize_keeps_unknown_keys_from_the_model() {
        let processor = processor_for(DocumentKind::Fattura);
        let fields = processor.normalize(object(json!({
            "numero": "12/A",
            "valuta": null,
            "righe": [1, 2]
        })));
        assert_eq!(fields["numero"], "12/A");
        assert_eq!(fields["valuta"], "");
        assert_eq!(fields["righe"], json!([1, 2]));
    }

    #[test]
    fn normalize_joins_scalar_lists_into_string_fields() {
        let processor = processor_for(DocumentKind::Generico);
        let fields = processor.normalize(object(json!({
            "note": ["prima nota", "", 3]
        })));
        assert_eq!(fields["note"], "prima nota, 3");
    }

    #[test]
    fn kind_names_match_serde_and_display() {
        for kind in DocumentKind::ALL {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, Value::String(kind.to_string()));
        }
    }
}
