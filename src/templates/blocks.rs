//! Document blocks and the sections every verbale shares.
use super::{MeetingType, TemplateId};
use crate::fieldpath::{lookup, value_text};
use crate::util::normalize_for_compare;
use serde::Serialize;
use serde_json::{Map, Value};

/// Rendered in place of a blank field when `--allow-missing` is set.
pub const MISSING_PLACEHOLDER: &str = "______________";

/// One unit of document layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Title { text: String },
    Heading { text: String },
    Paragraph { text: String },
    ListItem { text: String },
    Signature { role: String, name: String },
}

impl Block {
    pub fn title(text: impl Into<String>) -> Self {
        Self::Title { text: text.into() }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self::Heading { text: text.into() }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph { text: text.into() }
    }

    pub fn item(text: impl Into<String>) -> Self {
        Self::ListItem { text: text.into() }
    }

    /// Plain text of the block, as it reads in the document.
    pub fn text(&self) -> String {
        match self {
            Self::Title { text }
            | Self::Heading { text }
            | Self::Paragraph { text }
            | Self::ListItem { text } => text.clone(),
            Self::Signature { role, name } => format!("{role}: {name}"),
        }
    }
}

/// Read-only view of merged fields for template text.
pub(super) struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> FieldReader<'a> {
    pub(super) fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Trimmed text at `path`, empty when missing.
    pub(super) fn text(&self, path: &str) -> String {
        lookup(self.fields, path).map(value_text).unwrap_or_default()
    }

    /// Text at `path`, or `None` when blank.
    pub(super) fn optional(&self, path: &str) -> Option<String> {
        Some(self.text(path)).filter(|text| !text.is_empty())
    }

    /// Text at `path`, or the placeholder when blank.
    pub(super) fn fill(&self, path: &str) -> String {
        self.optional(path)
            .unwrap_or_else(|| MISSING_PLACEHOLDER.to_string())
    }

    pub(super) fn flag(&self, path: &str, default: bool) -> bool {
        match lookup(self.fields, path) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => match text.trim().to_lowercase().as_str() {
                "sì" | "si" | "true" | "yes" => true,
                "no" | "false" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub(super) fn list(&self, path: &str) -> &'a [Value] {
        match lookup(self.fields, path) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    /// `assemblea.tipo` when it names a meeting type, else the template's.
    ///
    /// Board templates stay board meetings.
    pub(super) fn meeting_type(&self, default: MeetingType) -> MeetingType {
        if default.is_board() {
            return default;
        }
        match self.text("assemblea.tipo").to_lowercase().as_str() {
            "ordinaria" => MeetingType::Ordinaria,
            "straordinaria" => MeetingType::Straordinaria,
            _ => default,
        }
    }

    /// Identity document in `persone` for a person, matched on codice
    /// fiscale or on the full name in either order.
    pub(super) fn identity(
        &self,
        name: &str,
        codice_fiscale: Option<&str>,
    ) -> Option<&'a Map<String, Value>> {
        let wanted_cf = codice_fiscale
            .map(normalize_for_compare)
            .filter(|cf| !cf.is_empty());
        let wanted_name = name_key(name);
        self.list("persone")
            .iter()
            .filter_map(Value::as_object)
            .find(|persona| {
                let text = |key: &str| persona.get(key).map(value_text).unwrap_or_default();
                let cf = normalize_for_compare(&text("codice_fiscale"));
                let cf_matches = wanted_cf.as_deref().is_some_and(|wanted| wanted == cf);
                let name_matches =
                    !wanted_name.is_empty() && name_key(&text("nome_completo")) == wanted_name;
                cf_matches || name_matches
            })
    }

    /// A person's name followed by birth, residence and codice fiscale
    /// (`Luca Neri, nato/a a Roma il 01/01/1970, residente in ..., codice fiscale ...`).
    ///
    /// Details come from the person's identity document; `codice_fiscale`
    /// fills in when no document matches. Just the name when nothing is known.
    pub(super) fn described(&self, name: &str, codice_fiscale: Option<&str>) -> String {
        let persona = self.identity(name, codice_fiscale);
        let field = |key: &str| {
            persona
                .and_then(|persona| persona.get(key))
                .map(value_text)
                .filter(|text| !text.is_empty())
        };
        let mut parts = vec![name.to_string()];
        match (field("luogo_nascita"), field("data_nascita")) {
            (Some(place), Some(date)) => parts.push(format!("nato/a a {place} il {date}")),
            (Some(place), None) => parts.push(format!("nato/a a {place}")),
            (None, Some(date)) => parts.push(format!("nato/a il {date}")),
            (None, None) => {}
        }
        if let Some(residenza) = field("residenza") {
            parts.push(format!("residente in {residenza}"));
        }
        let cf = field("codice_fiscale").or_else(|| {
            codice_fiscale
                .map(str::trim)
                .filter(|cf| !cf.is_empty())
                .map(str::to_string)
        });
        if let Some(cf) = cf {
            parts.push(format!("codice fiscale {cf}"));
        }
        parts.join(", ")
    }

    /// [`Self::described`] for the person named at `name_path`.
    pub(super) fn described_at(&self, name_path: &str, cf_path: &str) -> String {
        self.described(&self.fill(name_path), self.optional(cf_path).as_deref())
    }
}

/// Lowercased name words in sorted order, so "Rossi Mario" matches "Mario Rossi".
fn name_key(name: &str) -> String {
    let normalized = normalize_for_compare(name);
    let mut words: Vec<&str> = normalized.split(' ').filter(|word| !word.is_empty()).collect();
    words.sort_unstable();
    words.join(" ")
}

/// Name of a person entry that is either a string or an object with `nome`.
pub(super) fn person_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::Object(map) => map.get("nome").map(value_text).unwrap_or_default(),
        other => value_text(other),
    };
    Some(name).filter(|name| !name.is_empty())
}

pub(super) fn company_header(
    reader: &FieldReader<'_>,
    meeting_type: MeetingType,
    template: TemplateId,
    out: &mut Vec<Block>,
) {
    let title = if meeting_type.is_board() {
        "VERBALE DEL CONSIGLIO DI AMMINISTRAZIONE".to_string()
    } else {
        format!("VERBALE DI ASSEMBLEA {}", meeting_type.as_str().to_uppercase())
    };
    out.push(Block::title(title));
    out.push(Block::heading(reader.fill("denominazione")));

    let mut details = vec![format!("Sede legale in {}", reader.fill("sede_legale"))];
    if let Some(capitale) = reader.optional("capitale_sociale") {
        details.push(format!("capitale sociale euro {capitale}"));
    }
    if let Some(cf) = reader.optional("codice_fiscale") {
        details.push(format!("codice fiscale {cf}"));
    }
    if let Some(piva) = reader.optional("partita_iva") {
        details.push(format!("partita IVA {piva}"));
    }
    if let Some(rea) = reader.optional("numero_rea") {
        details.push(format!("REA {rea}"));
    }
    out.push(Block::paragraph(details.join(", ")));
    out.push(Block::heading(template.title()));
}

pub(super) fn opening(reader: &FieldReader<'_>, meeting_type: MeetingType, out: &mut Vec<Block>) {
    if meeting_type.is_board() {
        board_opening(reader, out);
        return;
    }
    let time = reader
        .optional("assemblea.ora")
        .map(|ora| format!(", alle ore {ora}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il giorno {}{}, in {}, si è riunita l'assemblea {} dei soci della società {}.",
        reader.fill("assemblea.data"),
        time,
        reader.fill("assemblea.luogo"),
        meeting_type.as_str(),
        reader.fill("denominazione"),
    )));
    out.push(Block::paragraph(format!(
        "Assume la presidenza, ai sensi dello statuto sociale, {}, il quale chiama a fungere da segretario {}, che accetta.",
        reader.fill("assemblea.presidente"),
        reader.fill("assemblea.segretario"),
    )));

    let totalitaria = reader.flag("assemblea.totalitaria", true);
    if totalitaria {
        out.push(Block::paragraph(
            "Il Presidente constata e fa constatare che è presente, in proprio o per delega, l'intero capitale sociale nelle persone dei soci:",
        ));
    } else {
        let convocazione = reader
            .optional("assemblea.convocazione")
            .map(|how| format!(" {how}"))
            .unwrap_or_default();
        out.push(Block::paragraph(format!(
            "Il Presidente constata che l'assemblea è stata regolarmente convocata{convocazione} e che sono presenti i soci:"
        )));
    }
    let attendees = attendees(reader);
    if attendees.is_empty() {
        out.push(Block::item(MISSING_PLACEHOLDER));
    }
    out.extend(attendees.into_iter().map(Block::item));

    let admins = with_roles(reader.list("amministratori"));
    if !admins.is_empty() {
        out.push(Block::paragraph(format!(
            "È altresì presente l'organo amministrativo nella persona di {}.",
            admins.join(", ")
        )));
    }

    let validity = if totalitaria {
        "Il Presidente dichiara pertanto l'assemblea validamente costituita in forma totalitaria e idonea a deliberare sul seguente"
    } else {
        "Il Presidente dichiara pertanto l'assemblea validamente costituita e idonea a deliberare sul seguente"
    };
    out.push(Block::paragraph(validity));
}

fn board_opening(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let time = reader
        .optional("assemblea.ora")
        .map(|ora| format!(", alle ore {ora}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il giorno {}{}, in {}, si è riunito il consiglio di amministrazione della società {}.",
        reader.fill("assemblea.data"),
        time,
        reader.fill("assemblea.luogo"),
        reader.fill("denominazione"),
    )));
    out.push(Block::paragraph(format!(
        "Assume la presidenza {}, il quale chiama a fungere da segretario {}, che accetta.",
        reader.fill("assemblea.presidente"),
        reader.fill("assemblea.segretario"),
    )));

    out.push(Block::paragraph(
        "Il Presidente constata che sono presenti i consiglieri:",
    ));
    let explicit: Vec<String> = reader
        .list("assemblea.presenti")
        .iter()
        .filter_map(person_name)
        .collect();
    let directors = if explicit.is_empty() {
        with_roles(reader.list("amministratori"))
    } else {
        explicit
    };
    if directors.is_empty() {
        out.push(Block::item(MISSING_PLACEHOLDER));
    }
    out.extend(directors.into_iter().map(Block::item));

    let auditors = with_roles(reader.list("sindaci"));
    if !auditors.is_empty() {
        out.push(Block::paragraph("Per il collegio sindacale sono presenti:"));
        out.extend(auditors.into_iter().map(Block::item));
    }
    out.push(Block::paragraph(
        "Il Presidente dichiara pertanto il consiglio validamente costituito e idoneo a deliberare sul seguente",
    ));
}

/// `Name (carica)` for each named person in a list.
fn with_roles(people: &[Value]) -> Vec<String> {
    people
        .iter()
        .filter_map(|person| {
            let name = person_name(person)?;
            let role = person.get("carica").map(value_text).unwrap_or_default();
            Some(if role.is_empty() {
                name
            } else {
                format!("{name} ({role})")
            })
        })
        .collect()
}

/// Attendees from `assemblea.presenti`, else the shareholders with their quotas.
fn attendees(reader: &FieldReader<'_>) -> Vec<String> {
    let explicit: Vec<String> = reader
        .list("assemblea.presenti")
        .iter()
        .filter_map(person_name)
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }
    reader
        .list("soci")
        .iter()
        .filter_map(|socio| {
            let name = person_name(socio)?;
            let quota = socio
                .get("quota_percentuale")
                .map(value_text)
                .unwrap_or_default();
            Some(if quota.is_empty() {
                name
            } else {
                format!("{name}, titolare di una quota pari al {quota} del capitale sociale")
            })
        })
        .collect()
}

pub(super) fn agenda(reader: &FieldReader<'_>, template: TemplateId, out: &mut Vec<Block>) {
    out.push(Block::heading("Ordine del giorno"));
    let custom: Vec<String> = reader
        .list("assemblea.ordine_del_giorno")
        .iter()
        .map(value_text)
        .filter(|item| !item.is_empty())
        .collect();
    let items = if custom.is_empty() {
        template.default_agenda()
    } else {
        custom
    };
    for (index, item) in items.iter().enumerate() {
        out.push(Block::item(format!("{}. {}", index + 1, item)));
    }
}

pub(super) fn closing(reader: &FieldReader<'_>, meeting_type: MeetingType, out: &mut Vec<Block>) {
    let body = if meeting_type.is_board() {
        "la riunione"
    } else {
        "l'assemblea"
    };
    let time = reader
        .optional("assemblea.ora_chiusura")
        .map(|ora| format!(" alle ore {ora}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Null'altro essendovi da deliberare e nessuno avendo chiesto la parola, il Presidente dichiara sciolta {body}{time}, previa redazione, lettura e approvazione del presente verbale."
    )));
    out.push(Block::Signature {
        role: "Il Presidente".to_string(),
        name: reader.fill("assemblea.presidente"),
    });
    out.push(Block::Signature {
        role: "Il Segretario".to_string(),
        name: reader.fill("assemblea.segretario"),
    });
}
