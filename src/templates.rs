//! Verbale templates.
//!
//! Each template is a fixed sequence of blocks built from the merged data:
//! company header, meeting opening, agenda, the template's own discussion and
//! resolution text, then closing and signatures. The blocks are written to
//! `.docx` by [`write_docx`].
mod blocks;
mod docx;
mod variants;

pub use blocks::Block;
pub use docx::write_docx;

use crate::fieldpath::{is_blank, lookup};
use anyhow::{anyhow, Result};
use blocks::FieldReader;
use serde::Serialize;
use serde_json::{Map, Value};

/// Body that holds the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    Ordinaria,
    Straordinaria,
    /// Board of directors.
    Consiglio,
}

impl MeetingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordinaria => "ordinaria",
            Self::Straordinaria => "straordinaria",
            Self::Consiglio => "consiglio",
        }
    }

    /// Who meets, as named in running text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ordinaria => "assemblea ordinaria",
            Self::Straordinaria => "assemblea straordinaria",
            Self::Consiglio => "consiglio di amministrazione",
        }
    }

    pub fn is_board(self) -> bool {
        self == Self::Consiglio
    }
}

/// Closed set of verbale templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    ApprovazioneBilancio,
    NominaAmministratore,
    DimissioniAmministratore,
    RevocaAmministratore,
    NominaSindaci,
    NominaRevisore,
    TrasferimentoSede,
    DistribuzioneUtili,
    CompensoAmministratori,
    AumentoCapitale,
    RiduzioneCapitale,
    ModificaOggettoSociale,
    Trasformazione,
    ScioglimentoLiquidazione,
    ConsiglioAmministrazione,
}

/// Fields every template needs.
const COMMON_REQUIRED: [&str; 6] = [
    "denominazione",
    "sede_legale",
    "assemblea.data",
    "assemblea.luogo",
    "assemblea.presidente",
    "assemblea.segretario",
];

impl TemplateId {
    pub const ALL: [TemplateId; 15] = [
        TemplateId::ApprovazioneBilancio,
        TemplateId::NominaAmministratore,
        TemplateId::DimissioniAmministratore,
        TemplateId::RevocaAmministratore,
        TemplateId::NominaSindaci,
        TemplateId::NominaRevisore,
        TemplateId::TrasferimentoSede,
        TemplateId::DistribuzioneUtili,
        TemplateId::CompensoAmministratori,
        TemplateId::AumentoCapitale,
        TemplateId::RiduzioneCapitale,
        TemplateId::ModificaOggettoSociale,
        TemplateId::Trasformazione,
        TemplateId::ScioglimentoLiquidazione,
        TemplateId::ConsiglioAmministrazione,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApprovazioneBilancio => "approvazione-bilancio",
            Self::NominaAmministratore => "nomina-amministratore",
            Self::DimissioniAmministratore => "dimissioni-amministratore",
            Self::RevocaAmministratore => "revoca-amministratore",
            Self::NominaSindaci => "nomina-sindaci",
            Self::NominaRevisore => "nomina-revisore",
            Self::TrasferimentoSede => "trasferimento-sede",
            Self::DistribuzioneUtili => "distribuzione-utili",
            Self::CompensoAmministratori => "compenso-amministratori",
            Self::AumentoCapitale => "aumento-capitale",
            Self::RiduzioneCapitale => "riduzione-capitale",
            Self::ModificaOggettoSociale => "modifica-oggetto-sociale",
            Self::Trasformazione => "trasformazione",
            Self::ScioglimentoLiquidazione => "scioglimento-liquidazione",
            Self::ConsiglioAmministrazione => "consiglio-amministrazione",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ApprovazioneBilancio => "Approvazione del bilancio di esercizio",
            Self::NominaAmministratore => "Nomina dell'organo amministrativo",
            Self::DimissioniAmministratore => "Dimissioni dell'amministratore e sostituzione",
            Self::RevocaAmministratore => "Revoca dell'amministratore",
            Self::NominaSindaci => "Nomina del collegio sindacale",
            Self::NominaRevisore => "Conferimento dell'incarico di revisione legale dei conti",
            Self::TrasferimentoSede => "Trasferimento della sede legale",
            Self::DistribuzioneUtili => "Distribuzione di utili ai soci",
            Self::CompensoAmministratori => "Determinazione del compenso degli amministratori",
            Self::AumentoCapitale => "Aumento del capitale sociale",
            Self::RiduzioneCapitale => "Riduzione del capitale sociale per perdite",
            Self::ModificaOggettoSociale => "Modifica dell'oggetto sociale",
            Self::Trasformazione => "Trasformazione della società",
            Self::ScioglimentoLiquidazione => {
                "Scioglimento anticipato e nomina del liquidatore"
            }
            Self::ConsiglioAmministrazione => {
                "Progetto di bilancio e convocazione dell'assemblea"
            }
        }
    }

    pub fn meeting_type(self) -> MeetingType {
        match self {
            Self::TrasferimentoSede
            | Self::AumentoCapitale
            | Self::RiduzioneCapitale
            | Self::ModificaOggettoSociale
            | Self::Trasformazione
            | Self::ScioglimentoLiquidazione => MeetingType::Straordinaria,
            Self::ConsiglioAmministrazione => MeetingType::Consiglio,
            _ => MeetingType::Ordinaria,
        }
    }

    /// Field paths checked before rendering, common fields first.
    pub fn required_fields(self) -> Vec<&'static str> {
        let specific: &[&str] = match self {
            Self::ApprovazioneBilancio => &["bilancio.esercizio"],
            Self::NominaAmministratore => &["delibera.nominativo", "delibera.durata"],
            Self::DimissioniAmministratore => &[
                "delibera.dimissionario",
                "delibera.data_dimissioni",
                "delibera.nominativo",
            ],
            Self::RevocaAmministratore => &["delibera.revocato", "delibera.motivazione"],
            Self::NominaSindaci => &["delibera.sindaci", "delibera.durata"],
            Self::NominaRevisore => &["delibera.revisore", "delibera.durata"],
            Self::TrasferimentoSede => &["delibera.nuova_sede"],
            Self::DistribuzioneUtili => &["bilancio.esercizio", "delibera.importo_dividendi"],
            Self::CompensoAmministratori => &["delibera.compenso"],
            Self::AumentoCapitale => &[
                "capitale_sociale",
                "delibera.importo_aumento",
                "delibera.nuovo_capitale",
            ],
            Self::RiduzioneCapitale => &[
                "capitale_sociale",
                "delibera.perdite",
                "delibera.nuovo_capitale",
            ],
            Self::ModificaOggettoSociale => &["delibera.nuovo_oggetto"],
            Self::Trasformazione => &["delibera.nuova_forma"],
            Self::ScioglimentoLiquidazione => {
                &["delibera.causa_scioglimento", "delibera.liquidatore"]
            }
            Self::ConsiglioAmministrazione => &["bilancio.esercizio", "delibera.data_assemblea"],
        };
        COMMON_REQUIRED
            .iter()
            .chain(specific.iter())
            .copied()
            .collect()
    }

    /// Agenda items used when `assemblea.ordine_del_giorno` is empty.
    pub fn default_agenda(self) -> Vec<String> {
        variants::default_agenda(self)
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required field paths that are missing or blank in `fields`.
pub fn missing_fields(template: TemplateId, fields: &Map<String, Value>) -> Vec<&'static str> {
    template
        .required_fields()
        .into_iter()
        .filter(|path| lookup(fields, path).map(is_blank).unwrap_or(true))
        .collect()
}

/// Build the block sequence for a template.
///
/// Fails with the complete list of missing required fields unless
/// `allow_missing` is set, in which case blanks render as a placeholder.
pub fn render_blocks(
    template: TemplateId,
    fields: &Map<String, Value>,
    allow_missing: bool,
) -> Result<Vec<Block>> {
    let missing = missing_fields(template, fields);
    if !missing.is_empty() && !allow_missing {
        return Err(anyhow!(
            "template {} is missing required fields: {} (set them with `verbale edit --set PATH=VALUE` or pass --allow-missing)",
            template,
            missing.join(", ")
        ));
    }
    if !missing.is_empty() {
        tracing::warn!(template = %template, missing = ?missing, "rendering with placeholders");
    }
    let reader = FieldReader::new(fields);
    let meeting_type = reader.meeting_type(template.meeting_type());

    let mut out = Vec::new();
    blocks::company_header(&reader, meeting_type, template, &mut out);
    blocks::opening(&reader, meeting_type, &mut out);
    blocks::agenda(&reader, template, &mut out);
    variants::body(template, &reader, &mut out);
    blocks::closing(&reader, meeting_type, &mut out);
    Ok(out)
}

/// Default output file name: `<template>_<company-slug>_<date>.docx`.
pub fn default_output_name(template: TemplateId, fields: &Map<String, Value>) -> String {
    let reader = FieldReader::new(fields);
    let company = crate::util::slugify(&reader.text("denominazione"));
    let date = crate::util::slugify(&reader.text("assemblea.data"));
    let company = if company.is_empty() {
        "societa".to_string()
    } else {
        company
    };
    let date = if date.is_empty() {
        "senza-data".to_string()
    } else {
        date
    };
    format!("{template}_{company}_{date}.docx")
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
