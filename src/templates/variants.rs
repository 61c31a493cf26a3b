//! Discussion and resolution text for each template.
use super::blocks::{person_name, Block, FieldReader};
use super::TemplateId;
use crate::fieldpath::value_text;

pub(super) fn default_agenda(template: TemplateId) -> Vec<String> {
    let items: &[&str] = match template {
        TemplateId::ApprovazioneBilancio => &[
            "Approvazione del bilancio di esercizio e delle relative relazioni; deliberazioni inerenti e conseguenti.",
        ],
        TemplateId::NominaAmministratore => &[
            "Nomina dell'organo amministrativo e determinazione della durata della carica.",
        ],
        TemplateId::DimissioniAmministratore => &[
            "Presa d'atto delle dimissioni dell'amministratore.",
            "Nomina del nuovo amministratore.",
        ],
        TemplateId::NominaSindaci => &[
            "Nomina del collegio sindacale e determinazione del relativo compenso.",
        ],
        TemplateId::TrasferimentoSede => &[
            "Trasferimento della sede legale e conseguente modifica dello statuto sociale.",
        ],
        TemplateId::DistribuzioneUtili => &["Distribuzione di utili ai soci."],
        TemplateId::CompensoAmministratori => &[
            "Determinazione del compenso spettante all'organo amministrativo.",
        ],
        TemplateId::AumentoCapitale => &[
            "Aumento del capitale sociale e conseguente modifica dello statuto sociale.",
        ],
        TemplateId::RevocaAmministratore => &[
            "Revoca dell'amministratore; deliberazioni inerenti e conseguenti.",
        ],
        TemplateId::NominaRevisore => &[
            "Conferimento dell'incarico di revisione legale dei conti e determinazione del corrispettivo.",
        ],
        TemplateId::RiduzioneCapitale => &[
            "Provvedimenti ai sensi degli articoli 2482-bis e 2482-ter del codice civile: copertura delle perdite e riduzione del capitale sociale.",
        ],
        TemplateId::ModificaOggettoSociale => &[
            "Modifica dell'oggetto sociale e conseguente modifica dello statuto sociale.",
        ],
        TemplateId::Trasformazione => &[
            "Trasformazione della società e adozione del nuovo statuto.",
        ],
        TemplateId::ScioglimentoLiquidazione => &[
            "Scioglimento anticipato della società e messa in liquidazione.",
            "Nomina del liquidatore e determinazione dei relativi poteri.",
        ],
        TemplateId::ConsiglioAmministrazione => &[
            "Approvazione del progetto di bilancio di esercizio.",
            "Convocazione dell'assemblea dei soci.",
        ],
    };
    items.iter().map(|item| item.to_string()).collect()
}

pub(super) fn body(template: TemplateId, reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    out.push(Block::heading("Svolgimento"));
    match template {
        TemplateId::ApprovazioneBilancio => approvazione_bilancio(reader, out),
        TemplateId::NominaAmministratore => nomina_amministratore(reader, out),
        TemplateId::DimissioniAmministratore => dimissioni_amministratore(reader, out),
        TemplateId::NominaSindaci => nomina_sindaci(reader, out),
        TemplateId::TrasferimentoSede => trasferimento_sede(reader, out),
        TemplateId::DistribuzioneUtili => distribuzione_utili(reader, out),
        TemplateId::CompensoAmministratori => compenso_amministratori(reader, out),
        TemplateId::AumentoCapitale => aumento_capitale(reader, out),
        TemplateId::RevocaAmministratore => revoca_amministratore(reader, out),
        TemplateId::NominaRevisore => nomina_revisore(reader, out),
        TemplateId::RiduzioneCapitale => riduzione_capitale(reader, out),
        TemplateId::ModificaOggettoSociale => modifica_oggetto_sociale(reader, out),
        TemplateId::Trasformazione => trasformazione(reader, out),
        TemplateId::ScioglimentoLiquidazione => scioglimento_liquidazione(reader, out),
        TemplateId::ConsiglioAmministrazione => consiglio_progetto_bilancio(reader, out),
    }
}

/// Opening line of the resolution, followed by its points as list items.
fn resolution(out: &mut Vec<Block>, points: Vec<String>) {
    resolution_by("L'assemblea", out, points);
}

fn resolution_by(body: &str, out: &mut Vec<Block>, points: Vec<String>) {
    out.push(Block::heading("Deliberazione"));
    out.push(Block::paragraph(format!(
        "{body}, udita l'esposizione del Presidente e dopo esauriente discussione, all'unanimità dei presenti"
    )));
    out.push(Block::paragraph("delibera"));
    out.extend(points.into_iter().map(Block::item));
}

fn approvazione_bilancio(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let esercizio = reader.fill("bilancio.esercizio");
    let chiusura = reader
        .optional("bilancio.data_chiusura")
        .map(|date| format!(" chiuso al {date}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il Presidente illustra all'assemblea il bilancio dell'esercizio {esercizio}{chiusura}, composto da stato patrimoniale, conto economico e nota integrativa, che viene messo a disposizione dei presenti."
    )));

    let figures = [
        ("bilancio.totale_attivo", "Totale attivo"),
        ("bilancio.patrimonio_netto", "Patrimonio netto"),
        ("bilancio.ricavi", "Ricavi delle vendite e delle prestazioni"),
        ("bilancio.utile_perdita", "Risultato d'esercizio"),
    ];
    let present: Vec<String> = figures
        .iter()
        .filter_map(|(path, label)| reader.optional(path).map(|value| format!("{label}: euro {value}")))
        .collect();
    if !present.is_empty() {
        out.push(Block::paragraph("Il bilancio presenta le seguenti risultanze:"));
        out.extend(present.into_iter().map(Block::item));
    }

    let destinazione = reader
        .optional("delibera.destinazione_risultato")
        .unwrap_or_else(|| "secondo la proposta dell'organo amministrativo".to_string());
    resolution(
        out,
        vec![
            format!("di approvare il bilancio dell'esercizio {esercizio}{chiusura} così come predisposto dall'organo amministrativo;"),
            format!("di destinare il risultato d'esercizio {destinazione}."),
        ],
    );
}

fn nomina_amministratore(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let carica = reader
        .optional("delibera.carica")
        .unwrap_or_else(|| "Amministratore Unico".to_string());
    let nominativo = reader.fill("delibera.nominativo");
    out.push(Block::paragraph(format!(
        "Il Presidente ricorda ai presenti che occorre provvedere alla nomina dell'organo amministrativo e propone di nominare {nominativo} quale {carica} della società."
    )));

    let appointee = reader.described_at("delibera.nominativo", "delibera.codice_fiscale");
    let mut points = vec![
        format!("di nominare {appointee}, quale {carica} della società;"),
        format!("di stabilire che la carica avrà durata {};", reader.fill("delibera.durata")),
    ];
    if let Some(compenso) = reader.optional("delibera.compenso") {
        points.push(format!("di attribuire all'amministratore un compenso annuo lordo di euro {compenso};"));
    }
    resolution(out, points);
    out.push(Block::paragraph(format!(
        "{nominativo}, presente, dichiara di accettare la carica e attesta l'insussistenza di cause di ineleggibilità e decadenza."
    )));
}

fn dimissioni_amministratore(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let dimissionario = reader.fill("delibera.dimissionario");
    let carica = reader
        .optional("delibera.carica")
        .unwrap_or_else(|| "amministratore".to_string());
    let nominativo = reader.fill("delibera.nominativo");
    out.push(Block::paragraph(format!(
        "Il Presidente informa l'assemblea che in data {} {dimissionario} ha rassegnato le proprie dimissioni dalla carica di {carica} e che occorre pertanto provvedere alla sua sostituzione.",
        reader.fill("delibera.data_dimissioni"),
    )));
    let durata = reader
        .optional("delibera.durata")
        .unwrap_or_else(|| "fino a revoca o dimissioni".to_string());
    resolution(
        out,
        vec![
            format!("di prendere atto delle dimissioni di {dimissionario} dalla carica di {carica};"),
            format!(
                "di nominare in sostituzione {}, che resterà in carica {durata}.",
                reader.described_at("delibera.nominativo", "delibera.codice_fiscale")
            ),
        ],
    );
    out.push(Block::paragraph(format!(
        "{nominativo}, presente, dichiara di accettare la carica."
    )));
}

fn nomina_sindaci(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    out.push(Block::paragraph(
        "Il Presidente ricorda che occorre provvedere alla nomina del collegio sindacale e sottopone all'assemblea la proposta di composizione.",
    ));
    let mut points = vec!["di nominare il collegio sindacale nelle persone di:".to_string()];
    let sindaci = reader.list("delibera.sindaci");
    let members: Vec<String> = sindaci
        .iter()
        .filter_map(|sindaco| {
            let name = person_name(sindaco)?;
            let cf = sindaco.get("codice_fiscale").map(value_text);
            let who = reader.described(&name, cf.as_deref());
            let carica = sindaco.get("carica").map(value_text).unwrap_or_default();
            Some(if carica.is_empty() {
                format!("{who};")
            } else {
                format!("{who}, {carica};")
            })
        })
        .collect();
    if members.is_empty() {
        points.push(format!("{};", reader.fill("delibera.sindaci")));
    }
    points.extend(members);
    points.push(format!(
        "di stabilire che il collegio resterà in carica {};",
        reader.fill("delibera.durata")
    ));
    if let Some(compenso) = reader.optional("delibera.compenso") {
        points.push(format!(
            "di determinare il compenso annuo spettante al collegio in euro {compenso}."
        ));
    }
    resolution(out, points);
}

fn trasferimento_sede(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let nuova_sede = reader.fill("delibera.nuova_sede");
    out.push(Block::paragraph(format!(
        "Il Presidente illustra le ragioni che rendono opportuno il trasferimento della sede legale della società da {} a {nuova_sede}.",
        reader.fill("sede_legale"),
    )));
    let decorrenza = reader
        .optional("delibera.decorrenza")
        .unwrap_or_else(|| "dalla data di iscrizione della presente delibera nel Registro delle Imprese".to_string());
    let articolo = reader
        .optional("delibera.articolo_statuto")
        .map(|art| format!("l'articolo {art}"))
        .unwrap_or_else(|| "l'articolo relativo alla sede".to_string());
    resolution(
        out,
        vec![
            format!("di trasferire la sede legale in {nuova_sede}, con effetto {decorrenza};"),
            format!("di modificare conseguentemente {articolo} dello statuto sociale;"),
            format!(
                "di conferire a {} ogni potere per l'esecuzione della presente delibera.",
                reader.fill("assemblea.presidente")
            ),
        ],
    );
}

fn distribuzione_utili(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let esercizio = reader.fill("bilancio.esercizio");
    let utile = reader
        .optional("bilancio.utile_perdita")
        .map(|utile| format!(", che chiude con un utile di euro {utile}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il Presidente richiama il bilancio dell'esercizio {esercizio}{utile}, e propone di distribuire ai soci parte degli utili disponibili."
    )));
    let mut points = vec![format!(
        "di distribuire ai soci utili per complessivi euro {}, in proporzione alle rispettive quote di partecipazione;",
        reader.fill("delibera.importo_dividendi")
    )];
    if let Some(date) = reader.optional("delibera.data_pagamento") {
        points.push(format!("di fissare il pagamento entro il {date}."));
    }
    resolution(out, points);

    let shares: Vec<String> = reader
        .list("soci")
        .iter()
        .filter_map(|socio| {
            let name = person_name(socio)?;
            let quota = socio
                .get("quota_percentuale")
                .map(value_text)
                .filter(|quota| !quota.is_empty())?;
            Some(format!("{name}: {quota}"))
        })
        .collect();
    if !shares.is_empty() {
        out.push(Block::paragraph("Ripartizione in base alle quote di partecipazione:"));
        out.extend(shares.into_iter().map(Block::item));
    }
}

fn compenso_amministratori(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let periodo = reader
        .optional("delibera.periodo")
        .unwrap_or_else(|| "annuo lordo".to_string());
    let admins: Vec<String> = reader
        .list("amministratori")
        .iter()
        .filter_map(person_name)
        .collect();
    let beneficiari = if admins.is_empty() {
        "all'organo amministrativo".to_string()
    } else {
        format!("all'organo amministrativo, nella persona di {}", admins.join(", "))
    };
    out.push(Block::paragraph(
        "Il Presidente ricorda che, a norma dello statuto, spetta all'assemblea determinare il compenso dell'organo amministrativo.",
    ));
    resolution(
        out,
        vec![format!(
            "di attribuire {beneficiari} un compenso {periodo} di euro {}, oltre al rimborso delle spese sostenute per ragioni d'ufficio.",
            reader.fill("delibera.compenso")
        )],
    );
}

fn aumento_capitale(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let attuale = reader.fill("capitale_sociale");
    let nuovo = reader.fill("delibera.nuovo_capitale");
    let importo = reader.fill("delibera.importo_aumento");
    out.push(Block::paragraph(format!(
        "Il Presidente illustra l'opportunità di aumentare il capitale sociale da euro {attuale} a euro {nuovo}, e quindi per euro {importo}."
    )));
    let modalita = reader.optional("delibera.modalita").unwrap_or_else(|| {
        "mediante conferimenti in denaro da parte dei soci in proporzione alle quote possedute"
            .to_string()
    });
    let mut points = vec![format!(
        "di aumentare il capitale sociale da euro {attuale} a euro {nuovo}, e quindi per euro {importo}, {modalita};"
    )];
    if let Some(termine) = reader.optional("delibera.termine_sottoscrizione") {
        points.push(format!("di fissare al {termine} il termine per la sottoscrizione;"));
    }
    points.push(
        "di modificare conseguentemente l'articolo dello statuto sociale relativo al capitale."
            .to_string(),
    );
    resolution(out, points);
}

fn revoca_amministratore(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let revocato = reader.fill("delibera.revocato");
    let carica = reader
        .optional("delibera.carica")
        .unwrap_or_else(|| "amministratore".to_string());
    let motivazione = reader.fill("delibera.motivazione");
    out.push(Block::paragraph(format!(
        "Il Presidente espone all'assemblea le circostanze che inducono a proporre la revoca di {revocato} dalla carica di {carica}, e in particolare: {motivazione}."
    )));
    let mut points = vec![format!(
        "di revocare {revocato} dalla carica di {carica} con effetto immediato, per le ragioni esposte;"
    )];
    if let Some(nominativo) = reader.optional("delibera.nominativo") {
        let durata = reader
            .optional("delibera.durata")
            .unwrap_or_else(|| "fino a revoca o dimissioni".to_string());
        points.push(format!(
            "di nominare in sostituzione {}, che resterà in carica {durata}.",
            reader.described(&nominativo, reader.optional("delibera.codice_fiscale").as_deref())
        ));
    }
    resolution(out, points);
}

fn nomina_revisore(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let revisore = reader.fill("delibera.revisore");
    out.push(Block::paragraph(format!(
        "Il Presidente ricorda che occorre conferire l'incarico di revisione legale dei conti e sottopone all'assemblea la proposta di affidarlo a {revisore}."
    )));
    let registro = reader
        .optional("delibera.numero_registro")
        .map(|numero| format!(", Registro dei revisori legali n. {numero}"))
        .unwrap_or_default();
    let mut points = vec![
        format!(
            "di conferire l'incarico di revisione legale dei conti a {}{registro};",
            reader.described_at("delibera.revisore", "delibera.codice_fiscale")
        ),
        format!(
            "di stabilire che l'incarico avrà durata {};",
            reader.fill("delibera.durata")
        ),
    ];
    if let Some(compenso) = reader.optional("delibera.compenso") {
        points.push(format!(
            "di determinare il corrispettivo annuo per l'intera durata dell'incarico in euro {compenso}."
        ));
    }
    resolution(out, points);
}

fn riduzione_capitale(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let attuale = reader.fill("capitale_sociale");
    let perdite = reader.fill("delibera.perdite");
    let nuovo = reader.fill("delibera.nuovo_capitale");
    let situazione = reader
        .optional("delibera.data_situazione")
        .map(|date| format!(" aggiornata al {date}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il Presidente illustra la situazione patrimoniale della società{situazione}, dalla quale emergono perdite per complessivi euro {perdite}, che riducono il capitale sociale di oltre un terzo."
    )));
    out.push(Block::paragraph(
        "La situazione patrimoniale, con le osservazioni dell'organo di controllo ove nominato, è rimasta depositata presso la sede sociale nei termini di legge.",
    ));
    let mut points = vec![
        "di approvare la situazione patrimoniale presentata dall'organo amministrativo;".to_string(),
        format!(
            "di coprire le perdite di euro {perdite} mediante riduzione del capitale sociale da euro {attuale} a euro {nuovo};"
        ),
    ];
    if let Some(ricostituzione) = reader.optional("delibera.ricostituzione") {
        points.push(format!(
            "di ricostituire il capitale sociale {ricostituzione};"
        ));
    }
    points.push(
        "di modificare conseguentemente l'articolo dello statuto sociale relativo al capitale."
            .to_string(),
    );
    resolution(out, points);
}

fn modifica_oggetto_sociale(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    out.push(Block::paragraph(
        "Il Presidente illustra le ragioni che rendono opportuno ampliare e riformulare l'oggetto sociale, in relazione alle attività che la società intende svolgere.",
    ));
    let articolo = reader
        .optional("delibera.articolo_statuto")
        .map(|art| format!("l'articolo {art}"))
        .unwrap_or_else(|| "l'articolo relativo all'oggetto".to_string());
    resolution(
        out,
        vec![
            format!(
                "di modificare l'oggetto sociale, riformulando {articolo} dello statuto sociale come segue:"
            ),
            format!("\"{}\";", reader.fill("delibera.nuovo_oggetto")),
            "di dare atto che ai soci che non hanno concorso alla deliberazione spetta il diritto di recesso nei termini di legge.".to_string(),
        ],
    );
}

fn trasformazione(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let attuale = reader
        .optional("forma_giuridica")
        .unwrap_or_else(|| "l'attuale forma".to_string());
    let nuova_forma = reader.fill("delibera.nuova_forma");
    let denominazione = reader
        .optional("delibera.nuova_denominazione")
        .unwrap_or_else(|| reader.fill("denominazione"));
    out.push(Block::paragraph(format!(
        "Il Presidente illustra le ragioni economiche e organizzative che rendono opportuna la trasformazione della società da {attuale} in {nuova_forma}."
    )));
    let mut points = vec![
        format!(
            "di trasformare la società da {attuale} in {nuova_forma}, con la denominazione \"{denominazione}\";"
        ),
        "di approvare il nuovo statuto sociale, che si allega al presente verbale;".to_string(),
    ];
    if let Some(perizia) = reader.optional("delibera.perizia") {
        points.push(format!(
            "di dare atto che il patrimonio sociale risulta dalla relazione di stima {perizia};"
        ));
    }
    if let Some(capitale) = reader.optional("delibera.nuovo_capitale") {
        points.push(format!(
            "di fissare il capitale sociale della società trasformata in euro {capitale};"
        ));
    }
    points.push(
        "di dare atto che la società trasformata conserva i diritti e gli obblighi e prosegue in tutti i rapporti anteriori alla trasformazione."
            .to_string(),
    );
    resolution(out, points);
}

fn scioglimento_liquidazione(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let causa = reader.fill("delibera.causa_scioglimento");
    out.push(Block::paragraph(format!(
        "Il Presidente illustra all'assemblea la situazione della società e propone di procedere allo scioglimento anticipato per la seguente causa: {causa}."
    )));
    let liquidatore = reader.described_at("delibera.liquidatore", "delibera.codice_fiscale");
    let poteri = reader
        .optional("delibera.poteri_liquidatore")
        .unwrap_or_else(|| "tutti i poteri previsti dall'articolo 2489 del codice civile".to_string());
    let mut points = vec![
        "di sciogliere anticipatamente la società e di porla in liquidazione;".to_string(),
        format!("di nominare liquidatore {liquidatore}, con {poteri};"),
    ];
    if let Some(compenso) = reader.optional("delibera.compenso") {
        points.push(format!(
            "di attribuire al liquidatore un compenso di euro {compenso};"
        ));
    }
    points.push(
        "di stabilire che la società aggiunga alla propria denominazione l'indicazione \"in liquidazione\"."
            .to_string(),
    );
    resolution(out, points);
    out.push(Block::paragraph(format!(
        "{}, presente, dichiara di accettare la carica.",
        reader.fill("delibera.liquidatore")
    )));
}

fn consiglio_progetto_bilancio(reader: &FieldReader<'_>, out: &mut Vec<Block>) {
    let esercizio = reader.fill("bilancio.esercizio");
    let chiusura = reader
        .optional("bilancio.data_chiusura")
        .map(|date| format!(" chiuso al {date}"))
        .unwrap_or_default();
    out.push(Block::paragraph(format!(
        "Il Presidente sottopone al consiglio il progetto di bilancio dell'esercizio {esercizio}{chiusura}, composto da stato patrimoniale, conto economico e nota integrativa."
    )));
    if let Some(risultato) = reader.optional("bilancio.utile_perdita") {
        out.push(Block::paragraph(format!(
            "Il progetto di bilancio evidenzia un risultato d'esercizio di euro {risultato}."
        )));
    }
    let ora = reader
        .optional("delibera.ora_assemblea")
        .map(|ora| format!(" alle ore {ora}"))
        .unwrap_or_default();
    let luogo = reader
        .optional("delibera.luogo_assemblea")
        .unwrap_or_else(|| "presso la sede sociale".to_string());
    resolution_by(
        "Il consiglio",
        out,
        vec![
            format!("di approvare il progetto di bilancio dell'esercizio {esercizio}{chiusura};"),
            format!(
                "di convocare l'assemblea dei soci per il giorno {}{ora}, {luogo}, per deliberare sull'approvazione del bilancio;",
                reader.fill("delibera.data_assemblea")
            ),
            format!(
                "di dare mandato al Presidente {} per gli adempimenti conseguenti.",
                reader.fill("assemblea.presidente")
            ),
        ],
    );
}
