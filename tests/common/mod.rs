//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Environment variables that would leak a real backend into the tests.
const BACKEND_ENV: [&str; 5] = [
    "VERBALE_SESSION",
    "VERBALE_LM_COMMAND",
    "VERBALE_MODEL",
    "VERBALE_BASE_URL",
    "MISTRAL_API_KEY",
];

/// A scratch session directory plus helpers to drive the `verbale` binary.
pub struct TestSession {
    dir: TempDir,
}

impl TestSession {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    /// Directory holding source files and mock responses.
    #[allow(dead_code)]
    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// The session root passed with `--session`.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("sessione")
    }

    /// Write a source document next to the session.
    pub fn source(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).expect("write source");
        path
    }

    /// A command backend that ignores the prompt and prints `response`.
    pub fn mock_lm(&self, name: &str, response: &Value) -> String {
        let response_path = self.dir.path().join(format!("{name}.json"));
        fs::write(&response_path, response.to_string()).expect("write mock response");
        let script_path = self.dir.path().join(format!("{name}.sh"));
        let script = format!(
            "cat >/dev/null\ncat {}\n",
            shell_words::quote(&response_path.display().to_string())
        );
        fs::write(&script_path, script).expect("write mock script");
        format!(
            "sh {}",
            shell_words::quote(&script_path.display().to_string())
        )
    }

    /// Run `verbale <args> --session <root>`.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = verbale();
        cmd.args(args).arg("--session").arg(self.root());
        cmd.output().expect("spawn verbale")
    }

    /// Run and assert success, returning stdout.
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "verbale {args:?} failed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Run and parse stdout as JSON.
    pub fn run_json(&self, args: &[&str]) -> Value {
        let stdout = self.run_ok(args);
        serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("parse {stdout}: {err}"))
    }

    /// Read a JSON file under the session root.
    pub fn read_json(&self, rel: &str) -> Value {
        let path = self.root().join(rel);
        let text = fs::read_to_string(&path).expect("read session file");
        serde_json::from_str(&text).expect("parse session file")
    }
}

/// The `verbale` binary with backend variables cleared.
pub fn verbale() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_verbale"));
    for key in BACKEND_ENV {
        cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

/// Text of `word/document.xml` inside a generated `.docx`.
#[allow(dead_code)]
pub fn docx_document_xml(path: &Path) -> String {
    let file = fs::File::open(path).expect("open docx");
    let mut archive = zip::ZipArchive::new(file).expect("read docx zip");
    let mut entry = archive
        .by_name("word/document.xml")
        .expect("docx has word/document.xml");
    let mut xml = String::new();
    entry.read_to_string(&mut xml).expect("read document.xml");
    xml
}

pub fn visura_response(sede: &str) -> Value {
    serde_json::json!({
        "denominazione": "Alfa S.r.l.",
        "forma_giuridica": "società a responsabilità limitata",
        "codice_fiscale": "01234567890",
        "partita_iva": "01234567890",
        "sede_legale": sede,
        "capitale_sociale": "10.000,00",
        "soci": [
            {"nome": "Mario Rossi", "codice_fiscale": "RSSMRA70A01F205X", "quota_percentuale": "60%"},
            {"nome": "Anna Bianchi", "codice_fiscale": "BNCNNA75B41F205Y", "quota_percentuale": "40%"}
        ],
        "amministratori": [
            {"nome": "Mario Rossi", "carica": "Amministratore Unico", "codice_fiscale": "RSSMRA70A01F205X"}
        ],
        "sindaci": []
    })
}

#[allow(dead_code)]
pub fn bilancio_response() -> Value {
    serde_json::json!({
        "denominazione": "Alfa S.r.l.",
        "codice_fiscale": "01234567890",
        "esercizio": "2025",
        "data_chiusura": "31/12/2025",
        "utile_perdita": "12.500,00",
        "risultato": "utile"
    })
}
