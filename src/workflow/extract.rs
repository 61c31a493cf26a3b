//! Workflow extract step.
//!
//! Each uploaded file is stored in the session, turned into text, sent to the
//! model with its kind's prompt, and saved as one extracted document. A failed
//! extraction is stored with the kind's default fields and the error, so the
//! user can still fill the fields by hand, unless `--strict` is set. Extracting
//! the same content as the same kind again overwrites a failed record under
//! its id.
use super::context::SessionContext;
use crate::cli::ExtractArgs;
use crate::config::{process_env, resolve_backend, ResolvedBackend};
use crate::ingest::{detect_format, read_source_text, SourceFormat, SourceText};
use crate::lm::{
    append_lm_log, build_backend, invoke_extraction, next_sequence_number, store_lm_content,
    CompletionBackend, HttpOcr, LmInvocationKind, LmLogBuilder, OcrProvider, RetryPolicy,
};
use crate::processors::{processor_for, DocumentProcessor};
use crate::session::{
    find_by_hash, find_failed_by_hash, load_documents, next_document_id, store_source,
    write_document, ExtractedDocument, SourceRef, TextMethod, DOCUMENT_SCHEMA_VERSION,
};
use crate::util::now_epoch_ms;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// What happened to one uploaded file.
enum ExtractOutcome {
    Extracted(ExtractedDocument),
    Failed(ExtractedDocument),
    Reused(String),
}

/// Run the extract step for every file in order.
pub fn run_extract(args: &ExtractArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let resolved = resolve_backend(&ctx.config, args.lm.as_deref(), process_env);
    let backend = build_backend(&resolved);
    let policy = RetryPolicy::from_config(&ctx.config);
    let processor = processor_for(args.kind);
    tracing::info!(backend = %backend.describe(), kind = %args.kind, files = args.files.len(), "extract");

    let step = ExtractStep {
        ctx: &ctx,
        resolved: &resolved,
        backend: backend.as_ref(),
        policy: &policy,
        processor: &processor,
        strict: args.strict,
        force: args.force,
    };
    let mut failed = 0usize;
    for file in &args.files {
        match step.run(file)? {
            ExtractOutcome::Extracted(doc) => {
                let method = text_method_label(doc.source.text_method);
                println!(
                    "{}: {} ({}, {} fields via {method})",
                    doc.id,
                    doc.source.original_name,
                    doc.kind,
                    doc.fields.len()
                );
            }
            ExtractOutcome::Failed(doc) => {
                failed += 1;
                println!(
                    "{}: {} FAILED: {}",
                    doc.id,
                    doc.source.original_name,
                    doc.error.as_deref().unwrap_or_default()
                );
            }
            ExtractOutcome::Reused(id) => {
                println!(
                    "{id}: {} already extracted as {} (use --force to extract again)",
                    file.display(),
                    args.kind
                );
            }
        }
    }
    if failed > 0 {
        println!(
            "{failed} extraction(s) failed; default fields were stored (fill them with `verbale edit --session {}`)",
            ctx.session_flag()
        );
    }
    Ok(())
}

struct ExtractStep<'a> {
    ctx: &'a SessionContext,
    resolved: &'a ResolvedBackend,
    backend: &'a dyn CompletionBackend,
    policy: &'a RetryPolicy,
    processor: &'a DocumentProcessor,
    strict: bool,
    force: bool,
}

impl ExtractStep<'_> {
    fn run(&self, file: &Path) -> Result<ExtractOutcome> {
        let paths = &self.ctx.paths;
        let format = detect_format(file)?;
        let bytes = fs::read(file).with_context(|| format!("read {}", file.display()))?;
        let original_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("source path has no file name: {}", file.display()))?
            .to_string();
        let (stored_path, sha256) = store_source(paths, file, &bytes)?;

        let existing = load_documents(paths)?;
        if !self.force {
            if let Some(doc) = find_by_hash(&existing, self.processor.kind, &sha256) {
                tracing::info!(id = %doc.id, sha256 = %sha256, "reuse existing extraction");
                return Ok(ExtractOutcome::Reused(doc.id.clone()));
            }
        }

        let id = match find_failed_by_hash(&existing, self.processor.kind, &sha256) {
            Some(failed) => {
                tracing::info!(id = %failed.id, "replace failed extraction");
                failed.id.clone()
            }
            None => next_document_id(paths)?,
        };
        let mut source = SourceRef {
            original_name,
            stored_path,
            sha256,
            bytes: bytes.len() as u64,
            text_method: expected_method(format),
            chars: 0,
        };

        let result = self
            .read_text(file, &bytes, &id)
            .and_then(|text| {
                source.text_method = text.method;
                source.chars = text.text.chars().count();
                self.extract_fields(&id, &source.original_name, &text)
            });

        let (fields, error) = match result {
            Ok(fields) => (fields, None),
            Err(err) => {
                let message = format!("{err:#}");
                if self.strict {
                    return Err(err.context(format!("extract {}", file.display())));
                }
                tracing::warn!(id = %id, error = %message, "extraction failed; storing defaults");
                (self.processor.default_fields(), Some(message))
            }
        };

        let doc = ExtractedDocument {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            id,
            kind: self.processor.kind,
            source,
            extracted_at_epoch_ms: now_epoch_ms()?,
            fields,
            error,
        };
        write_document(paths, &doc)?;
        Ok(if doc.is_failed() {
            ExtractOutcome::Failed(doc)
        } else {
            ExtractOutcome::Extracted(doc)
        })
    }

    fn read_text(&self, file: &Path, bytes: &[u8], id: &str) -> Result<SourceText> {
        let source = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ocr = HttpOcr::from_backend(self.resolved, self.policy.clone())
            .map(|ocr| ocr.with_log(self.ctx.paths.clone(), id, &source));
        let provider = ocr.as_ref().map(|ocr| ocr as &dyn OcrProvider);
        read_source_text(file, bytes, &self.ctx.config, provider)
    }

    fn extract_fields(
        &self,
        id: &str,
        original_name: &str,
        text: &SourceText,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let paths = &self.ctx.paths;
        let prompt = self.processor.build_prompt(&text.text);
        let seq = next_sequence_number(paths)?;
        let builder = LmLogBuilder::new(seq, LmInvocationKind::Extraction)
            .with_document(id, original_name)
            .with_prompt_preview(&prompt);
        tracing::debug!(id, prompt_bytes = prompt.len(), "send extraction prompt");

        match invoke_extraction(self.backend, self.policy, &prompt) {
            Ok(result) => {
                tracing::info!(
                    id,
                    attempts = result.attempts,
                    elapsed_ms = result.duration.as_millis() as u64,
                    response_bytes = result.raw_response.len(),
                    "extraction succeeded"
                );
                if self.ctx.config.log_full_content {
                    store_lm_content(
                        paths,
                        seq,
                        LmInvocationKind::Extraction,
                        &result.prompt,
                        &result.raw_response,
                    )?;
                }
                let fields = self.processor.normalize(result.result);
                let entry = builder.success(result.attempts, format!("{} fields", fields.len()))?;
                append_lm_log(paths, &entry)?;
                Ok(fields)
            }
            Err(err) => {
                if self.ctx.config.log_full_content {
                    store_lm_content(
                        paths,
                        seq,
                        LmInvocationKind::Extraction,
                        &err.last_prompt,
                        err.last_response.as_deref().unwrap_or_default(),
                    )?;
                }
                let entry = builder.failed(err.attempts, err.to_string())?;
                append_lm_log(paths, &entry)?;
                Err(anyhow!(err))
            }
        }
    }
}

fn expected_method(format: SourceFormat) -> TextMethod {
    match format {
        SourceFormat::Text => TextMethod::Text,
        SourceFormat::Pdf => TextMethod::PdfText,
        SourceFormat::Docx => TextMethod::Docx,
        SourceFormat::Image { .. } => TextMethod::Ocr,
    }
}

fn text_method_label(method: TextMethod) -> &'static str {
    match method {
        TextMethod::Text => "text",
        TextMethod::PdfText => "pdf text",
        TextMethod::Docx => "docx",
        TextMethod::Ocr => "ocr",
    }
}
