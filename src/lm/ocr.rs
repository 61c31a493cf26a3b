//! OCR through the provider's `/v1/ocr` endpoint.
use super::backend::{post_json, CallError};
use super::client::RetryPolicy;
use super::log::{append_lm_log, next_sequence_number, LmInvocationKind, LmLogBuilder};
use super::OcrProvider;
use crate::config::ResolvedBackend;
use crate::session::SessionPaths;
use anyhow::{anyhow, Result};
use base64::Engine;
use serde_json::{json, Value};
use std::thread;

/// Where OCR calls are logged.
struct OcrLog {
    paths: SessionPaths,
    document_id: String,
    source: String,
}

/// OCR client sharing the chat backend's URL, key and retry schedule.
pub struct HttpOcr {
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    policy: RetryPolicy,
    log: Option<OcrLog>,
}

impl HttpOcr {
    /// OCR is only available with the http backend.
    pub fn from_backend(resolved: &ResolvedBackend, policy: RetryPolicy) -> Option<Self> {
        match resolved {
            ResolvedBackend::Http {
                base_url,
                ocr_model,
                api_key_env,
                api_key,
                ..
            } => Some(Self {
                base_url: base_url.clone(),
                model: ocr_model.clone(),
                api_key_env: api_key_env.clone(),
                api_key: api_key.clone(),
                policy,
                log: None,
            }),
            ResolvedBackend::Command { .. } => None,
        }
    }

    /// Record calls in the session's LM log under the given document.
    pub fn with_log(mut self, paths: SessionPaths, document_id: &str, source: &str) -> Self {
        self.log = Some(OcrLog {
            paths,
            document_id: document_id.to_string(),
            source: source.to_string(),
        });
        self
    }

    fn request_body(&self, bytes: &[u8], mime: &str) -> Value {
        let data_url = format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );
        let document = if mime.starts_with("image/") {
            json!({ "type": "image_url", "image_url": data_url })
        } else {
            json!({ "type": "document_url", "document_url": data_url })
        };
        json!({ "model": self.model, "document": document })
    }

    fn run(&self, bytes: &[u8], mime: &str) -> (Result<String>, usize) {
        let Some(api_key) = self.api_key.as_deref() else {
            return (Err(anyhow!("API key missing: set {}", self.api_key_env)), 0);
        };
        let url = format!("{}/v1/ocr", self.base_url);
        let body = self.request_body(bytes, mime);
        let mut last_error = anyhow!("no attempts configured");
        for (attempt, timeout) in self.policy.timeouts.iter().enumerate() {
            if attempt > 0 {
                tracing::warn!(attempt = attempt + 1, error = %format!("{last_error:#}"), "ocr retry");
                thread::sleep(self.policy.delay);
            }
            match post_json(&url, api_key, &body, *timeout) {
                Ok(value) => return (pages_markdown(&value), attempt + 1),
                Err(err) if err.is_fatal() => return (Err(err.into_inner()), attempt + 1),
                Err(CallError::Retryable(err)) | Err(CallError::Fatal(err)) => last_error = err,
            }
        }
        (
            Err(last_error.context(format!(
                "OCR failed after {} attempt(s)",
                self.policy.attempts()
            ))),
            self.policy.attempts(),
        )
    }
}

impl OcrProvider for HttpOcr {
    fn ocr(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let builder = match &self.log {
            Some(log) => {
                let seq = next_sequence_number(&log.paths)?;
                Some(
                    LmLogBuilder::new(seq, LmInvocationKind::Ocr)
                        .with_document(&log.document_id, &log.source),
                )
            }
            None => None,
        };
        let (result, attempts) = self.run(bytes, mime);
        if let (Some(builder), Some(log)) = (builder, &self.log) {
            let entry = match &result {
                Ok(text) => builder.success(attempts, format!("{} chars", text.chars().count()))?,
                Err(err) => builder.failed(attempts, format!("{err:#}"))?,
            };
            append_lm_log(&log.paths, &entry)?;
        }
        result
    }
}

/// Join the markdown of every page in order.
fn pages_markdown(value: &Value) -> Result<String> {
    let pages = value
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("OCR response has no pages"))?;
    let text = pages
        .iter()
        .filter_map(|page| page.get("markdown").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::log::load_lm_log;
    use std::time::Duration;

    fn http_backend(api_key: Option<&str>) -> ResolvedBackend {
        ResolvedBackend::Http {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "chat".to_string(),
            ocr_model: "ocr-model".to_string(),
            api_key_env: "OCR_TEST_KEY".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            timeouts: vec![Duration::from_secs(1)],
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn command_backend_has_no_ocr() {
        let resolved = ResolvedBackend::Command {
            command: "cat".to_string(),
        };
        assert!(HttpOcr::from_backend(&resolved, policy()).is_none());
    }

    #[test]
    fn request_body_uses_data_urls() {
        let ocr = HttpOcr::from_backend(&http_backend(Some("k")), policy()).unwrap();
        let body = ocr.request_body(b"abc", "application/pdf");
        assert_eq!(body["model"], "ocr-model");
        assert_eq!(body["document"]["type"], "document_url");
        assert_eq!(
            body["document"]["document_url"],
            "data:application/pdf;base64,YWJj"
        );

        let body = ocr.request_body(b"abc", "image/png");
        assert_eq!(body["document"]["type"], "image_url");
        assert!(body["document"]["image_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn pages_are_joined_in_order() {
        let value = json!({"pages": [
            {"index": 0, "markdown": "# VISURA\nAlfa"},
            {"index": 1, "markdown": "  "},
            {"index": 2, "markdown": "Soci"}
        ]});
        assert_eq!(pages_markdown(&value).unwrap(), "# VISURA\nAlfa\n\nSoci");
        assert!(pages_markdown(&json!({})).is_err());
    }

    #[test]
    fn missing_key_is_logged_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path().to_path_buf());
        let ocr = HttpOcr::from_backend(&http_backend(None), policy())
            .unwrap()
            .with_log(paths.clone(), "doc-003", "scansione.png");
        let err = ocr.ocr(b"x", "image/png").unwrap_err();
        assert!(err.to_string().contains("OCR_TEST_KEY"));

        let entries = load_lm_log(&paths).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LmInvocationKind::Ocr);
        assert_eq!(entries[0].document_id.as_deref(), Some("doc-003"));
        assert_eq!(entries[0].source.as_deref(), Some("scansione.png"));
    }
}
