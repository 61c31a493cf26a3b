//! Retry loop around extraction calls.
use super::backend::{CallError, CompletionBackend};
use super::response::extract_json_object;
use crate::config::SessionConfig;
use crate::util::truncate_string;
use serde_json::{Map, Value};
use std::thread;
use std::time::{Duration, Instant};

const RETRY_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/retry.md"));

/// Bytes of the previous response echoed back in a retry prompt.
const RETRY_SNIPPET_BYTES: usize = 1000;

/// Fixed attempt schedule: one timeout per attempt and a constant pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeouts: Vec<Duration>,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeouts: config
                .timeouts_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn attempts(&self) -> usize {
        self.timeouts.len()
    }
}

/// Result of an LM invocation with metadata for logging.
#[derive(Debug)]
pub struct LmInvocationResult<T> {
    /// The parsed result.
    pub result: T,
    /// The prompt of the successful attempt.
    pub prompt: String,
    /// The raw response text from the LM.
    pub raw_response: String,
    /// Attempts used, including the successful one.
    pub attempts: usize,
    pub duration: Duration,
}

/// All attempts failed, or a fatal error stopped the loop.
#[derive(Debug)]
pub struct LmInvocationError {
    pub attempts: usize,
    pub last_prompt: String,
    pub last_response: Option<String>,
    pub error: anyhow::Error,
}

impl std::fmt::Display for LmInvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LM failed after {} attempt(s). Last error: {:#}",
            self.attempts, self.error
        )
    }
}

impl std::error::Error for LmInvocationError {}

/// Send an extraction prompt and parse a JSON object from the response.
///
/// Parse failures are retried with the error and the previous response
/// included in the prompt so the model can correct itself.
pub fn invoke_extraction(
    backend: &dyn CompletionBackend,
    policy: &RetryPolicy,
    prompt: &str,
) -> Result<LmInvocationResult<Map<String, Value>>, LmInvocationError> {
    let start = Instant::now();
    let total = policy.attempts();
    let mut last_error: Option<anyhow::Error> = None;
    let mut last_response: Option<String> = None;
    let mut parse_failure: Option<(String, String)> = None;
    let mut final_prompt = prompt.to_string();

    for (attempt, timeout) in policy.timeouts.iter().enumerate() {
        if attempt > 0 {
            tracing::warn!(
                attempt = attempt + 1,
                total,
                error = %last_error.as_ref().map(|err| format!("{err:#}")).unwrap_or_default(),
                "lm retry"
            );
            thread::sleep(policy.delay);
        }
        let current_prompt = match &parse_failure {
            Some((error, previous)) => build_retry_prompt(prompt, error, previous),
            None => prompt.to_string(),
        };
        final_prompt = current_prompt.clone();

        match backend.complete(&current_prompt, *timeout) {
            Ok(text) => match extract_json_object(&text) {
                Ok(fields) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "lm retry succeeded");
                    }
                    return Ok(LmInvocationResult {
                        result: fields,
                        prompt: current_prompt,
                        raw_response: text,
                        attempts: attempt + 1,
                        duration: start.elapsed(),
                    });
                }
                Err(err) => {
                    parse_failure = Some((format!("{err:#}"), text.clone()));
                    last_response = Some(text);
                    last_error = Some(err);
                }
            },
            Err(CallError::Fatal(err)) => {
                return Err(LmInvocationError {
                    attempts: attempt + 1,
                    last_prompt: current_prompt,
                    last_response,
                    error: err,
                });
            }
            Err(CallError::Retryable(err)) => {
                last_error = Some(err);
            }
        }
    }

    Err(LmInvocationError {
        attempts: total,
        last_prompt: final_prompt,
        last_response,
        error: last_error.unwrap_or_else(|| anyhow::anyhow!("no attempts configured")),
    })
}

fn build_retry_prompt(original: &str, error: &str, previous_response: &str) -> String {
    let snippet = if previous_response.len() > RETRY_SNIPPET_BYTES {
        format!(
            "{}...(truncated)",
            truncate_string(previous_response, RETRY_SNIPPET_BYTES)
        )
    } else {
        previous_response.to_string()
    };
    RETRY_PROMPT
        .replace("{error}", error)
        .replace("{previous_response}", &snippet)
        .replace("{original_prompt}", original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;

    /// Replays a fixed script of outcomes and records prompts and timeouts.
    struct ScriptedBackend {
        script: RefCell<Vec<Result<String, CallError>>>,
        prompts: RefCell<Vec<String>>,
        timeouts: RefCell<Vec<Duration>>,
    }

    impl ScriptedBackend {
        fn new(mut script: Vec<Result<String, CallError>>) -> Self {
            script.reverse();
            Self {
                script: RefCell::new(script),
                prompts: RefCell::new(Vec::new()),
                timeouts: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionBackend for ScriptedBackend {
        fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CallError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.timeouts.borrow_mut().push(timeout);
            self.script
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(CallError::Fatal(anyhow!("script exhausted"))))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn policy(secs: &[u64]) -> RetryPolicy {
        RetryPolicy {
            timeouts: secs.iter().map(|s| Duration::from_secs(*s)).collect(),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn first_valid_response_wins() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"denominazione":"Alfa"}"#.to_string())]);
        let result = invoke_extraction(&backend, &policy(&[30, 20]), "PROMPT").unwrap();
        assert_eq!(result.attempts, 1);
        assert_eq!(result.result["denominazione"], "Alfa");
        assert_eq!(backend.prompts.borrow().len(), 1);
    }

    #[test]
    fn attempts_use_shrinking_timeouts_in_order() {
        let backend = ScriptedBackend::new(vec![
            Err(CallError::Retryable(anyhow!("timeout"))),
            Err(CallError::Retryable(anyhow!("HTTP 503"))),
            Ok("{}".to_string()),
        ]);
        let result = invoke_extraction(&backend, &policy(&[60, 45, 30]), "P").unwrap();
        assert_eq!(result.attempts, 3);
        assert_eq!(
            *backend.timeouts.borrow(),
            vec![
                Duration::from_secs(60),
                Duration::from_secs(45),
                Duration::from_secs(30)
            ]
        );
    }

    #[test]
    fn parse_failure_feeds_error_into_retry_prompt() {
        let backend = ScriptedBackend::new(vec![
            Ok("Ecco i dati: nessun oggetto".to_string()),
            Ok(r#"{"ok": true}"#.to_string()),
        ]);
        let result = invoke_extraction(&backend, &policy(&[10, 10]), "ORIGINAL TASK").unwrap();
        assert_eq!(result.attempts, 2);
        let prompts = backend.prompts.borrow();
        assert_eq!(prompts[0], "ORIGINAL TASK");
        assert!(prompts[1].contains("Ecco i dati"));
        assert!(prompts[1].contains("ORIGINAL TASK"));
        assert_eq!(result.prompt, prompts[1]);
    }

    #[test]
    fn fatal_error_stops_immediately() {
        let backend = ScriptedBackend::new(vec![
            Err(CallError::Fatal(anyhow!("HTTP 401: bad key"))),
            Ok("{}".to_string()),
        ]);
        let err = invoke_extraction(&backend, &policy(&[10, 10, 10]), "P").unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(err.to_string().contains("401"));
        assert_eq!(backend.prompts.borrow().len(), 1);
    }

    #[test]
    fn exhausted_attempts_report_last_error_and_response() {
        let backend = ScriptedBackend::new(vec![
            Ok("not json".to_string()),
            Err(CallError::Retryable(anyhow!("connection reset"))),
        ]);
        let err = invoke_extraction(&backend, &policy(&[10, 10]), "P").unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(err.last_response.as_deref(), Some("not json"));
    }

    #[test]
    fn retry_prompt_truncates_long_previous_response() {
        let previous = "x".repeat(5000);
        let prompt = build_retry_prompt("TASK", "bad json", &previous);
        assert!(prompt.contains("...(truncated)"));
        assert!(prompt.len() < 3000);
        assert!(prompt.contains("bad json"));
    }

    #[test]
    fn policy_from_config_maps_seconds_and_delay() {
        let config = crate::config::default_config();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.timeouts[0], Duration::from_secs(120));
        assert_eq!(policy.delay, Duration::from_millis(2000));
    }
}
