//! Completion backends: HTTP chat API and local command.
use crate::config::ResolvedBackend;
use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Outcome classification for a single backend call.
#[derive(Debug)]
pub enum CallError {
    /// Timeouts, transport errors, throttling and server errors.
    Retryable(anyhow::Error),
    /// Problems another attempt cannot fix.
    Fatal(anyhow::Error),
}

impl CallError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn into_inner(self) -> anyhow::Error {
        match self {
            Self::Retryable(err) | Self::Fatal(err) => err,
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retryable(err) => write!(f, "{err:#}"),
            Self::Fatal(err) => write!(f, "{err:#} (not retried)"),
        }
    }
}

impl std::error::Error for CallError {}

/// One prompt in, one response text out, bounded by `timeout`.
pub trait CompletionBackend {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CallError>;

    /// Short description for logs and status output.
    fn describe(&self) -> String;
}

/// Build the backend selected by the resolved config.
pub fn build_backend(resolved: &ResolvedBackend) -> Box<dyn CompletionBackend> {
    match resolved {
        ResolvedBackend::Http {
            base_url,
            model,
            api_key_env,
            api_key,
            ..
        } => Box::new(HttpBackend {
            base_url: base_url.clone(),
            model: model.clone(),
            api_key_env: api_key_env.clone(),
            api_key: api_key.clone(),
        }),
        ResolvedBackend::Command { command } => Box::new(CommandBackend {
            command: command.clone(),
        }),
    }
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct HttpBackend {
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl CompletionBackend for HttpBackend {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CallError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CallError::Fatal(anyhow!("API key missing: set {}", self.api_key_env))
        })?;
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [ { "role": "user", "content": prompt } ],
        });
        let url = format!("{}/v1/chat/completions", self.base_url);
        let value = post_json(&url, api_key, &body, timeout)?;
        message_content(&value).ok_or_else(|| {
            CallError::Retryable(anyhow!("chat response has no choices[0].message.content"))
        })
    }

    fn describe(&self) -> String {
        format!("http {} @ {}", self.model, self.base_url)
    }
}

fn message_content(value: &Value) -> Option<String> {
    let content = value.pointer("/choices/0/message/content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(chunks) => {
            let text: String = chunks
                .iter()
                .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

/// POST a JSON body with bearer auth and classify the outcome.
pub(crate) fn post_json(
    url: &str,
    api_key: &str,
    body: &Value,
    timeout: Duration,
) -> Result<Value, CallError> {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let start = Instant::now();
    let mut response = match agent
        .post(url)
        .header("Authorization", &format!("Bearer {api_key}"))
        .header("Accept", "application/json")
        .send_json(body)
    {
        Ok(response) => response,
        Err(ureq::Error::Timeout(_)) => {
            return Err(CallError::Retryable(anyhow!(
                "request to {url} timed out after {}s",
                timeout.as_secs()
            )))
        }
        Err(err) => {
            return Err(CallError::Retryable(
                anyhow!(err).context(format!("POST {url}")),
            ))
        }
    };
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|err| CallError::Retryable(anyhow!(err).context("read response body")))?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        status,
        response_bytes = text.len(),
        "http call complete"
    );

    if !(200..300).contains(&status) {
        return Err(classify_status(status, &text));
    }
    serde_json::from_str(&text)
        .context("decode response JSON")
        .map_err(CallError::Retryable)
}

fn classify_status(status: u16, body: &str) -> CallError {
    let snippet = crate::util::truncate_string(body.trim(), 300);
    let err = anyhow!("HTTP {status}: {snippet}");
    if status == 429 || status >= 500 {
        CallError::Retryable(err)
    } else {
        CallError::Fatal(err)
    }
}

/// Local command reading the prompt from stdin.
pub struct CommandBackend {
    command: String,
}

impl CompletionBackend for CommandBackend {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CallError> {
        let args = shell_words::split(&self.command)
            .with_context(|| format!("parse LM command: {}", self.command))
            .map_err(CallError::Fatal)?;
        if args.is_empty() {
            return Err(CallError::Fatal(anyhow!("LM command is empty")));
        }

        let start = Instant::now();
        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {}", args[0]))
            .map_err(CallError::Fatal)?;

        // Pipes are drained on their own threads so a large prompt or response
        // cannot block the child before the deadline check runs.
        let stdin = child.stdin.take();
        let prompt_bytes = prompt.as_bytes().to_vec();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&prompt_bytes);
            }
        });
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let deadline = start + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = writer.join();
                    return Err(CallError::Retryable(anyhow!(
                        "LM command timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(err) => {
                    return Err(CallError::Retryable(
                        anyhow!(err).context("wait for LM command"),
                    ))
                }
            }
        };
        let _ = writer.join();
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = stdout.len(),
            "lm invoke complete"
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(CallError::Retryable(anyhow!(
                "LM command failed with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        String::from_utf8(stdout)
            .context("decode LM stdout as UTF-8")
            .map_err(CallError::Retryable)
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}
