// OpenAI-compatible chat and transcription client.
//
// Three calls are made against `{base_url}`:
// - `POST /chat/completions` returning one complete message,
// - the same endpoint with `stream: true`, parsed from server-sent events
//   into `LlmEvent`s forwarded over an mpsc channel,
// - `POST /audio/transcriptions` with a multipart audio upload.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use farmai_core::config::Config;

use crate::events::LlmEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM not configured (no API key)")]
    Disabled,

    #[error("network error: {0}")]
    Http(String),

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("LLM returned empty response")]
    EmptyResponse,

    #[error("failed to read audio file {path}: {message}")]
    Audio { path: String, message: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything needed to talk to the API, lifted out of `Config`.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub transcription_model: String,
    pub transcription_language: String,
}

impl ChatSettings {
    /// `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let key = config
            .credentials
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())?;
        Some(Self {
            base_url: config.llm.base_url.clone(),
            api_key: key.to_string(),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.timeout_secs),
            transcription_model: config.transcription.model.clone(),
            transcription_language: config.transcription.language.clone(),
        })
    }
}

/// Result of an audio upload. A non-2xx reply is reported here rather than
/// as an error so the interview screen can show it inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub success: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

pub struct ChatClient {
    http: reqwest::Client,
    settings: ChatSettings,
}

impl ChatClient {
    pub fn new(settings: ChatSettings) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("failed to build tuned HTTP client, using defaults: {e}");
                reqwest::Client::new()
            });
        Self { http, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn chat_body(&self, system: &str, user: &str, max_tokens: u32, stream: bool) -> Value {
        let mut body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": self.settings.temperature,
            "max_tokens": max_tokens,
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }

    /// Send one chat request and return `choices[0].message.content`.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        debug!(model = %self.settings.model, max_tokens, "chat completion request");
        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(&self.chat_body(system, user, max_tokens, false))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson(e.to_string()))?;
        match parse_completion_content(&value) {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    /// Stream a chat response as `LlmEvent`s over `tx`.
    ///
    /// Returns when the stream completes, fails, or the receiver is dropped.
    /// Failures are reported as `LlmEvent::Error`, never as a return value.
    pub async fn stream_chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) {
        let request = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&self.chat_body(system, user, max_tokens, true));

        let mut es = match request.eventsource() {
            Ok(es) => es,
            Err(e) => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: format!("Failed to create event source: {e}"),
                        generation,
                    })
                    .await;
                return;
            }
        };

        let mut full_text = String::new();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("SSE connection opened"),
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        es.close();
                        let _ = tx
                            .send(LlmEvent::Complete {
                                full_text,
                                generation,
                            })
                            .await;
                        return;
                    }
                    if let Some(text) = parse_stream_delta(&msg.data) {
                        if text.is_empty() {
                            continue;
                        }
                        full_text.push_str(&text);
                        if tx.send(LlmEvent::Token { text, generation }).await.is_err() {
                            es.close();
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    es.close();
                    let _ = tx
                        .send(LlmEvent::Error {
                            message: stream_error_message(&err),
                            generation,
                        })
                        .await;
                    return;
                }
            }
        }

        // Server closed without the [DONE] sentinel.
        let event = if full_text.is_empty() {
            LlmEvent::Error {
                message: "Stream ended unexpectedly without any content".to_string(),
                generation,
            }
        } else {
            LlmEvent::Complete {
                full_text,
                generation,
            }
        };
        let _ = tx.send(event).await;
    }

    /// Upload audio bytes for transcription.
    pub async fn transcribe_bytes(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<Transcription, LlmError> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio).file_name(file_name.to_string()),
            )
            .text("model", self.settings.transcription_model.clone())
            .text("language", self.settings.transcription_language.clone());

        let response = self
            .http
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .timeout(self.settings.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("error");
            warn!("transcription failed with {status}");
            return Ok(Transcription {
                text: String::new(),
                success: false,
                error: Some(format!("{} {reason}", status.as_u16())),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson(e.to_string()))?;
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(chars = text.chars().count(), "transcription complete");
        Ok(Transcription {
            text,
            success: true,
            error: None,
        })
    }

    /// Read an audio file and upload it. The upload's file name is taken
    /// from the path.
    pub async fn transcribe_file(&self, path: &Path) -> Result<Transcription, LlmError> {
        let audio = tokio::fs::read(path).await.map_err(|e| LlmError::Audio {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.transcribe_bytes(audio, &audio_file_name(path)).await
    }
}

/// Upload name for an audio path, `recording.wav` when it has none.
pub fn audio_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("recording.wav")
        .to_string()
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured client or a disabled placeholder when no API key is
/// available. Callers treat the disabled case like any failed request.
pub enum LlmClient {
    Active(ChatClient),
    Disabled,
}

impl LlmClient {
    pub fn from_config(config: &Config) -> Self {
        match ChatSettings::from_config(config) {
            Some(settings) => LlmClient::Active(ChatClient::new(settings)),
            None => LlmClient::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            LlmClient::Active(client) => Some(client.model()),
            LlmClient::Disabled => None,
        }
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        match self {
            LlmClient::Active(client) => client.complete(system, user, max_tokens).await,
            LlmClient::Disabled => Err(LlmError::Disabled),
        }
    }

    pub async fn stream_chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) {
        match self {
            LlmClient::Active(client) => {
                client
                    .stream_chat(system, user, max_tokens, tx, generation)
                    .await
            }
            LlmClient::Disabled => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: LlmError::Disabled.to_string(),
                        generation,
                    })
                    .await;
            }
        }
    }

    pub async fn transcribe_file(&self, path: &Path) -> Result<Transcription, LlmError> {
        match self {
            LlmClient::Active(client) => client.transcribe_file(path).await,
            LlmClient::Disabled => Err(LlmError::Disabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing helpers
// ---------------------------------------------------------------------------

/// `choices[0].message.content` of a non-streaming response.
pub(crate) fn parse_completion_content(value: &Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `choices[0].delta.content` of a streaming chunk.
pub(crate) fn parse_stream_delta(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `error.message` from an error body, or the body itself.
fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn stream_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("Network error: {e}"),
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_content_path() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(parse_completion_content(&v), Some("hi".to_string()));
        assert_eq!(parse_completion_content(&json!({"choices": []})), None);
        assert_eq!(parse_completion_content(&json!({})), None);
    }

    #[test]
    fn stream_delta_path() {
        let data = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_stream_delta(data), Some("Hel".to_string()));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_delta(role_only), None);
        assert_eq!(parse_stream_delta("[DONE]"), None);
    }

    #[test]
    fn error_body_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message_from_body(body), "Incorrect API key provided");
        assert_eq!(error_message_from_body(" gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn audio_name_from_path() {
        assert_eq!(audio_file_name(Path::new("/tmp/answer-3.m4a")), "answer-3.m4a");
        assert_eq!(audio_file_name(Path::new("/")), "recording.wav");
    }

    #[tokio::test]
    async fn disabled_client_reports_error_event() {
        let client = LlmClient::Disabled;
        let (tx, mut rx) = mpsc::channel(4);
        client.stream_chat("s", "u", 10, tx, 3).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            LlmEvent::Error {
                message: "LLM not configured (no API key)".to_string(),
                generation: 3,
            }
        );
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            client.complete("s", "u", 10).await,
            Err(LlmError::Disabled)
        ));
    }
}
