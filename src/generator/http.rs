//! HTTP generator client.
//!
//! Talks to the model service's generation endpoint: a multipart POST
//! carrying the prompt as a MIDI file plus a JSON metadata part. The
//! response's content type decides the decoding path, either a single MIDI
//! binary or an archive batching several results with optional per-result
//! diagnostics.

use super::{GenerateRequest, Generator, GeneratorReply};
use crate::error::EngineError;
use crate::score::{decode_midi, encode_midi};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::io::{Cursor, Read};
use tracing::{debug, info};

/// Generation request metadata, serialized as the `meta_json` part.
///
/// Field names are the model service's wire format.
#[derive(Debug, Serialize)]
struct GenerationMeta {
    model_type: String,
    program: Vec<String>,
    tempo: u32,
    task: String,
    p: f64,
    temperature: f64,
    split_measure: u32,
    key: String,
    num_gems: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_continue_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genfield_measure: Option<u32>,
}

impl GenerationMeta {
    fn from_request(request: &GenerateRequest) -> Self {
        Self {
            model_type: request.model.clone(),
            program: request.instruments.clone(),
            tempo: request.prompt.tempo_bpm.round() as u32,
            task: request.task.clone(),
            p: request.sampling.top_p,
            temperature: request.sampling.temperature,
            split_measure: 99,
            key: request.key.clone(),
            num_gems: request.num_variants,
            ai_continue_mode: request.continuation.map(|_| true),
            generate_count: request.continuation.map(|w| w.extension_measures),
            genfield_measure: request.continuation.map(|w| w.extension_measures),
        }
    }
}

/// Client for an HTTP model service.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerator {
    /// Creates a client for the service at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Creates a client reusing an existing connection pool.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GeneratorReply, EngineError> {
        let midi_bytes = encode_midi(&request.prompt);
        let meta = GenerationMeta::from_request(&request);
        let meta_bytes =
            serde_json::to_vec_pretty(&meta).map_err(|e| EngineError::Network(e.to_string()))?;

        debug!(
            model = %request.model,
            variants = request.num_variants,
            continuation = request.continuation.is_some(),
            prompt_bytes = midi_bytes.len(),
            "sending generation request"
        );

        let form = Form::new()
            .part(
                "midi",
                Part::bytes(midi_bytes)
                    .file_name("input.mid")
                    .mime_str("audio/midi")
                    .map_err(|e| EngineError::Network(e.to_string()))?,
            )
            .part(
                "meta_json",
                Part::bytes(meta_bytes)
                    .file_name("meta.json")
                    .mime_str("application/json")
                    .map_err(|e| EngineError::Network(e.to_string()))?,
            );

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_detail(&body).unwrap_or(body);
            let message = if detail.is_empty() {
                status.to_string()
            } else {
                detail
            };
            return Err(EngineError::Network(message));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let reply = decode_reply(&content_type, &body)?;
        if let GeneratorReply::Segments(segments) = &reply {
            info!(count = segments.len(), "generation returned segments");
        }
        Ok(reply)
    }
}

/// Pulls the `detail` field out of a JSON error body, if there is one.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Dispatches response decoding on the content type.
fn decode_reply(content_type: &str, body: &[u8]) -> Result<GeneratorReply, EngineError> {
    if content_type.contains("application/zip") {
        return decode_batch(body);
    }

    if content_type.contains("audio/midi") || content_type.contains("application/x-midi") {
        let timeline = decode_midi(body, "Generated")?;
        return Ok(GeneratorReply::Segments(vec![timeline]));
    }

    // Unknown content type: a best-effort MIDI parse before giving up.
    match decode_midi(body, "Generated") {
        Ok(timeline) => Ok(GeneratorReply::Segments(vec![timeline])),
        Err(_) => Err(EngineError::Parse(format!(
            "unknown response format: {}",
            if content_type.is_empty() {
                "(no content type)"
            } else {
                content_type
            }
        ))),
    }
}

/// Decodes a batch archive: `.mid` entries become segments, `.json` entries
/// are textual diagnostics. Diagnostics take precedence over note data;
/// they are the service telling the user something went sideways.
fn decode_batch(body: &[u8]) -> Result<GeneratorReply, EngineError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(body))
        .map_err(|e| EngineError::Parse(format!("bad result archive: {e}")))?;

    let mut segments = Vec::new();
    let mut diagnostics = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| EngineError::Parse(format!("bad archive entry: {e}")))?;
        let name = entry.name().to_string();

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| EngineError::Parse(format!("unreadable archive entry {name}: {e}")))?;

        if name.ends_with(".mid") {
            segments.push(decode_midi(&data, name)?);
        } else if name.ends_with(".json") {
            diagnostics.push(String::from_utf8_lossy(&data).into_owned());
        }
    }

    if !diagnostics.is_empty() {
        Ok(GeneratorReply::Diagnostic(diagnostics.join("\n")))
    } else if !segments.is_empty() {
        Ok(GeneratorReply::Segments(segments))
    } else {
        Ok(GeneratorReply::Empty)
    }
}
