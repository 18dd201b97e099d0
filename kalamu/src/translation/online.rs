use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::OnlineTranslatorConfig;
use crate::error::{KalamuError, Result};
use crate::language::LanguageCode;

use super::types::{TranslationRequest, TranslationResult, Translator};

/// Largest text the service accepts in one request.
pub const MAX_CHARS_PER_REQUEST: usize = 5000;

const TRANSLATE_PATH: &str = "/translate_a/single";

/// Public web translation service with automatic source detection.
///
/// One attempt per chunk, no retries. Any failure surfaces as
/// [`KalamuError::TranslationService`].
#[derive(Clone)]
pub struct OnlineTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl OnlineTranslator {
    pub fn new(config: &OnlineTranslatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                KalamuError::TranslationService(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn translate_text(&self, text: &str, target: &LanguageCode) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let chunks = split_for_service(text, MAX_CHARS_PER_REQUEST);
        let mut translated = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !chunk.continues_line {
                translated.push('\n');
            }
            translated.push_str(&self.request(&chunk.text, target).await?);
        }

        debug!(target = %target, chunks = chunks.len(), "Online translation finished");
        Ok(translated)
    }

    async fn request(&self, text: &str, target: &LanguageCode) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{TRANSLATE_PATH}", self.base_url))
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| KalamuError::TranslationService(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KalamuError::TranslationService(format!(
                "Service returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| KalamuError::TranslationService(format!("Malformed response: {e}")))?;

        parse_segments(&body)
    }
}

/// The first element of the response lists `[translated, original, ...]`
/// segments; the translation is their concatenation.
fn parse_segments(body: &Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| KalamuError::TranslationService("Response has no segments".to_string()))?;

    Ok(segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect())
}

/// One request's worth of text.
#[derive(Debug, PartialEq)]
struct Chunk {
    text: String,
    /// Set on the second and later pieces of a cut line; those rejoin the
    /// previous piece without a line break.
    continues_line: bool,
}

impl Chunk {
    fn line(text: String) -> Self {
        Self {
            text,
            continues_line: false,
        }
    }
}

/// Split on line boundaries into chunks of at most `max_chars` characters.
/// Lines longer than that are cut at character boundaries.
fn split_for_service(text: &str, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.lines() {
        let line_chars = line.chars().count();

        if line_chars > max_chars {
            if !current.is_empty() {
                chunks.push(Chunk::line(std::mem::take(&mut current)));
                current_chars = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            chunks.extend(chars.chunks(max_chars).enumerate().map(|(index, piece)| Chunk {
                text: piece.iter().collect(),
                continues_line: index > 0,
            }));
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if current_chars + separator + line_chars > max_chars {
            chunks.push(Chunk::line(std::mem::take(&mut current)));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() {
        chunks.push(Chunk::line(current));
    }
    chunks
}

#[async_trait]
impl Translator for OnlineTranslator {
    fn name(&self) -> &'static str {
        "online"
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let text = self.translate_text(&request.text, &request.target).await?;
        Ok(TranslationResult::passthrough(text))
    }
}
