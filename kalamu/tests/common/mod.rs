#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};

use kalamu::error::{KalamuError, Result};
use kalamu::language::OcrLanguage;
use kalamu::ocr::{SegmentationMode, TextRecognizer};
use kalamu::translation::{
    Encoded, Generated, ModelHandle, ModelLoader, ResolvedModel, TokenizerHandle,
    TranslationRequest, TranslationResult, Translator,
};

/// White page with a few dark text-like bars, encoded as PNG.
pub fn letter_png() -> Vec<u8> {
    let mut page = RgbImage::from_pixel(120, 80, Rgb([245, 242, 235]));
    for row in [15u32, 35, 55] {
        for y in row..row + 6 {
            for x in 10..110 {
                page.put_pixel(x, y, Rgb([30, 30, 40]));
            }
        }
    }
    encode_png(&page)
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    bytes
}

/// Returns a fixed OCR output and records what it was given.
pub struct ScriptedRecognizer {
    output: std::result::Result<String, String>,
    pub calls: AtomicUsize,
    pub channels_seen: Mutex<Vec<u8>>,
}

impl ScriptedRecognizer {
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            output: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            channels_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            output: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            channels_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(
        &self,
        png: &[u8],
        _language: OcrLanguage,
        _mode: SegmentationMode,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded = image::load_from_memory(png)
            .map_err(|e| KalamuError::OcrEngine(format!("bad png: {e}")))?;
        self.channels_seen
            .lock()
            .unwrap()
            .push(decoded.color().channel_count());

        self.output.clone().map_err(KalamuError::OcrEngine)
    }
}

/// Translator double that tags its output and counts calls.
pub struct RecordingTranslator {
    tag: &'static str,
    failure: Option<String>,
    truncated: bool,
    pub requests: Mutex<Vec<TranslationRequest>>,
}

impl RecordingTranslator {
    pub fn new(tag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            failure: None,
            truncated: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(tag: &'static str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            failure: Some(reason.to_string()),
            truncated: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn truncating(tag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            failure: None,
            truncated: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Translator for RecordingTranslator {
    fn name(&self) -> &'static str {
        self.tag
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reason) = &self.failure {
            return Err(KalamuError::TranslationService(reason.clone()));
        }
        Ok(TranslationResult {
            text: format!("[{}] {}", request.target, request.text),
            used_model_identifier: None,
            truncated: self.truncated,
        })
    }
}

/// Character-level tokenizer: one id per byte.
pub struct ByteTokenizer;

impl TokenizerHandle for ByteTokenizer {
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Encoded> {
        let mut ids: Vec<u32> = text.bytes().map(u32::from).collect();
        let truncated = ids.len() > max_tokens;
        ids.truncate(max_tokens);
        Ok(Encoded { ids, truncated })
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let bytes: Vec<u8> = ids.iter().map(|&id| id as u8).collect();
        String::from_utf8(bytes).map_err(|e| KalamuError::TranslationUnavailable(e.to_string()))
    }
}

/// "Translates" by upper-casing ASCII letters.
pub struct UppercaseModel;

impl ModelHandle for UppercaseModel {
    fn generate(&self, input_ids: &[u32], _max_new_tokens: usize) -> Result<Generated> {
        Ok(Generated {
            ids: input_ids
                .iter()
                .map(|&id| (id as u8).to_ascii_uppercase() as u32)
                .collect(),
            hit_limit: false,
        })
    }
}

/// Loader that succeeds only for identifiers marked available and records
/// every attempt in order.
#[derive(Default)]
pub struct FakeLoader {
    available: Mutex<HashSet<String>>,
    pub attempts: Mutex<Vec<String>>,
}

impl FakeLoader {
    pub fn with_available(identifiers: &[&str]) -> Arc<Self> {
        let loader = Self::default();
        loader.make_available(identifiers);
        Arc::new(loader)
    }

    pub fn make_available(&self, identifiers: &[&str]) {
        let mut available = self.available.lock().unwrap();
        for id in identifiers {
            available.insert(id.to_string());
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelLoader for FakeLoader {
    async fn load(&self, identifier: &str) -> Result<ResolvedModel> {
        self.attempts.lock().unwrap().push(identifier.to_string());
        if self.available.lock().unwrap().contains(identifier) {
            Ok(ResolvedModel::new(
                identifier,
                Arc::new(ByteTokenizer),
                Arc::new(UppercaseModel),
            ))
        } else {
            Err(KalamuError::TranslationUnavailable(format!(
                "{identifier} not found"
            )))
        }
    }
}
