use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leptess::{LepTess, Variable};
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::{KalamuError, Result};
use crate::language::OcrLanguage;

use super::preprocessing::PreparedImage;

/// Tesseract page segmentation modes used by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Fully automatic page segmentation.
    Auto,
    /// A single uniform block of text: whole paragraphs, as on a letter.
    SingleBlock,
}

impl SegmentationMode {
    pub fn tesseract_value(&self) -> &'static str {
        match self {
            SegmentationMode::Auto => "3",
            SegmentationMode::SingleBlock => "6",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrResult {
    pub text: String,
    /// `false` means the engine failed; `true` with empty text means no text
    /// was found on the page.
    pub succeeded: bool,
    pub error: Option<String>,
}

impl OcrResult {
    pub fn recognized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            succeeded: false,
            error: Some(reason.into()),
        }
    }

    pub fn has_text(&self) -> bool {
        self.succeeded && !self.text.trim().is_empty()
    }
}

/// Boundary to the text recognition engine. Implementations block.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, png: &[u8], language: OcrLanguage, mode: SegmentationMode)
        -> Result<String>;
}

/// Tesseract via leptess, one engine per language created on first use.
///
/// `LepTess::new` initializes with the default engine mode, which picks the
/// best engine the installed traineddata supports.
pub struct TesseractRecognizer {
    tessdata_path: Option<String>,
    engines: Mutex<HashMap<OcrLanguage, LepTess>>,
}

impl TesseractRecognizer {
    pub fn new(tessdata_path: Option<String>) -> Self {
        Self {
            tessdata_path,
            engines: Mutex::new(HashMap::new()),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        png: &[u8],
        language: OcrLanguage,
        mode: SegmentationMode,
    ) -> Result<String> {
        let mut engines = self
            .engines
            .lock()
            .map_err(|e| KalamuError::Internal(format!("Tesseract lock poisoned: {e}")))?;

        if !engines.contains_key(&language) {
            let engine = LepTess::new(self.tessdata_path.as_deref(), language.tesseract_code())
                .map_err(|e| {
                    KalamuError::OcrEngine(format!(
                        "Tesseract could not load '{}' language data: {e}",
                        language.tesseract_code()
                    ))
                })?;
            info!(language = language.tesseract_code(), "Tesseract OCR initialized");
            engines.insert(language, engine);
        }

        let engine = engines
            .get_mut(&language)
            .ok_or_else(|| KalamuError::Internal("Tesseract engine missing".to_string()))?;

        engine
            .set_variable(Variable::TesseditPagesegMode, mode.tesseract_value())
            .map_err(|e| KalamuError::OcrEngine(format!("Failed to set segmentation mode: {e}")))?;
        engine
            .set_image_from_mem(png)
            .map_err(|e| KalamuError::OcrEngine(format!("Failed to set image: {e}")))?;
        engine
            .get_utf8_text()
            .map_err(|e| KalamuError::OcrEngine(format!("Failed to extract text: {e}")))
    }
}

/// Runs the recognizer off the async runtime and folds every failure into an
/// unsuccessful [`OcrResult`].
#[derive(Clone)]
pub struct OcrAdapter {
    recognizer: Arc<dyn TextRecognizer>,
    segmentation: SegmentationMode,
    timeout_secs: u64,
}

impl OcrAdapter {
    pub fn new(config: &OcrConfig) -> Self {
        Self::with_recognizer(
            Arc::new(TesseractRecognizer::new(config.tessdata_path.clone())),
            config.timeout_secs,
        )
    }

    pub fn with_recognizer(recognizer: Arc<dyn TextRecognizer>, timeout_secs: u64) -> Self {
        Self {
            recognizer,
            segmentation: SegmentationMode::SingleBlock,
            timeout_secs,
        }
    }

    pub fn segmentation(&self) -> SegmentationMode {
        self.segmentation
    }

    pub async fn recognize(&self, image: &PreparedImage, language: OcrLanguage) -> OcrResult {
        match self.recognize_internal(image, language).await {
            Ok(text) => {
                let text = text.trim().to_string();
                debug!(
                    language = language.tesseract_code(),
                    chars = text.chars().count(),
                    "OCR finished"
                );
                OcrResult::recognized(text)
            }
            Err(e) => {
                warn!(language = language.tesseract_code(), error = %e, "OCR failed");
                OcrResult::failed(e.to_string())
            }
        }
    }

    async fn recognize_internal(
        &self,
        image: &PreparedImage,
        language: OcrLanguage,
    ) -> Result<String> {
        let png = image.to_png()?;
        let recognizer = Arc::clone(&self.recognizer);
        let mode = self.segmentation;

        let task = tokio::task::spawn_blocking(move || recognizer.recognize(&png, language, mode));

        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), task).await {
            Ok(joined) => {
                joined.map_err(|e| KalamuError::OcrEngine(format!("OCR task panicked: {e}")))?
            }
            Err(_) => Err(KalamuError::OcrEngine(format!(
                "OCR operation timed out after {} seconds",
                self.timeout_secs
            ))),
        }
    }
}
