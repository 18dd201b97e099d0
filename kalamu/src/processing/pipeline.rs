use std::fmt;

use tracing::{info, warn};

use crate::config::PreprocessConfig;
use crate::error::{KalamuError, Result};
use crate::language::OcrLanguage;
use crate::ocr::{decode_image, enhance, OcrAdapter};
use crate::session::{wipe_bytes, LoadedDocument, Session};
use crate::translation::{ModeController, TranslationSettings};

/// Settings for one upload.
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest {
    pub ocr_language: OcrLanguage,
    pub preprocess: PreprocessConfig,
    pub settings: TranslationSettings,
}

/// User-facing notice for a stage that degraded to an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    OcrFailed(String),
    NoTextDetected,
    TranslationFailed(String),
    TranslationTruncated,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OcrFailed(reason) => write!(
                f,
                "Text recognition failed ({reason}). Try another OCR language or preprocessing settings."
            ),
            Diagnostic::NoTextDetected => write!(f, "No text detected in the image."),
            Diagnostic::TranslationFailed(reason) => write!(f, "Translation failed: {reason}"),
            Diagnostic::TranslationTruncated => write!(
                f,
                "The text was too long to translate in full; the translation covers only its beginning."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub ocr_succeeded: bool,
    /// Name of the translator that ran, if translation was attempted.
    pub translator: Option<&'static str>,
    pub used_model_identifier: Option<String>,
    /// At most one, since every failure ends the run.
    pub diagnostic: Option<Diagnostic>,
}

/// decode, preprocess, OCR, translate, store.
#[derive(Clone)]
pub struct DocumentPipeline {
    ocr: OcrAdapter,
    translation: ModeController,
}

impl DocumentPipeline {
    pub fn new(ocr: OcrAdapter, translation: ModeController) -> Self {
        Self { ocr, translation }
    }

    /// Run one upload through every stage and store the result in `session`.
    ///
    /// Only an undecodable image is an error; OCR and translation failures
    /// come back as a [`Diagnostic`] with the affected text left empty.
    pub async fn process(
        &self,
        session: &mut Session,
        mut upload: Vec<u8>,
        request: &PipelineRequest,
    ) -> Result<PipelineReport> {
        session.clear();

        let image = match decode_image(&upload) {
            Ok(image) => image,
            Err(e) => {
                wipe_bytes(&mut upload);
                return Err(e);
            }
        };
        info!(
            width = image.width(),
            height = image.height(),
            bytes = upload.len(),
            "Document decoded"
        );

        let preprocess = request.preprocess;
        let (image, prepared) = tokio::task::spawn_blocking(move || {
            let prepared = enhance(&image, &preprocess);
            (image, prepared)
        })
        .await
        .map_err(|e| KalamuError::Processing(format!("Preprocessing task panicked: {e}")))?;

        let ocr = self.ocr.recognize(&prepared, request.ocr_language).await;

        let mut report = PipelineReport {
            ocr_succeeded: ocr.succeeded,
            translator: None,
            used_model_identifier: None,
            diagnostic: None,
        };
        let mut translated_text = String::new();

        if !ocr.succeeded {
            report.diagnostic = Some(Diagnostic::OcrFailed(
                ocr.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            ));
        } else if !ocr.has_text() {
            report.diagnostic = Some(Diagnostic::NoTextDetected);
        } else {
            match self.translation.translator_for(&request.settings) {
                Ok(translator) => report.translator = Some(translator.name()),
                Err(e) => warn!(error = %e, "No translator for current settings"),
            }

            match self
                .translation
                .translate(&ocr.text, request.ocr_language.iso2(), &request.settings)
                .await
            {
                Ok(result) => {
                    if result.truncated {
                        report.diagnostic = Some(Diagnostic::TranslationTruncated);
                    }
                    report.used_model_identifier = result.used_model_identifier;
                    translated_text = result.text;
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(error = %e, "Translation failed");
                    } else {
                        warn!(error = %e, "Translation rejected");
                    }
                    report.diagnostic = Some(Diagnostic::TranslationFailed(e.to_string()));
                }
            }
        }

        info!(
            ocr_succeeded = report.ocr_succeeded,
            ocr_chars = ocr.text.chars().count(),
            translated_chars = translated_text.chars().count(),
            translator = report.translator.unwrap_or("none"),
            "Document processed"
        );

        session.load(LoadedDocument {
            upload,
            image,
            prepared,
            ocr_text: ocr.text,
            translated_text,
            used_model_identifier: report.used_model_identifier.clone(),
        });

        Ok(report)
    }
}
