use thiserror::Error;

#[derive(Error, Debug)]
pub enum KalamuError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("OCR engine error: {0}")]
    OcrEngine(String),

    #[error(
        "No offline model available for {source_lang}->{target_lang}. Tried: {}",
        tried.join(", ")
    )]
    ModelUnavailable {
        source_lang: String,
        target_lang: String,
        tried: Vec<String>,
    },

    #[error("Offline translation unavailable: {0}")]
    TranslationUnavailable(String),

    #[error("Translation service error: {0}")]
    TranslationService(String),

    #[error("Target language '{0}' is only available online and cannot be used in privacy mode")]
    PrivacyRestrictedTarget(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KalamuError {
    /// Errors the pipeline degrades to an empty result plus a diagnostic.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KalamuError::OcrEngine(_)
                | KalamuError::ModelUnavailable { .. }
                | KalamuError::TranslationUnavailable(_)
                | KalamuError::TranslationService(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, KalamuError>;
