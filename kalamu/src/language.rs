//! Language codes for the OCR and translation stages.
//!
//! Tesseract names languages with ISO 639-2 codes (`eng`), translation
//! models and services with ISO 639-1 codes (`en`). `OcrLanguage` carries
//! both so the OCR setting doubles as the translation source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KalamuError;

/// A normalized (trimmed, lower-cased) ISO 639-1 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Lookup key for offline model resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl LanguagePair {
    pub fn new(source: impl Into<LanguageCode>, target: impl Into<LanguageCode>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Language printed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrLanguage {
    English,
    French,
    Portuguese,
    Swahili,
}

impl OcrLanguage {
    pub const ALL: [OcrLanguage; 4] = [
        OcrLanguage::English,
        OcrLanguage::French,
        OcrLanguage::Portuguese,
        OcrLanguage::Swahili,
    ];

    /// Tesseract traineddata name.
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            OcrLanguage::English => "eng",
            OcrLanguage::French => "fra",
            OcrLanguage::Portuguese => "por",
            OcrLanguage::Swahili => "swa",
        }
    }

    pub fn iso2(&self) -> LanguageCode {
        LanguageCode::new(match self {
            OcrLanguage::English => "en",
            OcrLanguage::French => "fr",
            OcrLanguage::Portuguese => "pt",
            OcrLanguage::Swahili => "sw",
        })
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OcrLanguage::English => "English",
            OcrLanguage::French => "French",
            OcrLanguage::Portuguese => "Portuguese",
            OcrLanguage::Swahili => "Swahili",
        }
    }
}

impl FromStr for OcrLanguage {
    type Err = KalamuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eng" | "en" | "english" => Ok(OcrLanguage::English),
            "fra" | "fr" | "french" => Ok(OcrLanguage::French),
            "por" | "pt" | "portuguese" => Ok(OcrLanguage::Portuguese),
            "swa" | "sw" | "swahili" => Ok(OcrLanguage::Swahili),
            other => Err(KalamuError::Validation(format!(
                "Unsupported OCR language: {other}. Supported: eng, fra, por, swa"
            ))),
        }
    }
}

impl fmt::Display for OcrLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.tesseract_code())
    }
}

/// Language to translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    English,
    French,
    Portuguese,
    Swahili,
    /// Reachable only through the online translation service.
    Lingala,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 5] = [
        TargetLanguage::English,
        TargetLanguage::French,
        TargetLanguage::Portuguese,
        TargetLanguage::Swahili,
        TargetLanguage::Lingala,
    ];

    pub fn iso2(&self) -> LanguageCode {
        LanguageCode::new(match self {
            TargetLanguage::English => "en",
            TargetLanguage::French => "fr",
            TargetLanguage::Portuguese => "pt",
            TargetLanguage::Swahili => "sw",
            TargetLanguage::Lingala => "ln",
        })
    }

    pub fn is_offline_supported(&self) -> bool {
        !matches!(self, TargetLanguage::Lingala)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::English => "English",
            TargetLanguage::French => "French / Français",
            TargetLanguage::Portuguese => "Portuguese / Português",
            TargetLanguage::Swahili => "Swahili / Kiswahili",
            TargetLanguage::Lingala => "Lingala",
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = KalamuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(TargetLanguage::English),
            "fr" | "fra" | "french" => Ok(TargetLanguage::French),
            "pt" | "por" | "portuguese" => Ok(TargetLanguage::Portuguese),
            "sw" | "swa" | "swahili" => Ok(TargetLanguage::Swahili),
            "ln" | "lin" | "lingala" => Ok(TargetLanguage::Lingala),
            other => Err(KalamuError::Validation(format!(
                "Unsupported target language: {other}. Supported: en, fr, pt, sw, ln"
            ))),
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Targets a caller may pick from. Privacy mode hides online-only targets.
pub fn selectable_targets(privacy_enabled: bool) -> Vec<TargetLanguage> {
    TargetLanguage::ALL
        .into_iter()
        .filter(|target| !privacy_enabled || target.is_offline_supported())
        .collect()
}
