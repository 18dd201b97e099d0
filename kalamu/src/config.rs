use serde::Deserialize;
use std::env;

use crate::language::{OcrLanguage, TargetLanguage};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if val.trim().is_empty() => None,
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Directory holding `*.traineddata`; `None` lets Tesseract use its default.
    pub tessdata_path: Option<String>,
    pub language: OcrLanguage,
    pub timeout_secs: u64,
}

/// Image cleanup switches applied before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PreprocessConfig {
    pub to_grayscale: bool,
    pub denoise: bool,
    pub binarize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            to_grayscale: true,
            denoise: false,
            binarize: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub privacy_enabled: bool,
    pub target: TargetLanguage,
    pub offline: OfflineModelConfig,
    pub online: OnlineTranslatorConfig,
}

/// Where offline translation models come from and where they are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineModelConfig {
    pub cache_dir: String,
    pub registry_url: String,
    /// Registry owner serving ONNX exports of the catalog models.
    pub mirror_owner: Option<String>,
    pub fetch_timeout_secs: u64,
}

impl Default for OfflineModelConfig {
    fn default() -> Self {
        Self {
            cache_dir: ".kalamu_models".to_string(),
            registry_url: "https://huggingface.co".to_string(),
            mirror_owner: Some("Xenova".to_string()),
            fetch_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnlineTranslatorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OnlineTranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://translate.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let preprocess_defaults = PreprocessConfig::default();
        let offline_defaults = OfflineModelConfig::default();
        let online_defaults = OnlineTranslatorConfig::default();

        Self {
            ocr: OcrConfig {
                tessdata_path: parse_env_opt("OCR_TESSDATA_PATH"),
                language: parse_env_or("OCR_LANGUAGE", OcrLanguage::English),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
            },
            preprocess: PreprocessConfig {
                to_grayscale: parse_env_or("PREPROCESS_GRAYSCALE", preprocess_defaults.to_grayscale),
                denoise: parse_env_or("PREPROCESS_DENOISE", preprocess_defaults.denoise),
                binarize: parse_env_or("PREPROCESS_BINARIZE", preprocess_defaults.binarize),
            },
            translation: TranslationConfig {
                privacy_enabled: parse_env_or("PRIVACY_MODE", true),
                target: parse_env_or("TRANSLATION_TARGET", TargetLanguage::French),
                offline: OfflineModelConfig {
                    cache_dir: env::var("MODEL_CACHE_DIR").unwrap_or(offline_defaults.cache_dir),
                    registry_url: env::var("MODEL_REGISTRY_URL")
                        .unwrap_or(offline_defaults.registry_url),
                    mirror_owner: match env::var("MODEL_MIRROR_OWNER") {
                        Ok(owner) if owner.trim().is_empty() => None,
                        Ok(owner) => Some(owner.trim().to_string()),
                        Err(_) => offline_defaults.mirror_owner,
                    },
                    fetch_timeout_secs: parse_env_or(
                        "MODEL_FETCH_TIMEOUT",
                        offline_defaults.fetch_timeout_secs,
                    ),
                },
                online: OnlineTranslatorConfig {
                    base_url: env::var("ONLINE_TRANSLATE_URL").unwrap_or(online_defaults.base_url),
                    timeout_secs: parse_env_or(
                        "ONLINE_TRANSLATE_TIMEOUT",
                        online_defaults.timeout_secs,
                    ),
                },
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
