use async_trait::async_trait;
use tracing::debug;

use crate::error::{KalamuError, Result};
use crate::language::LanguageCode;

use super::catalog::is_multi_target;
use super::resolver::ModelResolver;
use super::types::{TranslationRequest, TranslationResult, Translator};

/// Longest source sequence fed to the encoder, end-of-sequence included.
pub const MAX_INPUT_TOKENS: usize = 512;

/// Generation budget per document.
pub const MAX_NEW_TOKENS: usize = 1024;

/// Translates with locally loaded models only. Never touches the network
/// except to fetch model files on first use of a pair.
#[derive(Clone)]
pub struct OfflineTranslator {
    resolver: ModelResolver,
}

impl OfflineTranslator {
    pub fn new(resolver: ModelResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    pub async fn translate_text(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<TranslationResult> {
        if text.trim().is_empty() || source == target {
            return Ok(TranslationResult::passthrough(text));
        }

        let model = self.resolver.resolve(source, target).await?;
        let input = if is_multi_target(model.identifier()) {
            format!(">>{target}<< {text}")
        } else {
            text.to_string()
        };

        let result = tokio::task::spawn_blocking(move || -> Result<TranslationResult> {
            let encoded = model.tokenizer().encode(&input, MAX_INPUT_TOKENS)?;
            let generated = model.model().generate(&encoded.ids, MAX_NEW_TOKENS)?;
            let text = model.tokenizer().decode(&generated.ids)?;

            Ok(TranslationResult {
                text: text.trim().to_string(),
                used_model_identifier: Some(model.identifier().to_string()),
                truncated: encoded.truncated || generated.hit_limit,
            })
        })
        .await
        .map_err(|e| KalamuError::Internal(format!("Translation task panicked: {e}")))?
        .map_err(|e| match e {
            KalamuError::TranslationUnavailable(_) | KalamuError::Internal(_) => e,
            other => KalamuError::TranslationUnavailable(other.to_string()),
        })?;

        debug!(
            source = %source,
            target = %target,
            model = result.used_model_identifier.as_deref().unwrap_or_default(),
            truncated = result.truncated,
            "Offline translation finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl Translator for OfflineTranslator {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        self.translate_text(&request.text, &request.source, &request.target)
            .await
    }
}
