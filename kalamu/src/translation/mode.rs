use std::sync::Arc;

use tracing::debug;

use crate::error::{KalamuError, Result};
use crate::language::{LanguageCode, TargetLanguage};

use super::types::{TranslationRequest, TranslationResult, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationMode {
    Offline,
    Online,
}

/// Privacy flag plus target language. A privacy-enabled setting always
/// names an offline-supported target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationSettings {
    privacy_enabled: bool,
    target: TargetLanguage,
}

impl TranslationSettings {
    pub fn new(privacy_enabled: bool, target: TargetLanguage) -> Result<Self> {
        check_privacy_target(privacy_enabled, target)?;
        Ok(Self {
            privacy_enabled,
            target,
        })
    }

    pub fn privacy_enabled(&self) -> bool {
        self.privacy_enabled
    }

    pub fn target(&self) -> TargetLanguage {
        self.target
    }

    pub fn mode(&self) -> TranslationMode {
        if self.privacy_enabled {
            TranslationMode::Offline
        } else {
            TranslationMode::Online
        }
    }

    /// Switch the privacy flag. Turning privacy on while an online-only
    /// target is selected is rejected; pick another target first.
    pub fn with_privacy(self, privacy_enabled: bool) -> Result<Self> {
        Self::new(privacy_enabled, self.target)
    }

    pub fn with_target(self, target: TargetLanguage) -> Result<Self> {
        Self::new(self.privacy_enabled, target)
    }
}

fn check_privacy_target(privacy_enabled: bool, target: TargetLanguage) -> Result<()> {
    if privacy_enabled && !target.is_offline_supported() {
        return Err(KalamuError::PrivacyRestrictedTarget(
            target.display_name().to_string(),
        ));
    }
    Ok(())
}

/// Picks the translator for each request from the current settings. The
/// choice is made per call and never remembered.
#[derive(Clone)]
pub struct ModeController {
    offline: Arc<dyn Translator>,
    online: Arc<dyn Translator>,
}

impl ModeController {
    pub fn new(offline: Arc<dyn Translator>, online: Arc<dyn Translator>) -> Self {
        Self { offline, online }
    }

    pub fn translator_for(&self, settings: &TranslationSettings) -> Result<Arc<dyn Translator>> {
        check_privacy_target(settings.privacy_enabled, settings.target)?;

        Ok(match settings.mode() {
            TranslationMode::Offline => Arc::clone(&self.offline),
            TranslationMode::Online => Arc::clone(&self.online),
        })
    }

    pub async fn translate(
        &self,
        text: &str,
        source: LanguageCode,
        settings: &TranslationSettings,
    ) -> Result<TranslationResult> {
        let translator = self.translator_for(settings)?;
        debug!(
            translator = translator.name(),
            source = %source,
            target = %settings.target.iso2(),
            "Dispatching translation"
        );

        translator
            .translate(&TranslationRequest {
                text: text.to_string(),
                source,
                target: settings.target.iso2(),
            })
            .await
    }
}
