use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::ocr::OcrAdapter;
use crate::processing::{DocumentPipeline, PipelineRequest};
use crate::translation::{
    MarianLoader, ModeController, ModelCache, ModelCatalog, ModelResolver, OfflineTranslator,
    OnlineTranslator, TranslationSettings, Translator,
};

/// Long-lived service context. Owns the process-wide model cache through
/// the offline translator; sessions are owned by the caller.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: DocumentPipeline,
}

impl AppState {
    pub fn new(
        config: Config,
        ocr: OcrAdapter,
        offline: Arc<dyn Translator>,
        online: Arc<dyn Translator>,
    ) -> Self {
        let pipeline = DocumentPipeline::new(ocr, ModeController::new(offline, online));
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// Wire the Tesseract, Marian and web translation backends.
    pub fn from_config(config: Config) -> Result<Self> {
        let ocr = OcrAdapter::new(&config.ocr);

        let loader = Arc::new(MarianLoader::new(&config.translation.offline)?);
        let resolver = ModelResolver::new(ModelCatalog::builtin(), ModelCache::new(), loader);
        let offline = Arc::new(OfflineTranslator::new(resolver));
        let online = Arc::new(OnlineTranslator::new(&config.translation.online)?);

        Ok(Self::new(config, ocr, offline, online))
    }

    /// Request built from configuration alone. Fails when privacy mode is on
    /// and the configured target is online-only.
    pub fn default_request(&self) -> Result<PipelineRequest> {
        Ok(PipelineRequest {
            ocr_language: self.config.ocr.language,
            preprocess: self.config.preprocess,
            settings: TranslationSettings::new(
                self.config.translation.privacy_enabled,
                self.config.translation.target,
            )?,
        })
    }
}
