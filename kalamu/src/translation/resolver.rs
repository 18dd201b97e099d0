use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{KalamuError, Result};
use crate::language::{LanguageCode, LanguagePair};

use super::catalog::ModelCatalog;
use super::types::ResolvedModel;

/// Fetches and loads one model by registry identifier.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, identifier: &str) -> Result<ResolvedModel>;
}

/// Loaded models keyed by language pair, shared by every resolver clone.
///
/// Entries are never replaced: when two requests load the same pair
/// concurrently the first insert wins and both get that model.
#[derive(Clone, Default)]
pub struct ModelCache {
    entries: Arc<RwLock<HashMap<LanguagePair, ResolvedModel>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pair: &LanguagePair) -> Result<Option<ResolvedModel>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| KalamuError::Internal(format!("Model cache lock poisoned: {e}")))?;
        Ok(entries.get(pair).cloned())
    }

    /// Insert unless the pair is already cached; returns the cached model.
    pub fn insert_if_absent(&self, pair: LanguagePair, model: ResolvedModel) -> Result<ResolvedModel> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| KalamuError::Internal(format!("Model cache lock poisoned: {e}")))?;
        Ok(entries.entry(pair).or_insert(model).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maps a language pair to a loaded model, walking the catalog's candidates
/// until one loads.
#[derive(Clone)]
pub struct ModelResolver {
    catalog: Arc<ModelCatalog>,
    cache: ModelCache,
    loader: Arc<dyn ModelLoader>,
}

impl ModelResolver {
    pub fn new(catalog: ModelCatalog, cache: ModelCache, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            cache,
            loader,
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub async fn resolve(&self, source: &LanguageCode, target: &LanguageCode) -> Result<ResolvedModel> {
        let pair = LanguagePair::new(source.clone(), target.clone());

        if let Some(model) = self.cache.get(&pair)? {
            debug!(pair = %pair, model = model.identifier(), "Model cache hit");
            return Ok(model);
        }

        let mut tried = Vec::new();
        for identifier in self.catalog.candidates(&pair) {
            tried.push(identifier.clone());

            match self.loader.load(&identifier).await {
                Ok(model) => {
                    info!(pair = %pair, model = %identifier, "Offline model loaded");
                    return self.cache.insert_if_absent(pair, model);
                }
                Err(e) => {
                    debug!(pair = %pair, model = %identifier, error = %e, "Model candidate failed");
                }
            }
        }

        Err(KalamuError::ModelUnavailable {
            source_lang: pair.source.to_string(),
            target_lang: pair.target.to_string(),
            tried,
        })
    }
}
