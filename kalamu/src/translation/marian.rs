//! MarianMT models exported to ONNX, fetched from a model registry on first
//! use and run locally with ONNX Runtime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::OfflineModelConfig;
use crate::error::{KalamuError, Result};

use super::resolver::ModelLoader;
use super::types::{Encoded, Generated, ModelHandle, ResolvedModel, TokenizerHandle};

/// Files making up one materialized model, relative to its directory.
pub const MODEL_FILES: [&str; 4] = [
    "config.json",
    "tokenizer.json",
    "onnx/encoder_model.onnx",
    "onnx/decoder_model.onnx",
];

const STAGING_SUFFIX: &str = ".partial";

fn runtime_error(e: impl std::fmt::Display) -> KalamuError {
    KalamuError::TranslationUnavailable(format!("ONNX runtime: {e}"))
}

/// Special token ids from the model's `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarianConfig {
    pub decoder_start_token_id: i64,
    pub eos_token_id: i64,
    pub pad_token_id: i64,
}

pub struct MarianTokenizer {
    tokenizer: tokenizers::Tokenizer,
    eos_token_id: u32,
}

impl MarianTokenizer {
    pub fn from_file(path: &Path, eos_token_id: u32) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            KalamuError::TranslationUnavailable(format!(
                "Failed to load tokenizer {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self {
            tokenizer,
            eos_token_id,
        })
    }
}

impl TokenizerHandle for MarianTokenizer {
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Encoded> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| KalamuError::TranslationUnavailable(format!("Tokenization failed: {e}")))?;

        let mut ids = encoding.get_ids().to_vec();
        if ids.last() != Some(&self.eos_token_id) {
            ids.push(self.eos_token_id);
        }

        let truncated = ids.len() > max_tokens;
        if truncated {
            ids.truncate(max_tokens.saturating_sub(1));
            ids.push(self.eos_token_id);
        }

        Ok(Encoded { ids, truncated })
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| KalamuError::TranslationUnavailable(format!("Detokenization failed: {e}")))
    }
}

/// Encoder and decoder sessions of one Marian model.
pub struct MarianOnnxModel {
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    config: MarianConfig,
}

impl MarianOnnxModel {
    pub fn load(dir: &Path, config: MarianConfig) -> Result<Self> {
        Ok(Self {
            encoder: Mutex::new(build_session(&dir.join("onnx/encoder_model.onnx"))?),
            decoder: Mutex::new(build_session(&dir.join("onnx/decoder_model.onnx"))?),
            config,
        })
    }

    fn encode(&self, input_ids: Vec<i64>, mask: Vec<i64>) -> Result<([usize; 3], Vec<f32>)> {
        let len = input_ids.len();
        let mut encoder = self
            .encoder
            .lock()
            .map_err(|e| KalamuError::Internal(format!("Encoder lock poisoned: {e}")))?;

        let outputs = encoder
            .run(ort::inputs![
                "input_ids" => Tensor::from_array(([1usize, len], input_ids)).map_err(runtime_error)?,
                "attention_mask" => Tensor::from_array(([1usize, len], mask)).map_err(runtime_error)?,
            ])
            .map_err(runtime_error)?;

        let (shape, hidden) = outputs["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(runtime_error)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 {
            return Err(runtime_error(format!("unexpected encoder output shape {dims:?}")));
        }

        Ok(([dims[0], dims[1], dims[2]], hidden.to_vec()))
    }
}

impl ModelHandle for MarianOnnxModel {
    /// Greedy decoding. The pad token is never emitted.
    fn generate(&self, input_ids: &[u32], max_new_tokens: usize) -> Result<Generated> {
        let source_len = input_ids.len();
        let ids: Vec<i64> = input_ids.iter().map(|&id| i64::from(id)).collect();
        let mask = vec![1i64; source_len];

        let (hidden_shape, hidden) = self.encode(ids, mask.clone())?;

        let mut decoder = self
            .decoder
            .lock()
            .map_err(|e| KalamuError::Internal(format!("Decoder lock poisoned: {e}")))?;

        let mut tokens = vec![self.config.decoder_start_token_id];
        let mut hit_limit = true;

        for _ in 0..max_new_tokens {
            let step_len = tokens.len();
            let outputs = decoder
                .run(ort::inputs![
                    "input_ids" => Tensor::from_array(([1usize, step_len], tokens.clone())).map_err(runtime_error)?,
                    "encoder_attention_mask" => Tensor::from_array(([1usize, source_len], mask.clone())).map_err(runtime_error)?,
                    "encoder_hidden_states" => Tensor::from_array((hidden_shape, hidden.clone())).map_err(runtime_error)?,
                ])
                .map_err(runtime_error)?;

            let (shape, logits) = outputs["logits"]
                .try_extract_tensor::<f32>()
                .map_err(runtime_error)?;
            let vocab = shape.last().map(|&d| d as usize).unwrap_or(0);
            if vocab == 0 || logits.len() < step_len * vocab {
                return Err(runtime_error("decoder returned empty logits"));
            }

            let last = &logits[(step_len - 1) * vocab..step_len * vocab];
            let next = greedy_pick(last, self.config.pad_token_id)
                .ok_or_else(|| runtime_error("decoder returned no usable token"))?;

            if next == self.config.eos_token_id {
                hit_limit = false;
                break;
            }
            tokens.push(next);
        }

        let ids = tokens[1..].iter().map(|&id| id as u32).collect();
        Ok(Generated { ids, hit_limit })
    }
}

/// Index of the highest logit, skipping `suppressed`.
fn greedy_pick(logits: &[f32], suppressed: i64) -> Option<i64> {
    logits
        .iter()
        .enumerate()
        .filter(|(index, _)| *index as i64 != suppressed)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index as i64)
}

fn build_session(path: &Path) -> Result<Session> {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Session::builder()
        .map_err(runtime_error)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(runtime_error)?
        .with_intra_threads(threads)
        .map_err(runtime_error)?
        .commit_from_file(path)
        .map_err(|e| {
            KalamuError::TranslationUnavailable(format!(
                "Failed to load ONNX model {}: {e}",
                path.display()
            ))
        })
}

/// Builds a model from an already materialized directory.
pub fn load_from_dir(identifier: &str, dir: &Path) -> Result<ResolvedModel> {
    let raw = std::fs::read_to_string(dir.join("config.json"))?;
    let config: MarianConfig = serde_json::from_str(&raw)?;

    let eos = u32::try_from(config.eos_token_id)
        .map_err(|_| KalamuError::TranslationUnavailable("Invalid eos_token_id".to_string()))?;
    let tokenizer = MarianTokenizer::from_file(&dir.join("tokenizer.json"), eos)?;
    let model = MarianOnnxModel::load(dir, config)?;

    Ok(ResolvedModel::new(identifier, Arc::new(tokenizer), Arc::new(model)))
}

/// Downloads model files into a local cache and loads them.
///
/// Each call downloads into its own staging directory, which is renamed
/// into place only after every file arrived, so a cached model directory is
/// always complete. Concurrent loads of the same model, in this process or
/// another sharing the cache, never touch each other's staging files.
pub struct MarianLoader {
    client: reqwest::Client,
    cache_dir: PathBuf,
    registry_url: String,
    mirror_owner: Option<String>,
}

impl MarianLoader {
    pub fn new(config: &OfflineModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            cache_dir: PathBuf::from(&config.cache_dir),
            registry_url: config.registry_url.trim_end_matches('/').to_string(),
            mirror_owner: config.mirror_owner.clone(),
        })
    }

    /// Registry repository holding the ONNX export of `identifier`.
    pub fn repository_for(&self, identifier: &str) -> String {
        match (&self.mirror_owner, identifier.split_once('/')) {
            (Some(owner), Some((_, name))) => format!("{owner}/{name}"),
            (Some(owner), None) => format!("{owner}/{identifier}"),
            (None, _) => identifier.to_string(),
        }
    }

    pub fn model_dir(&self, identifier: &str) -> PathBuf {
        self.cache_dir.join(identifier.replace('/', "--"))
    }

    fn file_url(&self, repository: &str, file: &str) -> String {
        format!("{}/{repository}/resolve/main/{file}", self.registry_url)
    }

    /// Make sure every model file is on disk and return the model directory.
    pub async fn materialize(&self, identifier: &str) -> Result<PathBuf> {
        let dir = self.model_dir(identifier);
        if is_complete(&dir) {
            debug!(model = %identifier, "Using cached model files");
            return Ok(dir);
        }

        let repository = self.repository_for(identifier);
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Private to this call; dropping it removes whatever is left.
        let staging = tempfile::Builder::new()
            .prefix(&staging_prefix(&dir))
            .tempdir_in(&self.cache_dir)?;

        info!(model = %identifier, repository = %repository, "Downloading offline model");
        self.fetch_all(&repository, staging.path()).await?;

        if let Err(e) = tokio::fs::rename(staging.path(), &dir).await {
            if is_complete(&dir) {
                debug!(model = %identifier, "Model files were placed by a concurrent load");
            } else {
                warn!(path = %dir.display(), error = %e, "Failed to move model files into place");
                return Err(KalamuError::TranslationUnavailable(format!(
                    "Model directory {} is incomplete: {e}",
                    dir.display()
                )));
            }
        }

        Ok(dir)
    }

    async fn fetch_all(&self, repository: &str, staging: &Path) -> Result<()> {
        for file in MODEL_FILES {
            let url = self.file_url(repository, file);
            self.download(&url, &staging.join(file)).await?;
        }
        Ok(())
    }

    async fn download(&self, url: &str, path: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(KalamuError::TranslationUnavailable(format!(
                "Download failed with status {}: {url}",
                response.status()
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url = %url, bytes = downloaded, "Model file downloaded");
        Ok(())
    }
}

#[async_trait]
impl ModelLoader for MarianLoader {
    async fn load(&self, identifier: &str) -> Result<ResolvedModel> {
        let dir = self.materialize(identifier).await?;
        let identifier = identifier.to_string();

        tokio::task::spawn_blocking(move || load_from_dir(&identifier, &dir))
            .await
            .map_err(|e| KalamuError::Internal(format!("Model load task panicked: {e}")))?
    }
}

fn staging_prefix(dir: &Path) -> String {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{name}{STAGING_SUFFIX}-")
}

fn is_complete(dir: &Path) -> bool {
    MODEL_FILES.iter().all(|file| dir.join(file).is_file())
}
