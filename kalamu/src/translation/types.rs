use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::language::LanguageCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    /// Language printed on the page. Online translation detects it instead.
    pub source: LanguageCode,
    pub target: LanguageCode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
    /// Offline model that produced `text`; `None` for pass-through and online results.
    pub used_model_identifier: Option<String>,
    /// Input or output hit a model length limit, so `text` covers only part
    /// of the document.
    pub truncated: bool,
}

impl TranslationResult {
    pub fn passthrough(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            used_model_identifier: None,
            truncated: false,
        }
    }
}

/// One contract for both translation paths; the mode controller picks which.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub ids: Vec<u32>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub ids: Vec<u32>,
    /// Generation stopped at the token budget instead of end-of-sequence.
    pub hit_limit: bool,
}

pub trait TokenizerHandle: Send + Sync {
    /// Encode `text` as one sequence of at most `max_tokens` ids.
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Encoded>;

    /// Decode ids, dropping model control tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

pub trait ModelHandle: Send + Sync {
    fn generate(&self, input_ids: &[u32], max_new_tokens: usize) -> Result<Generated>;
}

/// A loaded offline model. Cheap to clone; never mutated after load.
#[derive(Clone)]
pub struct ResolvedModel {
    identifier: String,
    tokenizer: Arc<dyn TokenizerHandle>,
    model: Arc<dyn ModelHandle>,
}

impl ResolvedModel {
    pub fn new(
        identifier: impl Into<String>,
        tokenizer: Arc<dyn TokenizerHandle>,
        model: Arc<dyn ModelHandle>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            tokenizer,
            model,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn tokenizer(&self) -> &dyn TokenizerHandle {
        self.tokenizer.as_ref()
    }

    pub fn model(&self) -> &dyn ModelHandle {
        self.model.as_ref()
    }
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}
