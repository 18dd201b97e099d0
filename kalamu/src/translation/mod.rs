//! Translation Module
//!
//! Two interchangeable paths behind the [`Translator`] trait:
//!
//! - `OfflineTranslator` runs MarianMT models locally. `ModelResolver` picks
//!   the model for a language pair from the `ModelCatalog` and keeps loaded
//!   models in a shared `ModelCache`.
//! - `OnlineTranslator` calls a public web translation service.
//!
//! `ModeController` chooses between them per request: privacy mode means
//! offline only, and document text never leaves the machine.

mod catalog;
mod marian;
mod mode;
mod offline;
mod online;
mod resolver;
mod types;

pub use catalog::{ModelCatalog, OPUS_MT_TEMPLATE};
pub use marian::{load_from_dir, MarianConfig, MarianLoader, MODEL_FILES};
pub use mode::{ModeController, TranslationMode, TranslationSettings};
pub use offline::{OfflineTranslator, MAX_INPUT_TOKENS, MAX_NEW_TOKENS};
pub use online::{OnlineTranslator, MAX_CHARS_PER_REQUEST};
pub use resolver::{ModelCache, ModelLoader, ModelResolver};
pub use types::{
    Encoded, Generated, ModelHandle, ResolvedModel, TokenizerHandle, TranslationRequest,
    TranslationResult, Translator,
};
