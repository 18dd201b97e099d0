use std::collections::HashMap;

use crate::language::{LanguageCode, LanguagePair};

/// Naming scheme of the OPUS-MT pair models.
pub const OPUS_MT_TEMPLATE: &str = "Helsinki-NLP/opus-mt-{source}-{target}";

/// Pairs known to load and translate acceptably.
const CURATED_PAIRS: &[(&str, &str, &str)] = &[
    ("en", "fr", "Helsinki-NLP/opus-mt-en-fr"),
    ("fr", "en", "Helsinki-NLP/opus-mt-fr-en"),
    ("en", "pt", "Helsinki-NLP/opus-mt-en-pt"),
    ("pt", "en", "Helsinki-NLP/opus-mt-pt-en"),
    ("en", "sw", "Helsinki-NLP/opus-mt-en-sw"),
    ("sw", "en", "Helsinki-NLP/opus-mt-sw-en"),
];

/// Multi-target models to try when no pair model exists, keyed by source.
const SOURCE_FALLBACKS: &[(&str, &[&str])] = &[
    ("en", &["Helsinki-NLP/opus-mt-en-ROMANCE"]),
    ("fr", &["Helsinki-NLP/opus-mt-ROMANCE-en"]),
    ("pt", &["Helsinki-NLP/opus-mt-ROMANCE-en"]),
    ("sw", &[]),
];

/// Whether `identifier` names a multi-target model. Those expect a
/// `>>{target}<<` token in front of the source text, and their target
/// segment is a language group such as `ROMANCE` or `mul`.
pub fn is_multi_target(identifier: &str) -> bool {
    let name = identifier.rsplit('/').next().unwrap_or(identifier);
    match name.rsplit('-').next() {
        Some(target) => {
            target == "mul"
                || (target.len() > 3 && target.chars().all(|c| c.is_ascii_uppercase()))
        }
        None => false,
    }
}

/// Declarative model tables consulted by the resolver.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pairs: HashMap<LanguagePair, String>,
    template: String,
    fallbacks: HashMap<LanguageCode, Vec<String>>,
}

impl ModelCatalog {
    pub fn new(
        pairs: HashMap<LanguagePair, String>,
        template: impl Into<String>,
        fallbacks: HashMap<LanguageCode, Vec<String>>,
    ) -> Self {
        Self {
            pairs,
            template: template.into(),
            fallbacks,
        }
    }

    pub fn builtin() -> Self {
        let pairs = CURATED_PAIRS
            .iter()
            .map(|(source, target, id)| (LanguagePair::new(*source, *target), id.to_string()))
            .collect();

        let fallbacks = SOURCE_FALLBACKS
            .iter()
            .map(|(source, ids)| {
                (
                    LanguageCode::new(source),
                    ids.iter().map(|id| id.to_string()).collect(),
                )
            })
            .collect();

        Self::new(pairs, OPUS_MT_TEMPLATE, fallbacks)
    }

    pub fn curated(&self, pair: &LanguagePair) -> Option<&str> {
        self.pairs.get(pair).map(String::as_str)
    }

    pub fn generic_identifier(&self, pair: &LanguagePair) -> String {
        self.template
            .replace("{source}", pair.source.as_str())
            .replace("{target}", pair.target.as_str())
    }

    pub fn fallbacks(&self, source: &LanguageCode) -> &[String] {
        self.fallbacks.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identifiers to try, in order: curated entry, generic template, then
    /// the source's fallback list. Duplicates keep their first position.
    pub fn candidates(&self, pair: &LanguagePair) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let mut push = |id: String| {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        };

        if let Some(id) = self.curated(pair) {
            push(id.to_string());
        }
        push(self.generic_identifier(pair));
        for id in self.fallbacks(&pair.source) {
            push(id.clone());
        }

        candidates
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
