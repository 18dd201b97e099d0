//! In-memory holder for the document currently being worked on.
//!
//! Nothing here is ever written to disk. Clearing overwrites every owned
//! buffer with zeros before the memory is released.

use std::hint::black_box;

use tracing::debug;

use crate::ocr::{DocumentImage, PreparedImage};

/// Everything produced for one upload. Built only after the pipeline ran to
/// completion, so a loaded session never holds half a document.
#[derive(Debug)]
pub struct LoadedDocument {
    pub upload: Vec<u8>,
    pub image: DocumentImage,
    pub prepared: PreparedImage,
    /// Empty when OCR failed or found nothing.
    pub ocr_text: String,
    /// Empty when translation was skipped or failed.
    pub translated_text: String,
    pub used_model_identifier: Option<String>,
}

impl LoadedDocument {
    fn wipe(&mut self) {
        wipe_bytes(&mut self.upload);
        self.image.wipe();
        self.prepared.wipe();
        wipe_string(&mut self.ocr_text);
        wipe_string(&mut self.translated_text);
        self.used_model_identifier = None;
    }
}

pub(crate) fn wipe_bytes(bytes: &mut Vec<u8>) {
    bytes.fill(0);
    black_box(&bytes);
    bytes.clear();
}

fn wipe_string(text: &mut String) {
    let mut bytes = std::mem::take(text).into_bytes();
    wipe_bytes(&mut bytes);
}

/// One user's working state. Either a document is loaded or nothing is.
#[derive(Debug, Default)]
pub struct Session {
    document: Option<LoadedDocument>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.ocr_text.as_str())
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.translated_text.as_str())
    }

    /// Replace the current document, wiping the old one first.
    pub fn load(&mut self, document: LoadedDocument) {
        self.clear();
        self.document = Some(document);
    }

    /// Drop the loaded document. A no-op when nothing is loaded.
    pub fn clear(&mut self) {
        if let Some(mut document) = self.document.take() {
            document.wipe();
            debug!("Session cleared");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.clear();
    }
}
