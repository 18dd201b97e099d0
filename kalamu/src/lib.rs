//! Kalamu reads a photographed document and translates it.
//!
//! An upload is decoded, cleaned up for OCR, read with Tesseract and
//! translated either by a web service or, in privacy mode, by a MarianMT
//! model running on this machine. Document data only ever lives in a
//! [`session::Session`] and is wiped when the session is cleared.

pub mod config;
pub mod error;
pub mod language;
pub mod ocr;
pub mod processing;
pub mod session;
pub mod state;
pub mod translation;

pub use error::{KalamuError, Result};
