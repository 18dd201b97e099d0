//! OCR (Optical Character Recognition) Module
//!
//! Turns an uploaded document photo into text.
//!
//! # Architecture
//!
//! - `preprocessing` decodes uploads and applies the optional cleanup steps
//!   (grayscale, denoise, adaptive binarization) in a fixed order
//! - `TextRecognizer` is the engine boundary; `TesseractRecognizer` implements
//!   it with leptess
//! - `OcrAdapter` runs the engine off the async runtime with a timeout and
//!   never fails: engine errors come back as an unsuccessful `OcrResult`
//!
//! # Usage
//!
//! ```rust,ignore
//! let image = decode_image(&bytes)?;
//! let prepared = enhance(&image, &config.preprocess);
//! let result = OcrAdapter::new(&config.ocr).recognize(&prepared, OcrLanguage::English).await;
//! ```

mod preprocessing;
mod provider;

pub use preprocessing::{decode_image, enhance, DocumentImage, PreparedImage};
pub use provider::{OcrAdapter, OcrResult, SegmentationMode, TesseractRecognizer, TextRecognizer};
