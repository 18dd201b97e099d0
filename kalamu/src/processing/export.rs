use std::path::Path;

use crate::error::Result;

/// Plain-text download of OCR or translated text.
pub fn export_text(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

pub fn write_export(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, export_text(text))?;
    Ok(())
}
