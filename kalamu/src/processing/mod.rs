mod export;
mod pipeline;

pub use export::{export_text, write_export};
pub use pipeline::{Diagnostic, DocumentPipeline, PipelineReport, PipelineRequest};
