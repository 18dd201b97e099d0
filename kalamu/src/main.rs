use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kalamu::config::Config;
use kalamu::language::{selectable_targets, OcrLanguage, TargetLanguage};
use kalamu::processing::write_export;
use kalamu::session::Session;
use kalamu::state::AppState;

#[derive(Parser)]
#[command(name = "kalamu")]
#[command(about = "Read a photographed document with OCR and translate it, online or fully offline")]
struct Args {
    /// Document images (JPEG, PNG, ...), processed one at a time
    #[arg(required_unless_present = "list_targets")]
    images: Vec<PathBuf>,

    /// Language printed on the document: en, fr, pt or sw
    #[arg(long)]
    ocr_lang: Option<OcrLanguage>,

    /// Translation target: en, fr, pt, sw, or ln (online only)
    #[arg(long)]
    target: Option<TargetLanguage>,

    /// Translate on this machine only; text never leaves it
    #[arg(long, conflicts_with = "online")]
    privacy: bool,

    /// Use the web translation service
    #[arg(long)]
    online: bool,

    #[arg(long)]
    no_grayscale: bool,

    #[arg(long)]
    denoise: bool,

    #[arg(long)]
    no_binarize: bool,

    /// Write recognized text here instead of printing it
    #[arg(long)]
    ocr_out: Option<PathBuf>,

    /// Write the translation here instead of printing it
    #[arg(long)]
    translation_out: Option<PathBuf>,

    /// List the targets selectable under the current privacy setting
    #[arg(long)]
    list_targets: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(language) = self.ocr_lang {
            config.ocr.language = language;
        }
        if let Some(target) = self.target {
            config.translation.target = target;
        }
        if self.privacy {
            config.translation.privacy_enabled = true;
        }
        if self.online {
            config.translation.privacy_enabled = false;
        }
        if self.no_grayscale {
            config.preprocess.to_grayscale = false;
        }
        if self.denoise {
            config.preprocess.denoise = true;
        }
        if self.no_binarize {
            config.preprocess.binarize = false;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "kalamu=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// `out.txt` for a single image, `out-<image stem>.txt` for several.
fn output_path(base: &Path, image: &Path, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }

    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let image_stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{image_stem}.{ext}"),
        None => format!("{stem}-{image_stem}"),
    };
    base.with_file_name(name)
}

fn emit(label: &str, text: &str, out: Option<&Path>, image: &Path, several: bool) -> anyhow::Result<()> {
    match out {
        Some(base) => {
            let path = output_path(base, image, several);
            write_export(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "{label} written");
        }
        None => {
            println!("== {label} ({}) ==", image.display());
            println!("{text}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = Config::from_env();
    args.apply(&mut config);

    if args.list_targets {
        for target in selectable_targets(config.translation.privacy_enabled) {
            println!("{}\t{}", target.iso2(), target.display_name());
        }
        return Ok(());
    }

    let state = AppState::from_config(config)?;
    let request = state.default_request()?;

    tracing::info!(
        mode = ?request.settings.mode(),
        ocr_language = %request.ocr_language,
        target = %request.settings.target(),
        "Kalamu ready"
    );

    let several = args.images.len() > 1;
    let mut session = Session::new();
    let mut failed = 0usize;

    for image in &args.images {
        let upload = match std::fs::read(image) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{}: {e}", image.display());
                failed += 1;
                continue;
            }
        };

        match state.pipeline.process(&mut session, upload, &request).await {
            Ok(report) => {
                if let Some(diagnostic) = &report.diagnostic {
                    eprintln!("{}: {diagnostic}", image.display());
                }
                if let Some(document) = session.document() {
                    emit("OCR text", &document.ocr_text, args.ocr_out.as_deref(), image, several)?;
                    if report.translator.is_some() {
                        emit(
                            "Translation",
                            &document.translated_text,
                            args.translation_out.as_deref(),
                            image,
                            several,
                        )?;
                    }
                }
            }
            Err(e) => {
                eprintln!("{}: {e}", image.display());
                failed += 1;
            }
        }

        session.clear();
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents could not be processed", args.images.len());
    }

    Ok(())
}
