mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use kalamu::config::PreprocessConfig;
use kalamu::error::KalamuError;
use kalamu::language::{selectable_targets, LanguageCode, OcrLanguage, TargetLanguage};
use kalamu::ocr::OcrAdapter;
use kalamu::processing::{Diagnostic, DocumentPipeline, PipelineRequest};
use kalamu::session::Session;
use kalamu::translation::{
    ModeController, ModelCache, ModelCatalog, ModelResolver, OfflineTranslator,
    TranslationSettings, Translator,
};

use common::{letter_png, FakeLoader, RecordingTranslator, ScriptedRecognizer};

const LETTER: &str = "Dear Sir,\nThank you for your letter.";

fn request(privacy_enabled: bool, target: TargetLanguage) -> PipelineRequest {
    PipelineRequest {
        ocr_language: OcrLanguage::English,
        preprocess: PreprocessConfig::default(),
        settings: TranslationSettings::new(privacy_enabled, target).unwrap(),
    }
}

fn pipeline(
    recognizer: Arc<ScriptedRecognizer>,
    offline: Arc<dyn Translator>,
    online: Arc<dyn Translator>,
) -> DocumentPipeline {
    DocumentPipeline::new(
        OcrAdapter::with_recognizer(recognizer, 30),
        ModeController::new(offline, online),
    )
}

fn offline_translator(loader: Arc<FakeLoader>) -> Arc<OfflineTranslator> {
    Arc::new(OfflineTranslator::new(ModelResolver::new(
        ModelCatalog::builtin(),
        ModelCache::new(),
        loader,
    )))
}

#[tokio::test]
async fn test_online_translation_of_business_letter() {
    let recognizer = ScriptedRecognizer::text(LETTER);
    let offline = RecordingTranslator::new("offline");
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer.clone(), offline.clone(), online.clone());

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(false, TargetLanguage::French))
        .await
        .unwrap();

    assert!(report.ocr_succeeded);
    assert_eq!(report.translator, Some("online"));
    assert_eq!(report.diagnostic, None);
    assert_eq!(session.ocr_text(), Some(LETTER));
    assert_eq!(session.translated_text(), Some(format!("[fr] {LETTER}").as_str()));
    assert_eq!(offline.calls(), 0);

    let requests = online.requests.lock().unwrap();
    assert_eq!(requests[0].source, LanguageCode::new("en"));
    assert_eq!(requests[0].target, LanguageCode::new("fr"));
}

#[tokio::test]
async fn test_privacy_mode_uses_curated_offline_model() {
    let recognizer = ScriptedRecognizer::text(LETTER);
    let loader = FakeLoader::with_available(&["Helsinki-NLP/opus-mt-en-fr"]);
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer, offline_translator(loader.clone()), online.clone());

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(true, TargetLanguage::French))
        .await
        .unwrap();

    assert_eq!(report.translator, Some("offline"));
    assert_eq!(
        report.used_model_identifier.as_deref(),
        Some("Helsinki-NLP/opus-mt-en-fr")
    );
    assert_eq!(
        session.translated_text(),
        Some("DEAR SIR,\nTHANK YOU FOR YOUR LETTER.")
    );
    assert_eq!(loader.attempts(), vec!["Helsinki-NLP/opus-mt-en-fr".to_string()]);
    assert_eq!(online.calls(), 0);
}

#[test]
fn test_online_only_target_rejected_under_privacy() {
    let result = TranslationSettings::new(true, TargetLanguage::Lingala);
    assert!(matches!(result, Err(KalamuError::PrivacyRestrictedTarget(_))));
    assert!(!selectable_targets(true).contains(&TargetLanguage::Lingala));
    assert!(selectable_targets(false).contains(&TargetLanguage::Lingala));
}

#[tokio::test]
async fn test_corrupt_image_halts_before_ocr() {
    let recognizer = ScriptedRecognizer::text(LETTER);
    let offline = RecordingTranslator::new("offline");
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer.clone(), offline.clone(), online.clone());

    let mut session = Session::new();
    let result = pipeline
        .process(
            &mut session,
            b"\x89PNG\r\n\x1a\nnot really a png".to_vec(),
            &request(false, TargetLanguage::French),
        )
        .await;

    assert!(matches!(result, Err(KalamuError::Decode(_))));
    assert_eq!(recognizer.calls(), 0);
    assert_eq!(offline.calls() + online.calls(), 0);
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn test_new_upload_clears_previous_document() {
    let recognizer = ScriptedRecognizer::text(LETTER);
    let pipeline = pipeline(
        recognizer,
        RecordingTranslator::new("offline"),
        RecordingTranslator::new("online"),
    );
    let request = request(false, TargetLanguage::English);

    let mut session = Session::new();
    pipeline.process(&mut session, letter_png(), &request).await.unwrap();
    assert!(session.is_loaded());

    let result = pipeline.process(&mut session, vec![0, 1, 2], &request).await;
    assert!(result.is_err());
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn test_ocr_failure_skips_translation() {
    let recognizer = ScriptedRecognizer::failing("Failed loading language 'swa'");
    let offline = RecordingTranslator::new("offline");
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer, offline.clone(), online.clone());

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(false, TargetLanguage::French))
        .await
        .unwrap();

    assert!(!report.ocr_succeeded);
    assert!(matches!(report.diagnostic, Some(Diagnostic::OcrFailed(ref reason)) if reason.contains("swa")));
    assert_eq!(report.translator, None);
    assert_eq!(offline.calls() + online.calls(), 0);
    assert_eq!(session.ocr_text(), Some(""));
    assert_eq!(session.translated_text(), Some(""));
}

#[tokio::test]
async fn test_blank_page_reports_no_text() {
    let recognizer = ScriptedRecognizer::text("  \n");
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer, RecordingTranslator::new("offline"), online.clone());

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(false, TargetLanguage::French))
        .await
        .unwrap();

    assert!(report.ocr_succeeded);
    assert_eq!(report.diagnostic, Some(Diagnostic::NoTextDetected));
    assert_eq!(online.calls(), 0);
}

#[tokio::test]
async fn test_missing_offline_model_degrades_to_diagnostic() {
    let recognizer = ScriptedRecognizer::text("Habari");
    let loader = FakeLoader::with_available(&[]);
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(recognizer, offline_translator(loader), online.clone());

    let request = PipelineRequest {
        ocr_language: OcrLanguage::Swahili,
        preprocess: PreprocessConfig::default(),
        settings: TranslationSettings::new(true, TargetLanguage::Portuguese).unwrap(),
    };

    let mut session = Session::new();
    let report = pipeline.process(&mut session, letter_png(), &request).await.unwrap();

    match report.diagnostic {
        Some(Diagnostic::TranslationFailed(message)) => {
            assert!(message.contains("Helsinki-NLP/opus-mt-sw-pt"))
        }
        other => panic!("Expected TranslationFailed, got {other:?}"),
    }
    assert_eq!(session.ocr_text(), Some("Habari"));
    assert_eq!(session.translated_text(), Some(""));
    assert_eq!(online.calls(), 0);
}

#[tokio::test]
async fn test_online_failure_degrades_to_diagnostic() {
    let pipeline = pipeline(
        ScriptedRecognizer::text(LETTER),
        RecordingTranslator::new("offline"),
        RecordingTranslator::failing("online", "quota exceeded"),
    );

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(false, TargetLanguage::Lingala))
        .await
        .unwrap();

    assert!(matches!(report.diagnostic, Some(Diagnostic::TranslationFailed(ref m)) if m.contains("quota")));
    assert_eq!(session.translated_text(), Some(""));
}

#[tokio::test]
async fn test_truncated_translation_is_signalled() {
    let pipeline = pipeline(
        ScriptedRecognizer::text(LETTER),
        RecordingTranslator::truncating("offline"),
        RecordingTranslator::new("online"),
    );

    let mut session = Session::new();
    let report = pipeline
        .process(&mut session, letter_png(), &request(true, TargetLanguage::Swahili))
        .await
        .unwrap();

    assert_eq!(report.diagnostic, Some(Diagnostic::TranslationTruncated));
    assert!(!session.translated_text().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_privacy_mode_never_reaches_online() {
    let loader = FakeLoader::with_available(&[
        "Helsinki-NLP/opus-mt-en-fr",
        "Helsinki-NLP/opus-mt-en-pt",
    ]);
    let online = RecordingTranslator::new("online");
    let pipeline = pipeline(
        ScriptedRecognizer::text(LETTER),
        offline_translator(loader),
        online.clone(),
    );

    let mut session = Session::new();
    for target in selectable_targets(true) {
        pipeline
            .process(&mut session, letter_png(), &request(true, target))
            .await
            .unwrap();
    }

    assert_eq!(online.calls(), 0);
}

#[tokio::test]
async fn test_binarize_always_sends_single_channel_image() {
    let recognizer = ScriptedRecognizer::text(LETTER);
    let pipeline = pipeline(
        recognizer.clone(),
        RecordingTranslator::new("offline"),
        RecordingTranslator::new("online"),
    );

    let mut session = Session::new();
    for (to_grayscale, binarize, channels) in [(false, true, 1), (true, false, 1), (false, false, 3)] {
        let request = PipelineRequest {
            ocr_language: OcrLanguage::English,
            preprocess: PreprocessConfig {
                to_grayscale,
                denoise: false,
                binarize,
            },
            settings: TranslationSettings::new(false, TargetLanguage::French).unwrap(),
        };
        pipeline.process(&mut session, letter_png(), &request).await.unwrap();
        assert_eq!(recognizer.channels_seen.lock().unwrap().last().copied(), Some(channels));
    }
}
