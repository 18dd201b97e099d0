use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kalamu::config::OfflineModelConfig;
use kalamu::error::KalamuError;
use kalamu::language::LanguageCode;
use kalamu::translation::{
    MarianLoader, ModelCache, ModelCatalog, ModelLoader, ModelResolver, MODEL_FILES,
};

fn loader_config(registry_url: String, cache_dir: &Path) -> OfflineModelConfig {
    OfflineModelConfig {
        cache_dir: cache_dir.to_string_lossy().to_string(),
        registry_url,
        mirror_owner: Some("Xenova".to_string()),
        fetch_timeout_secs: 5,
    }
}

async fn serve_model_files(server: &MockServer, repository: &str, expected_calls: u64) {
    for file in MODEL_FILES {
        Mock::given(method("GET"))
            .and(path(format!("/{repository}/resolve/main/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("contents of {file}")))
            .expect(expected_calls)
            .mount(server)
            .await;
    }
}

fn leftover_staging(cache_dir: &Path) -> bool {
    std::fs::read_dir(cache_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .any(|entry| entry.file_name().to_string_lossy().contains(".partial"))
        })
        .unwrap_or(false)
}

#[tokio::test]
async fn test_materialize_downloads_every_file_once() {
    let server = MockServer::start().await;
    serve_model_files(&server, "Xenova/opus-mt-en-fr", 1).await;

    let cache = tempfile::tempdir().unwrap();
    let loader = MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap();

    let dir = loader.materialize("Helsinki-NLP/opus-mt-en-fr").await.unwrap();
    assert_eq!(dir, cache.path().join("Helsinki-NLP--opus-mt-en-fr"));
    for file in MODEL_FILES {
        assert_eq!(
            std::fs::read_to_string(dir.join(file)).unwrap(),
            format!("contents of {file}")
        );
    }
    assert!(!leftover_staging(cache.path()));

    // Cached now: no further requests (the mocks expect exactly one each).
    let again = loader.materialize("Helsinki-NLP/opus-mt-en-fr").await.unwrap();
    assert_eq!(again, dir);
}

#[tokio::test]
async fn test_failed_download_leaves_no_partial_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Xenova/opus-mt-en-fr/resolve/main/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Xenova/opus-mt-en-fr/resolve/main/tokenizer.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let loader = MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap();

    let result = loader.materialize("Helsinki-NLP/opus-mt-en-fr").await;
    assert!(matches!(result, Err(KalamuError::TranslationUnavailable(_))));
    assert!(!cache.path().join("Helsinki-NLP--opus-mt-en-fr").exists());
    assert!(!leftover_staging(cache.path()));
}

#[tokio::test]
async fn test_unloadable_files_fail_the_candidate() {
    let server = MockServer::start().await;
    serve_model_files(&server, "Xenova/opus-mt-sw-en", 1).await;

    let cache = tempfile::tempdir().unwrap();
    let loader = MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap();

    // The served files are placeholders, so loading must fail cleanly.
    let result = loader.load("Helsinki-NLP/opus-mt-sw-en").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_resolver_over_empty_registry_reports_every_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/Xenova/.*/resolve/main/config\.json$"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let loader = Arc::new(MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap());
    let resolver = ModelResolver::new(ModelCatalog::builtin(), ModelCache::new(), loader);

    let result = resolver
        .resolve(&LanguageCode::new("en"), &LanguageCode::new("fr"))
        .await;

    match result {
        Err(KalamuError::ModelUnavailable { tried, .. }) => assert_eq!(
            tried,
            vec![
                "Helsinki-NLP/opus-mt-en-fr".to_string(),
                "Helsinki-NLP/opus-mt-en-ROMANCE".to_string(),
            ]
        ),
        other => panic!("Expected ModelUnavailable, got {other:?}"),
    }
    assert!(!leftover_staging(cache.path()));
}

#[tokio::test]
async fn test_without_mirror_uses_canonical_repository() {
    let server = MockServer::start().await;
    serve_model_files(&server, "Helsinki-NLP/opus-mt-en-pt", 1).await;

    let cache = tempfile::tempdir().unwrap();
    let mut config = loader_config(server.uri(), cache.path());
    config.mirror_owner = None;
    let loader = MarianLoader::new(&config).unwrap();

    assert!(loader.materialize("Helsinki-NLP/opus-mt-en-pt").await.is_ok());
}

#[tokio::test]
async fn test_concurrent_loads_both_get_complete_model() {
    let server = MockServer::start().await;
    for file in MODEL_FILES {
        Mock::given(method("GET"))
            .and(path(format!("/Xenova/opus-mt-en-fr/resolve/main/{file}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(format!("contents of {file}"))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
    }

    let cache = tempfile::tempdir().unwrap();
    let first = MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap();
    let second = MarianLoader::new(&loader_config(server.uri(), cache.path())).unwrap();

    // The second load starts while the first is still downloading.
    let (a, b) = tokio::join!(first.materialize("Helsinki-NLP/opus-mt-en-fr"), async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        second.materialize("Helsinki-NLP/opus-mt-en-fr").await
    });

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);
    for file in MODEL_FILES {
        assert_eq!(
            std::fs::read_to_string(a.join(file)).unwrap(),
            format!("contents of {file}")
        );
    }
    assert!(!leftover_staging(cache.path()));
}
