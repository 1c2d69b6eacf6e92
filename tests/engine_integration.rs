//! Integration tests for the engine with fake collaborators.
//!
//! The fetcher and extractor are in-memory implementations of the public
//! traits, so source sync, just-in-time sync, knowledge-base aggregation, and
//! extraction fallbacks run end to end without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rag_harness::config::KnowledgeBaseConfig;
use rag_harness::engine::{EngineSettings, RagEngine};
use rag_harness::error::{FailureKind, RagError, Result};
use rag_harness::extract::{Extraction, TextExtractor, MIME_DOCX, MIME_PDF};
use rag_harness::fetch::ContentFetcher;
use rag_harness::knowledge::MatchStrategy;
use rag_harness::logging::EventLog;
use rag_harness::sources::NewSource;
use rag_harness_core::models::{DocumentStatus, SourceKind, SyncStatus};
use rag_harness_core::search::SearchOptions;
use rag_harness_core::store::memory::MemoryStore;
use rag_harness_core::store::KeyValueStore;
use serde_json::json;
use tokio::sync::Notify;

// ─── Fakes ──────────────────────────────────────────────────────────

/// Serves canned pages and JSON by URL; anything else is a 500.
#[derive(Default)]
struct FakeFetcher {
    pages: Mutex<HashMap<String, String>>,
    json: Mutex<HashMap<String, serde_json::Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn page(self, url: &str, text: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
        self
    }

    fn api(self, url: &str, value: serde_json::Value) -> Self {
        self.json.lock().unwrap().insert(url.to_string(), value);
        self
    }

    fn set_page(&self, url: &str, text: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn not_found(url: &str) -> RagError {
        RagError::Fetch {
            url: url.to_string(),
            kind: FailureKind::Failed,
            message: "HTTP 500 Internal Server Error".to_string(),
        }
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        let page = self.pages.lock().unwrap().get(url).cloned();
        page.ok_or_else(|| Self::not_found(url))
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        self.calls.lock().unwrap().push(url.to_string());
        let value = self.json.lock().unwrap().get(url).cloned();
        value.ok_or_else(|| Self::not_found(url))
    }
}

/// Blocks inside `fetch_page` until released.
#[derive(Default)]
struct GatedFetcher {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ContentFetcher for GatedFetcher {
    async fn fetch_page(&self, _url: &str) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("Content that arrives after the source is gone.".to_string())
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        Err(FakeFetcher::not_found(url))
    }
}

enum ExtractorReply {
    Text(&'static str),
    Refuse(FailureKind),
}

struct FakeExtractor {
    reply: ExtractorReply,
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _name: &str, _mime: &str, _bytes: &[u8]) -> Result<Extraction> {
        match &self.reply {
            ExtractorReply::Text(text) => Ok(Extraction::assess(text.to_string(), 50)),
            ExtractorReply::Refuse(kind) => Err(RagError::ExtractionFailed {
                kind: *kind,
                message: "HTTP 401 Unauthorized".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingLog {
    events: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLog {
    fn contains(&self, level: &str, needle: &str) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl EventLog for RecordingLog {
    fn info(&self, message: &str) {
        self.events.lock().unwrap().push(("info", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.events.lock().unwrap().push(("warn", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.events.lock().unwrap().push(("error", message.to_string()));
    }
}

fn engine() -> RagEngine {
    RagEngine::new(Arc::new(MemoryStore::new()), EngineSettings::default())
}

fn kb(id: &str, doc_ids: Option<Vec<&str>>, default_content: Option<&str>) -> KnowledgeBaseConfig {
    KnowledgeBaseConfig {
        id: id.to_string(),
        name: format!("KB {}", id),
        description: String::new(),
        enabled: true,
        doc_ids: doc_ids.map(|ids| ids.into_iter().map(str::to_string).collect()),
        default_content: default_content.map(str::to_string),
    }
}

const GUIDE_URL: &str = "https://example.com/guide";
const GUIDE_TEXT: &str = "The ownership guide explains borrowing. References never outlive \
    their owners. Lifetimes make that rule explicit.";

// ─── Source registry and sync ───────────────────────────────────────

#[tokio::test]
async fn test_add_source_starts_idle_and_enabled() {
    let engine = engine();
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();

    assert!(source.id.starts_with("ext_"));
    assert_eq!(source.sync_status, SyncStatus::Idle);
    assert!(source.enabled);
    assert!(source.last_sync_at.is_none());
    assert_eq!(engine.list_sources(Some("kb_rust")).await.len(), 1);
    assert!(engine.list_sources(Some("kb_other")).await.is_empty());
}

#[tokio::test]
async fn test_add_source_rejects_empty_url() {
    let engine = engine();
    let err = engine
        .add_source(NewSource::website("Nothing", "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Invalid(_)));
    assert!(engine.list_sources(None).await.is_empty());
}

#[tokio::test]
async fn test_sync_website_builds_document() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL).description("Rust notes"))
        .await
        .unwrap();

    let doc = engine.sync_source(&source.id).await.unwrap();
    assert_eq!(doc.id, format!("ext_doc_{}", source.id));
    assert_eq!(doc.source_id.as_deref(), Some(source.id.as_str()));
    assert_eq!(doc.url.as_deref(), Some(GUIDE_URL));
    assert_eq!(doc.metadata.description.as_deref(), Some("Rust notes"));
    assert!(doc.vectorized);
    assert!(engine.has_vectors(&doc.id).await);

    let synced = engine.get_source(&source.id).await.unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Success);
    assert!(synced.last_sync_at.is_some());
    assert!(synced.last_error.is_none());
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_sync_api_renders_json() {
    let url = "https://api.example.com/items";
    let fetcher = Arc::new(FakeFetcher::default().api(url, json!({"items": [{"name": "widget"}]})));
    let engine = engine().with_fetcher(fetcher);
    let source = engine
        .add_source(NewSource::website("Items", url).kind(SourceKind::Api))
        .await
        .unwrap();

    let doc = engine.sync_source(&source.id).await.unwrap();
    assert_eq!(doc.mime_type, "application/json");
    assert!(doc.chunks[0].text.contains("\"widget\""));
}

#[tokio::test]
async fn test_failed_sync_records_error() {
    let log = Arc::new(RecordingLog::default());
    let engine = engine()
        .with_fetcher(Arc::new(FakeFetcher::default()))
        .with_log(log.clone());
    let source = engine
        .add_source(NewSource::website("Broken", "https://broken.example.com"))
        .await
        .unwrap();

    let err = engine.sync_source(&source.id).await.unwrap_err();
    match err {
        RagError::SyncFailed { source_id, message } => {
            assert_eq!(source_id, source.id);
            assert!(message.contains("500"));
        }
        other => panic!("expected SyncFailed, got {:?}", other),
    }

    let failed = engine.get_source(&source.id).await.unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Error);
    assert!(failed.last_error.unwrap().contains("500"));
    assert!(!engine.has_vectors(&source.document_id()).await);
    assert!(log.contains("error", &source.id));
}

#[tokio::test]
async fn test_database_source_cannot_sync() {
    let engine = engine().with_fetcher(Arc::new(FakeFetcher::default()));
    let source = engine
        .add_source(NewSource::website("Db", "postgres://db").kind(SourceKind::Database))
        .await
        .unwrap();

    assert!(engine.sync_source(&source.id).await.is_err());
    assert_eq!(
        engine.get_source(&source.id).await.unwrap().sync_status,
        SyncStatus::Error
    );
}

#[tokio::test]
async fn test_sync_unknown_source_is_not_found() {
    let engine = engine().with_fetcher(Arc::new(FakeFetcher::default()));
    let err = engine.sync_source("ext_missing").await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { kind: "source", .. }));
}

#[tokio::test]
async fn test_resync_replaces_content() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, "First version about ownership."));
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL))
        .await
        .unwrap();

    engine.sync_source(&source.id).await.unwrap();
    fetcher.set_page(GUIDE_URL, "Second version about lifetimes.");
    let doc = engine.sync_source(&source.id).await.unwrap();

    let docs = engine.list_documents().await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, doc.id);
    assert_eq!(docs[0].chunks[0].text, "Second version about lifetimes.");
}

#[tokio::test]
async fn test_remove_source_cascades() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher);
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL))
        .await
        .unwrap();
    engine.sync_source(&source.id).await.unwrap();

    assert!(engine.remove_source(&source.id).await.unwrap());
    assert!(engine.get_source(&source.id).await.is_none());
    assert!(engine.get_document(&source.document_id()).await.is_none());
    assert!(!engine.has_vectors(&source.document_id()).await);
    assert!(!engine.remove_source(&source.id).await.unwrap());
}

#[tokio::test]
async fn test_remove_during_sync_discards_content() {
    let fetcher = Arc::new(GatedFetcher::default());
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Slow", "https://slow.example.com"))
        .await
        .unwrap();

    let (synced, removed) = tokio::join!(engine.sync_source(&source.id), async {
        fetcher.entered.notified().await;
        let removed = engine.remove_source(&source.id).await;
        fetcher.release.notify_one();
        removed
    });

    assert!(removed.unwrap());
    assert!(matches!(synced, Err(RagError::NotFound { .. })));
    assert!(engine.list_sources(None).await.is_empty());
    assert!(engine.list_documents().await.is_empty());
    assert!(!engine.has_vectors(&source.document_id()).await);
}

#[tokio::test]
async fn test_disable_and_enable_source() {
    let engine = engine();
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();

    let disabled = engine.set_source_enabled(&source.id, false).await.unwrap();
    assert!(!disabled.enabled);
    assert!(!engine.has_enabled_sources("kb_rust").await);

    engine.set_source_enabled(&source.id, true).await.unwrap();
    assert!(engine.has_enabled_sources("kb_rust").await);

    let err = engine.set_source_enabled("ext_nope", true).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound { .. }));
}

// ─── External search ────────────────────────────────────────────────

#[tokio::test]
async fn test_external_search_syncs_just_in_time() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();

    let results = engine
        .search_external_sources("ownership and borrowing", "kb_rust", 2, 0.0)
        .await;
    assert!(!results.is_empty());
    assert!(results.len() <= 2);
    assert_eq!(results[0].doc_id, source.document_id());
    assert_eq!(results[0].doc_name, "Guide");
    assert_eq!(fetcher.call_count(), 1);

    // Vectors exist now, so a second search does not fetch again.
    engine
        .search_external_sources("lifetimes", "kb_rust", 2, 0.0)
        .await;
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_external_search_does_not_resync_empty_source() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, ""));
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Blank", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();

    for query in ["ownership", "borrowing", "lifetimes"] {
        assert!(engine
            .search_external_sources(query, "kb_rust", 2, 0.0)
            .await
            .is_empty());
    }
    assert_eq!(fetcher.call_count(), 1);
    let synced = engine.get_source(&source.id).await.unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Success);
    assert!(!engine.has_vectors(&source.document_id()).await);

    // An explicit sync still refreshes it.
    fetcher.set_page(GUIDE_URL, GUIDE_TEXT);
    engine.sync_source(&source.id).await.unwrap();
    let results = engine
        .search_external_sources("ownership borrowing", "kb_rust", 2, 0.0)
        .await;
    assert_eq!(results[0].doc_name, "Blank");
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn test_external_search_skips_failed_sources() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher);
    engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();
    let broken = engine
        .add_source(NewSource::website("Broken", "https://broken.example.com").knowledge_base("kb_rust"))
        .await
        .unwrap();

    let results = engine
        .search_external_sources("ownership", "kb_rust", 5, 0.0)
        .await;
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.doc_name == "Guide"));
    assert_eq!(
        engine.get_source(&broken.id).await.unwrap().sync_status,
        SyncStatus::Error
    );
}

#[tokio::test]
async fn test_external_search_ignores_disabled_and_other_kbs() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher.clone());
    let source = engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();
    engine.set_source_enabled(&source.id, false).await.unwrap();

    assert!(engine
        .search_external_sources("ownership", "kb_rust", 2, 0.0)
        .await
        .is_empty());
    assert!(engine
        .search_external_sources("ownership", "kb_other", 2, 0.0)
        .await
        .is_empty());
    assert_eq!(fetcher.call_count(), 0);
}

// ─── Knowledge-base aggregation ─────────────────────────────────────

#[tokio::test]
async fn test_query_knowledge_strategies_and_order() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher);
    let doc = engine
        .ingest_text(
            "services.md",
            "Rust and tokio power async services. Serde handles the wire format.",
        )
        .await
        .unwrap();
    engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_ext"))
        .await
        .unwrap();

    let query = "rust tokio serde axum clap";
    let knowledge_bases = vec![
        // 2 of 5 query keywords: ratio 0.4, accepted.
        kb(
            "kb_builtin",
            Some(vec!["doc_none"]),
            Some("rust and tokio everywhere. rust again."),
        ),
        kb("kb_docs", Some(vec![doc.id.as_str()]), None),
        // 1 of 5: ratio 0.2, rejected, and nothing else to try.
        kb(
            "kb_weak",
            Some(vec!["doc_none"]),
            Some("rust is a language. python scripts. java runs."),
        ),
        kb("kb_ext", Some(vec!["doc_none"]), None),
    ];

    let answer = engine.query_knowledge(query, &knowledge_bases).await;
    let order: Vec<(&str, MatchStrategy)> = answer
        .matches
        .iter()
        .map(|m| (m.knowledge_base_id.as_str(), m.strategy))
        .collect();
    assert_eq!(
        order,
        vec![
            ("kb_docs", MatchStrategy::Documents),
            ("kb_ext", MatchStrategy::External),
            ("kb_builtin", MatchStrategy::BuiltIn),
        ]
    );
    assert!((answer.matches[2].score - 0.4).abs() < 1e-9);
    assert!(answer.context.contains("[KB kb_docs] (documents)"));
    assert!(answer.context.contains("[KB kb_builtin] (built-in)\nrust and tokio everywhere."));
}

#[tokio::test]
async fn test_query_knowledge_documents_win_over_builtin() {
    let engine = engine();
    let doc = engine
        .ingest_text(
            "services.md",
            "Rust and tokio power async services. Serde handles the wire format.",
        )
        .await
        .unwrap();

    // The built-in text alone would match with ratio 0.4.
    let both = kb(
        "kb_both",
        Some(vec![doc.id.as_str()]),
        Some("rust and tokio everywhere. rust again."),
    );
    let answer = engine
        .query_knowledge("rust tokio serde axum clap", &[both])
        .await;
    assert_eq!(answer.matches.len(), 1);
    assert_eq!(answer.matches[0].strategy, MatchStrategy::Documents);
    assert_eq!(answer.matches[0].score, 1.0);
    assert_eq!(answer.matches[0].results[0].doc_id, doc.id);
    assert!(answer.matches[0].text.is_none());
}

#[tokio::test]
async fn test_query_knowledge_builtin_wins_over_external() {
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let engine = engine().with_fetcher(fetcher.clone());
    engine
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_mixed"))
        .await
        .unwrap();

    let mixed = kb(
        "kb_mixed",
        Some(vec!["doc_none"]),
        Some("ownership and borrowing. ownership rules."),
    );
    let answer = engine
        .query_knowledge("ownership borrowing", &[mixed])
        .await;
    assert_eq!(answer.matches.len(), 1);
    assert_eq!(answer.matches[0].strategy, MatchStrategy::BuiltIn);
    assert!(answer.matches[0].results.is_empty());
    // The external source is never consulted, so it is never synced.
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_query_knowledge_skips_disabled() {
    let engine = engine();
    engine
        .ingest_text("notes.txt", "Ownership and borrowing in Rust.")
        .await
        .unwrap();
    let mut disabled = kb("kb_off", None, None);
    disabled.enabled = false;

    let answer = engine
        .query_knowledge("ownership borrowing", &[disabled])
        .await;
    assert!(answer.is_empty());
    assert_eq!(answer.context, "");
}

#[tokio::test]
async fn test_query_knowledge_unscoped_uses_whole_index() {
    let engine = engine();
    let doc = engine
        .ingest_text("notes.txt", "Ownership and borrowing in Rust.")
        .await
        .unwrap();

    let answer = engine
        .query_knowledge("ownership borrowing", &[kb("kb_all", None, None)])
        .await;
    assert_eq!(answer.matches.len(), 1);
    assert_eq!(answer.matches[0].strategy, MatchStrategy::Documents);
    assert_eq!(answer.matches[0].results[0].doc_id, doc.id);
    assert!(answer.matches[0].results.len() <= 3);
}

// ─── Extraction fallbacks ───────────────────────────────────────────

#[tokio::test]
async fn test_successful_extraction_is_vectorized() {
    let engine = engine().with_extractor(Arc::new(FakeExtractor {
        reply: ExtractorReply::Text(
            "Quarterly report. Revenue grew in every region and costs stayed flat.",
        ),
    }));
    let doc = engine
        .ingest_bytes("report.pdf", MIME_PDF, b"%PDF-1.7")
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Parsed);
    assert!(doc.vectorized);
    assert!(doc.metadata.degraded_reason.is_none());
}

#[tokio::test]
async fn test_short_extraction_is_degraded() {
    let engine = engine().with_extractor(Arc::new(FakeExtractor {
        reply: ExtractorReply::Text("tiny"),
    }));
    let doc = engine
        .ingest_bytes("memo.docx", MIME_DOCX, b"PK\x03\x04")
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Parsed);
    assert!(!doc.vectorized);
    assert_eq!(doc.chunks[0].text, "tiny");
    assert!(doc.metadata.degraded_reason.is_some());
    assert!(!engine.has_vectors(&doc.id).await);
}

#[tokio::test]
async fn test_refused_extraction_stores_placeholder() {
    let log = Arc::new(RecordingLog::default());
    let engine = engine()
        .with_log(log.clone())
        .with_extractor(Arc::new(FakeExtractor {
            reply: ExtractorReply::Refuse(FailureKind::InvalidCredentials),
        }));
    let doc = engine
        .ingest_bytes("scan.pdf", MIME_PDF, &[0u8; 1024])
        .await
        .unwrap();

    assert!(!doc.vectorized);
    assert!(doc.chunks[0].text.starts_with("[PDF document: scan.pdf]"));
    assert!(doc
        .metadata
        .degraded_reason
        .unwrap()
        .contains("invalid credentials"));
    assert!(log.contains("warn", "scan.pdf"));
}

// ─── URL ingestion and persistence ──────────────────────────────────

#[tokio::test]
async fn test_ingest_url_uses_host_as_name() {
    let url = "https://docs.example.com/book/ch01";
    let engine = engine().with_fetcher(Arc::new(
        FakeFetcher::default().page(url, "Chapter one covers installation and hello world."),
    ));
    let doc = engine.ingest_url(url).await.unwrap();
    assert!(doc.id.starts_with("url_"));
    assert_eq!(doc.name, "docs.example.com");
    assert_eq!(doc.url.as_deref(), Some(url));
    assert!(doc.vectorized);
}

#[tokio::test]
async fn test_ingest_url_fetch_error_propagates() {
    let engine = engine().with_fetcher(Arc::new(FakeFetcher::default()));
    let err = engine.ingest_url("https://down.example.com").await.unwrap_err();
    assert!(matches!(err, RagError::Fetch { .. }));
    assert!(engine.list_documents().await.is_empty());
}

#[tokio::test]
async fn test_ingest_url_rejects_malformed_url() {
    let fetcher = Arc::new(FakeFetcher::default());
    let engine = engine().with_fetcher(fetcher.clone());
    let err = engine.ingest_url("not a url").await.unwrap_err();
    assert!(matches!(err, RagError::Invalid(_)));
    assert_eq!(fetcher.call_count(), 0);
    assert!(engine.list_documents().await.is_empty());
}

#[tokio::test]
async fn test_ingest_url_name_drops_port() {
    let url = "https://docs.example.com:8443/guide";
    let engine = engine().with_fetcher(Arc::new(
        FakeFetcher::default().page(url, "The guide covers configuration and deployment."),
    ));
    let doc = engine.ingest_url(url).await.unwrap();
    assert_eq!(doc.name, "docs.example.com");
    assert_eq!(doc.url.as_deref(), Some(url));
}

#[tokio::test]
async fn test_sources_survive_reload() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(FakeFetcher::default().page(GUIDE_URL, GUIDE_TEXT));
    let first = RagEngine::new(Arc::clone(&store), EngineSettings::default())
        .with_fetcher(fetcher.clone());
    let source = first
        .add_source(NewSource::website("Guide", GUIDE_URL).knowledge_base("kb_rust"))
        .await
        .unwrap();
    first.sync_source(&source.id).await.unwrap();

    let second = RagEngine::new(store, EngineSettings::default()).with_fetcher(fetcher.clone());
    second.load().await.unwrap();
    let reloaded = second.get_source(&source.id).await.unwrap();
    assert_eq!(reloaded.sync_status, SyncStatus::Success);
    assert!(second.has_vectors(&source.document_id()).await);

    let opts = SearchOptions {
        min_score: 0.0,
        ..Default::default()
    };
    let results = second.search("ownership guide", &opts).await;
    assert_eq!(results[0].doc_name, "Guide");
    assert_eq!(fetcher.call_count(), 1);
}
