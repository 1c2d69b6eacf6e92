//! The retrieval engine: document collection, ingestion pipeline, and search.
//!
//! [`RagEngine`] owns all mutable state (the document list, the vector index
//! with its search cache, and the external-source registry) and the injected
//! collaborators. External-source operations live in
//! [`sources`](crate::sources) and knowledge-base aggregation in
//! [`knowledge`](crate::knowledge); both are further `impl RagEngine` blocks.
//!
//! # Ingestion
//!
//! ```text
//! bytes ─▶ classify ─▶ text / strip_html / TextExtractor
//!                              │
//!                              ▼
//!                  chunk_text ─▶ embed (batches) ─▶ commit ─▶ persist
//! ```
//!
//! Extraction problems never fail an ingestion. Degraded or failed
//! extraction stores the document with `vectorized = false` and the reason
//! in its metadata; undecodable text stores it with `status = error`. Only
//! unsupported MIME types and store failures return an error.
//!
//! # Locking
//!
//! State sits behind `tokio::sync` locks that are never held across a
//! collaborator call. When several are needed they are taken in the order
//! sources → documents → retrieval. Writes to the store are serialized by a
//! separate persist lock, so snapshots always land in mutation order.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use url::Url;
use uuid::Uuid;
use walkdir::WalkDir;

use rag_harness_core::chunk::chunk_text;
use rag_harness_core::embedding::{CorpusStats, EmbeddingProvider, HashingEmbedder};
use rag_harness_core::index::VectorIndex;
use rag_harness_core::keywords::extract_metadata;
use rag_harness_core::models::{
    Chunk, Document, DocumentStats, DocumentStatus, ExternalSource, SearchResult, VectorRecord,
};
use rag_harness_core::search::{SearchEngine, SearchOptions};
use rag_harness_core::store::{load_json, KeyValueStore, DOCUMENTS_KEY, SOURCES_KEY, VECTORS_KEY};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::extract::{
    classify, guess_mime, strip_html, ContentClass, Extraction, HttpExtractor, TextExtractor,
    MIME_HTML, MIME_PLAIN,
};
use crate::fetch::{ContentFetcher, HttpFetcher};
use crate::logging::{SharedLog, TracingLog};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// Tunables the engine reads at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub embed_batch_size: usize,
    pub cache_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: rag_harness_core::chunk::DEFAULT_CHUNK_SIZE,
            overlap: rag_harness_core::chunk::DEFAULT_OVERLAP,
            embed_batch_size: 10,
            cache_size: rag_harness_core::search::DEFAULT_CACHE_SIZE,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            embed_batch_size: config.retrieval.embed_batch_size,
            cache_size: config.retrieval.cache_size,
        }
    }
}

/// Vector index plus the search engine whose cache mirrors it.
pub(crate) struct Retrieval {
    pub(crate) index: VectorIndex,
    pub(crate) search: SearchEngine,
}

/// Fields of a document about to be built from text.
pub(crate) struct DocumentDraft {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) mime_type: String,
    pub(crate) size_bytes: u64,
    pub(crate) source_id: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) description: Option<String>,
}

/// The in-process retrieval engine.
pub struct RagEngine {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) extractor: Option<Arc<dyn TextExtractor>>,
    pub(crate) fetcher: Option<Arc<dyn ContentFetcher>>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) log: SharedLog,
    pub(crate) settings: EngineSettings,
    pub(crate) sources: RwLock<Vec<ExternalSource>>,
    pub(crate) documents: RwLock<Vec<Document>>,
    pub(crate) retrieval: Mutex<Retrieval>,
    persist_lock: Mutex<()>,
}

impl RagEngine {
    /// An empty engine over `store` with the hashing embedder, tracing log,
    /// and no network collaborators. Call [`load`](Self::load) to read
    /// persisted state.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: EngineSettings) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder);
        Self {
            store,
            extractor: None,
            fetcher: None,
            retrieval: Mutex::new(Retrieval {
                index: VectorIndex::new(),
                search: SearchEngine::new(Arc::clone(&embedder), settings.cache_size),
            }),
            embedder,
            log: Arc::new(TracingLog),
            settings,
            sources: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_log(mut self, log: SharedLog) -> Self {
        self.log = log;
        self
    }

    /// Replace the embedder used for both chunks and queries.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.retrieval.get_mut().search =
            SearchEngine::new(Arc::clone(&embedder), self.settings.cache_size);
        self.embedder = embedder;
        self
    }

    /// Open the SQLite store from config, wire the HTTP collaborators, and
    /// load persisted state.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool));

        let mut engine = RagEngine::new(store, EngineSettings::from_config(config))
            .with_fetcher(Arc::new(HttpFetcher::from_config(&config.fetch)?));
        if let Some(extractor) = HttpExtractor::from_config(&config.extraction)? {
            engine = engine.with_extractor(Arc::new(extractor));
        }

        engine.load().await.context("failed to load persisted state")?;
        Ok(engine)
    }

    /// Replace in-memory state with whatever the store holds.
    pub async fn load(&self) -> Result<()> {
        let docs: Vec<Document> = load_json(self.store.as_ref(), DOCUMENTS_KEY)
            .await?
            .unwrap_or_default();
        let index: VectorIndex = load_json(self.store.as_ref(), VECTORS_KEY)
            .await?
            .unwrap_or_default();
        let sources: Vec<ExternalSource> = load_json(self.store.as_ref(), SOURCES_KEY)
            .await?
            .unwrap_or_default();

        self.log.info(&format!(
            "loaded {} documents, {} vector sets, {} external sources",
            docs.len(),
            index.len(),
            sources.len()
        ));

        *self.sources.write().await = sources;
        *self.documents.write().await = docs;
        let mut retrieval = self.retrieval.lock().await;
        retrieval.index = index;
        retrieval.search.invalidate();
        Ok(())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ── Ingestion ──────────────────────────────────────────────────────

    /// Ingest an uploaded file's bytes.
    ///
    /// Fails only for unsupported types and store errors; see the module
    /// docs for how extraction problems are recorded instead.
    pub async fn ingest_bytes(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<Document> {
        let class =
            classify(mime, name).ok_or_else(|| RagError::UnsupportedType(mime.to_string()))?;
        let draft = DocumentDraft {
            id: new_id("doc"),
            name: name.to_string(),
            mime_type: mime.to_string(),
            size_bytes: bytes.len() as u64,
            source_id: None,
            url: None,
            description: None,
        };

        let extraction = match class {
            ContentClass::Text => decode_utf8(bytes).map(|text| Extraction {
                text,
                degraded: false,
                reason: None,
            }),
            ContentClass::Html => decode_utf8(bytes).map(|html| Extraction {
                text: strip_html(&html),
                degraded: false,
                reason: None,
            }),
            ContentClass::Binary => Ok(self.extract_binary(name, mime, bytes).await),
        };

        let (doc, records) = match extraction {
            Ok(extraction) => {
                let reason = extraction.reason.filter(|_| extraction.degraded);
                self.build_document(draft, &extraction.text, reason).await
            }
            Err(message) => {
                self.log.error(&format!("failed to parse {}: {}", name, message));
                (failed_document(draft, message), Vec::new())
            }
        };

        self.commit_document(doc.clone(), records).await?;
        self.log.info(&format!(
            "ingested {} as {} ({} chunks, vectorized: {})",
            doc.name,
            doc.id,
            doc.chunks.len(),
            doc.vectorized
        ));
        Ok(doc)
    }

    /// Ingest plain text under a display name.
    pub async fn ingest_text(&self, name: &str, text: &str) -> Result<Document> {
        self.ingest_bytes(name, MIME_PLAIN, text.as_bytes()).await
    }

    /// Read and ingest a file. The MIME type is guessed from the extension
    /// unless given.
    pub async fn ingest_file(&self, path: &Path, mime: Option<&str>) -> Result<Document> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime.unwrap_or_else(|| guess_mime(&name));
        self.ingest_bytes(&name, mime, &bytes).await
    }

    /// Ingest every supported file under `root`, skipping the rest.
    pub async fn ingest_dir(&self, root: &Path) -> Result<Vec<Document>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if classify(guess_mime(&name), &name).is_some() {
                paths.push(entry.into_path());
            }
        }

        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            docs.push(self.ingest_file(&path, None).await?);
        }
        Ok(docs)
    }

    /// Fetch a web page through the reader proxy and ingest it.
    ///
    /// Unlike file ingestion, a failed fetch is returned to the caller.
    pub async fn ingest_url(&self, url: &str) -> Result<Document> {
        let host = host_of(url)?;
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| RagError::Invalid("no content fetcher configured".to_string()))?;
        let text = fetcher.fetch_page(url).await?;

        let draft = DocumentDraft {
            id: new_id("url"),
            name: host,
            mime_type: MIME_HTML.to_string(),
            size_bytes: text.len() as u64,
            source_id: None,
            url: Some(url.to_string()),
            description: None,
        };
        let (doc, records) = self.build_document(draft, &text, None).await;
        self.commit_document(doc.clone(), records).await?;
        self.log.info(&format!("ingested {} as {}", url, doc.id));
        Ok(doc)
    }

    async fn extract_binary(&self, name: &str, mime: &str, bytes: &[u8]) -> Extraction {
        let size = bytes.len() as u64;
        let Some(extractor) = &self.extractor else {
            return Extraction::placeholder(name, mime, size, "no extraction service configured");
        };

        match extractor.extract(name, mime, bytes).await {
            Ok(extraction) => {
                if let Some(reason) = extraction.reason.as_ref().filter(|_| extraction.degraded) {
                    self.log
                        .warn(&format!("degraded extraction for {}: {}", name, reason));
                }
                extraction
            }
            Err(e) => {
                self.log.warn(&format!("extraction of {} failed: {}", name, e));
                Extraction::placeholder(name, mime, size, e.to_string())
            }
        }
    }

    /// Chunk, describe, and (unless degraded) embed `text`.
    pub(crate) async fn build_document(
        &self,
        draft: DocumentDraft,
        text: &str,
        degraded_reason: Option<String>,
    ) -> (Document, Vec<VectorRecord>) {
        let chunks = chunk_text(text, self.settings.chunk_size, self.settings.overlap);
        let mut metadata = extract_metadata(text);
        metadata.description = draft.description;

        let records = if degraded_reason.is_none() {
            self.embed_chunks(&chunks).await
        } else {
            Vec::new()
        };
        metadata.degraded_reason = degraded_reason;

        let doc = Document {
            id: draft.id,
            name: draft.name,
            mime_type: draft.mime_type,
            size_bytes: draft.size_bytes,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Parsed,
            vectorized: !chunks.is_empty() && !records.is_empty(),
            chunks,
            metadata,
            error: None,
            source_id: draft.source_id,
            url: draft.url,
        };
        (doc, records)
    }

    /// Embed a document's chunks with the whole chunk set as sibling corpus.
    ///
    /// Work proceeds in batches of `embed_batch_size` with a cooperative
    /// yield between batches.
    pub(crate) async fn embed_chunks(&self, chunks: &[Chunk]) -> Vec<VectorRecord> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let stats = CorpusStats::from_texts(&texts);

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.embed_batch_size.max(1)) {
            records.extend(batch.iter().map(|chunk| VectorRecord {
                chunk_id: chunk.id.clone(),
                vector: self.embedder.embed(&chunk.text, Some(&stats)),
                text: chunk.text.clone(),
                index: chunk.index,
            }));
            tokio::task::yield_now().await;
        }
        records
    }

    /// Insert or replace a document and its vectors, then persist.
    pub(crate) async fn commit_document(
        &self,
        doc: Document,
        records: Vec<VectorRecord>,
    ) -> Result<()> {
        {
            let mut docs = self.documents.write().await;
            let mut retrieval = self.retrieval.lock().await;
            apply_document(&mut docs, &mut retrieval, doc, records);
        }
        self.persist_documents_and_vectors().await
    }

    // ── Documents ──────────────────────────────────────────────────────

    pub async fn list_documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Delete a document and its vectors. Returns `false` for unknown ids.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut docs = self.documents.write().await;
            let mut retrieval = self.retrieval.lock().await;
            remove_document(&mut docs, &mut retrieval, id)
        };
        if removed {
            self.persist_documents_and_vectors().await?;
            self.log.info(&format!("deleted document {}", id));
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> DocumentStats {
        DocumentStats::from_documents(&self.documents.read().await)
    }

    /// Whether `doc_id` has a non-empty vector set.
    pub async fn has_vectors(&self, doc_id: &str) -> bool {
        self.retrieval.lock().await.index.has_vectors(doc_id)
    }

    // ── Search ─────────────────────────────────────────────────────────

    /// Ranked chunks for `query`. Never fails.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Arc<Vec<SearchResult>> {
        let docs = self.documents.read().await;
        let mut retrieval = self.retrieval.lock().await;
        let Retrieval { index, search } = &mut *retrieval;
        search.search(
            index,
            |id| docs.iter().find(|d| d.id == id).map(|d| d.name.clone()),
            query,
            opts,
        )
    }

    // ── Persistence ────────────────────────────────────────────────────

    pub(crate) async fn persist_documents_and_vectors(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let (docs_json, vectors_json) = {
            let docs = self.documents.read().await;
            let retrieval = self.retrieval.lock().await;
            (to_json(&*docs)?, to_json(&retrieval.index)?)
        };
        self.store.set(DOCUMENTS_KEY, &docs_json).await?;
        self.store.set(VECTORS_KEY, &vectors_json).await?;
        Ok(())
    }

    pub(crate) async fn persist_sources(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let json = to_json(&*self.sources.read().await)?;
        self.store.set(SOURCES_KEY, &json).await?;
        Ok(())
    }
}

/// Replace-or-append `doc` and its vectors; drops the search cache.
pub(crate) fn apply_document(
    docs: &mut Vec<Document>,
    retrieval: &mut Retrieval,
    doc: Document,
    records: Vec<VectorRecord>,
) {
    if records.is_empty() {
        retrieval.index.remove(&doc.id);
    } else {
        retrieval.index.insert(&doc.id, records);
    }
    retrieval.search.invalidate();

    match docs.iter_mut().find(|d| d.id == doc.id) {
        Some(existing) => *existing = doc,
        None => docs.push(doc),
    }
}

/// Remove a document and its vectors; drops the search cache.
pub(crate) fn remove_document(
    docs: &mut Vec<Document>,
    retrieval: &mut Retrieval,
    id: &str,
) -> bool {
    let before = docs.len();
    docs.retain(|d| d.id != id);
    let had_vectors = retrieval.index.remove(id).is_some();
    if had_vectors || docs.len() != before {
        retrieval.search.invalidate();
    }
    had_vectors || docs.len() != before
}

fn failed_document(draft: DocumentDraft, message: String) -> Document {
    Document {
        id: draft.id,
        name: draft.name,
        mime_type: draft.mime_type,
        size_bytes: draft.size_bytes,
        uploaded_at: Utc::now(),
        status: DocumentStatus::Error,
        chunks: Vec::new(),
        metadata: Default::default(),
        vectorized: false,
        error: Some(message),
        source_id: draft.source_id,
        url: draft.url,
    }
}

fn decode_utf8(bytes: &[u8]) -> std::result::Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8: {}", e))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value).context("failed to serialize engine state")?)
}

/// `prefix_<uuid>` with the hyphen-free uuid form.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Parse a web URL, assuming `https://` when no scheme is given.
fn parse_web_url(url: &str) -> Result<Url> {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    let parsed = Url::parse(&candidate)
        .map_err(|e| RagError::Invalid(format!("invalid URL '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RagError::Invalid(format!(
            "unsupported URL scheme '{}' in '{}'",
            parsed.scheme(),
            url
        )));
    }
    Ok(parsed)
}

/// Host name of a URL, without port or credentials.
fn host_of(url: &str) -> Result<String> {
    parse_web_url(url)?
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| RagError::Invalid(format!("URL has no host: '{}'", url)))
}
