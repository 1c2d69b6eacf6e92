//! Core data models shared by the ingestion, indexing, and retrieval layers.
//!
//! Every type here is serde-serializable because documents, vectors, and
//! external sources are persisted as JSON through the
//! [`KeyValueStore`](crate::store::KeyValueStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion state of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Parsing,
    Parsed,
    Error,
}

/// A bounded span of a document's text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Derived from `index` (`chunk_{index}`).
    pub id: String,
    /// Position within the document, contiguous from 0.
    pub index: usize,
    pub text: String,
    /// Character offset of the chunk's first character in the source text.
    pub start: usize,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Descriptive statistics computed from a document's extracted text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub word_count: usize,
    pub char_count: usize,
    pub line_count: usize,
    /// `"zh"` or `"en"`.
    pub language: String,
    pub keywords: Vec<String>,
    /// Set when extraction produced placeholder or too-short text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    /// Free-form description, used by documents derived from external sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An ingested document and its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub chunks: Vec<Chunk>,
    pub metadata: ContentMetadata,
    /// True iff the document has at least one chunk and a non-empty vector set.
    pub vectorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Owning external source, for documents produced by a sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The embedding of one chunk, owned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub index: usize,
}

/// A ranked chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub doc_id: String,
    pub doc_name: String,
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
    pub index: usize,
}

/// How an external source's content is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Website,
    Api,
    Database,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Website => "website",
            SourceKind::Api => "api",
            SourceKind::Database => "database",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(SourceKind::Website),
            "api" => Ok(SourceKind::Api),
            "database" => Ok(SourceKind::Database),
            other => Err(format!(
                "unknown source kind '{}': expected website, api, or database",
                other
            )),
        }
    }
}

/// Lifecycle of an external source sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

/// A remotely fetched content origin mirrored into the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub description: String,
    pub knowledge_base_id: Option<String>,
    pub enabled: bool,
    pub added_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ExternalSource {
    /// Id of the document holding this source's synced content.
    pub fn document_id(&self) -> String {
        external_document_id(&self.id)
    }
}

/// Derive the document id bound to an external source id.
pub fn external_document_id(source_id: &str) -> String {
    format!("ext_doc_{}", source_id)
}

/// Aggregate counts over the document collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total: usize,
    pub parsed: usize,
    pub parsing: usize,
    pub error: usize,
    pub vectorized: usize,
    pub total_chunks: usize,
}

impl DocumentStats {
    pub fn from_documents(docs: &[Document]) -> Self {
        let count = |status: DocumentStatus| docs.iter().filter(|d| d.status == status).count();
        Self {
            total: docs.len(),
            parsed: count(DocumentStatus::Parsed),
            parsing: count(DocumentStatus::Parsing),
            error: count(DocumentStatus::Error),
            vectorized: docs.iter().filter(|d| d.vectorized).count(),
            total_chunks: docs.iter().map(|d| d.chunks.len()).sum(),
        }
    }
}
