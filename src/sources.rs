//! External sources: registry, sync, and search.
//!
//! An external source is a remote web page or JSON API mirrored into the
//! vector index. Its content always lives in the single document
//! `ext_doc_<source id>`, which every sync overwrites.
//!
//! # Sync lifecycle
//!
//! ```text
//!   idle ──sync──▶ syncing ──ok──▶ success
//!                     │               │
//!                     └──err──▶ error ┘  (any state may sync again)
//! ```
//!
//! A failed sync records the message on the source and returns
//! [`RagError::SyncFailed`]. If the source is removed while its content is
//! still being fetched, the fetched content is discarded.

use chrono::Utc;
use futures::future::join_all;

use rag_harness_core::models::{
    external_document_id, Document, ExternalSource, SearchResult, SourceKind, SyncStatus,
};
use rag_harness_core::search::{rank_records, Candidate};

use crate::engine::{apply_document, new_id, remove_document, DocumentDraft, RagEngine};
use crate::error::{RagError, Result};
use crate::extract::{MIME_JSON, MIME_PLAIN};

/// Input for [`RagEngine::add_source`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub description: String,
    pub knowledge_base_id: Option<String>,
}

impl NewSource {
    pub fn website(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: SourceKind::Website,
            description: String::new(),
            knowledge_base_id: None,
        }
    }

    pub fn kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn knowledge_base(mut self, id: impl Into<String>) -> Self {
        self.knowledge_base_id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl RagEngine {
    /// Register a new, enabled source in the `idle` state.
    pub async fn add_source(&self, new: NewSource) -> Result<ExternalSource> {
        if new.url.trim().is_empty() {
            return Err(RagError::Invalid("source url must not be empty".to_string()));
        }
        let name = if new.name.trim().is_empty() {
            new.url.clone()
        } else {
            new.name
        };

        let source = ExternalSource {
            id: new_id("ext"),
            name,
            url: new.url,
            kind: new.kind,
            description: new.description,
            knowledge_base_id: new.knowledge_base_id,
            enabled: true,
            added_at: Utc::now(),
            last_sync_at: None,
            sync_status: SyncStatus::Idle,
            last_error: None,
        };

        self.sources.write().await.push(source.clone());
        self.persist_sources().await?;
        self.log.info(&format!(
            "added {} source {} ({})",
            source.kind.as_str(),
            source.id,
            source.url
        ));
        Ok(source)
    }

    /// Remove a source together with its synced document and vectors.
    /// Returns `false` for unknown ids.
    pub async fn remove_source(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut sources = self.sources.write().await;
            let before = sources.len();
            sources.retain(|s| s.id != id);
            if sources.len() == before {
                false
            } else {
                let mut docs = self.documents.write().await;
                let mut retrieval = self.retrieval.lock().await;
                remove_document(&mut docs, &mut retrieval, &external_document_id(id));
                true
            }
        };

        if removed {
            self.persist_sources().await?;
            self.persist_documents_and_vectors().await?;
            self.log.info(&format!("removed source {}", id));
        }
        Ok(removed)
    }

    /// All sources, or those of one knowledge base.
    pub async fn list_sources(&self, knowledge_base_id: Option<&str>) -> Vec<ExternalSource> {
        self.sources
            .read()
            .await
            .iter()
            .filter(|s| match knowledge_base_id {
                Some(kb) => s.knowledge_base_id.as_deref() == Some(kb),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub async fn get_source(&self, id: &str) -> Option<ExternalSource> {
        self.sources.read().await.iter().find(|s| s.id == id).cloned()
    }

    pub async fn set_source_enabled(&self, id: &str, enabled: bool) -> Result<ExternalSource> {
        let updated = {
            let mut sources = self.sources.write().await;
            let source = sources
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| RagError::not_found("source", id))?;
            source.enabled = enabled;
            source.clone()
        };
        self.persist_sources().await?;
        Ok(updated)
    }

    /// Fetch a source, rebuild its document and vectors, and record the
    /// outcome on the source.
    pub async fn sync_source(&self, id: &str) -> Result<Document> {
        let source = {
            let mut sources = self.sources.write().await;
            let source = sources
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| RagError::not_found("source", id))?;
            source.sync_status = SyncStatus::Syncing;
            source.last_error = None;
            source.clone()
        };
        self.persist_sources().await?;
        self.log.info(&format!("syncing source {} ({})", source.id, source.url));

        let content = match self.fetch_source(&source).await {
            Ok(content) => content,
            Err(e) => return Err(self.fail_sync(&source.id, e.to_string()).await),
        };

        let draft = DocumentDraft {
            id: source.document_id(),
            name: source.name.clone(),
            mime_type: match source.kind {
                SourceKind::Api => MIME_JSON,
                _ => MIME_PLAIN,
            }
            .to_string(),
            size_bytes: content.len() as u64,
            source_id: Some(source.id.clone()),
            url: Some(source.url.clone()),
            description: (!source.description.is_empty()).then(|| source.description.clone()),
        };
        let (doc, records) = self.build_document(draft, &content, None).await;

        let committed = {
            let mut sources = self.sources.write().await;
            match sources.iter_mut().find(|s| s.id == source.id) {
                Some(entry) => {
                    let mut docs = self.documents.write().await;
                    let mut retrieval = self.retrieval.lock().await;
                    apply_document(&mut docs, &mut retrieval, doc.clone(), records);
                    entry.sync_status = SyncStatus::Success;
                    entry.last_sync_at = Some(Utc::now());
                    entry.last_error = None;
                    true
                }
                None => false,
            }
        };

        if !committed {
            self.log.warn(&format!(
                "source {} was removed during sync; discarding fetched content",
                source.id
            ));
            return Err(RagError::not_found("source", source.id));
        }

        self.persist_documents_and_vectors().await?;
        self.persist_sources().await?;
        self.log.info(&format!(
            "synced source {}: {} chunks",
            source.id,
            doc.chunks.len()
        ));
        Ok(doc)
    }

    async fn fetch_source(&self, source: &ExternalSource) -> Result<String> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| RagError::Invalid("no content fetcher configured".to_string()))?;

        match source.kind {
            SourceKind::Website => fetcher.fetch_page(&source.url).await,
            SourceKind::Api => {
                let json = fetcher.fetch_json(&source.url).await?;
                serde_json::to_string_pretty(&json)
                    .map_err(|e| RagError::Invalid(format!("cannot render API response: {}", e)))
            }
            SourceKind::Database => Err(RagError::Invalid(
                "database sources cannot be fetched".to_string(),
            )),
        }
    }

    /// Mark a source as failed and build the error returned to the caller.
    async fn fail_sync(&self, id: &str, message: String) -> RagError {
        {
            let mut sources = self.sources.write().await;
            if let Some(source) = sources.iter_mut().find(|s| s.id == id) {
                source.sync_status = SyncStatus::Error;
                source.last_error = Some(message.clone());
            }
        }
        if let Err(e) = self.persist_sources().await {
            self.log
                .error(&format!("failed to persist sync error for {}: {}", id, e));
        }
        self.log.error(&format!("sync of source {} failed: {}", id, message));
        RagError::SyncFailed {
            source_id: id.to_string(),
            message,
        }
    }

    /// Search the enabled sources of a knowledge base.
    ///
    /// Sources that have no vectors and no successful sync are synced first,
    /// concurrently; sources whose sync fails are skipped. Results bypass the query cache. Never fails.
    pub async fn search_external_sources(
        &self,
        query: &str,
        knowledge_base_id: &str,
        top_k: usize,
        min_score: f32,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let enabled = self.enabled_sources(knowledge_base_id).await;
        if enabled.is_empty() {
            return Vec::new();
        }

        // A successful sync of empty content leaves no vectors but is final.
        let mut unsynced = Vec::new();
        for source in &enabled {
            if source.sync_status != SyncStatus::Success
                && !self.has_vectors(&source.document_id()).await
            {
                unsynced.push(source.id.clone());
            }
        }
        let outcomes = join_all(unsynced.iter().map(|id| self.sync_source(id))).await;
        for (id, outcome) in unsynced.iter().zip(outcomes) {
            if let Err(e) = outcome {
                self.log.warn(&format!("skipping source {}: {}", id, e));
            }
        }

        let query_vec = self.embedder.embed(query, None);

        // Re-read the registry: a source may have been removed or disabled
        // while the syncs above were in flight.
        let current = self.enabled_sources(knowledge_base_id).await;
        let retrieval = self.retrieval.lock().await;
        let doc_ids: Vec<String> = current.iter().map(|s| s.document_id()).collect();
        let candidates = current.iter().zip(&doc_ids).filter_map(|(source, doc_id)| {
            retrieval.index.get(doc_id).map(|records| Candidate {
                doc_id,
                doc_name: &source.name,
                records,
            })
        });
        rank_records(&query_vec, candidates, top_k, min_score)
    }

    async fn enabled_sources(&self, knowledge_base_id: &str) -> Vec<ExternalSource> {
        self.sources
            .read()
            .await
            .iter()
            .filter(|s| s.enabled && s.knowledge_base_id.as_deref() == Some(knowledge_base_id))
            .cloned()
            .collect()
    }

    /// Whether a knowledge base has at least one enabled source.
    pub async fn has_enabled_sources(&self, knowledge_base_id: &str) -> bool {
        self.sources
            .read()
            .await
            .iter()
            .any(|s| s.enabled && s.knowledge_base_id.as_deref() == Some(knowledge_base_id))
    }
}
