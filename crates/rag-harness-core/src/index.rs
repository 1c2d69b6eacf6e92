//! Per-document vector index.
//!
//! Maps a document id to the [`VectorRecord`]s of its chunks. Documents are
//! kept in insertion order so that a search scans them deterministically;
//! replacing a document's records keeps its original position.
//!
//! The index is plain data. Persisting it after every mutation is the
//! caller's job (see `rag_harness::engine`), using the serde representation
//! below.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::VectorRecord;

/// Serialized form of one index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVectors {
    pub doc_id: String,
    pub records: Vec<VectorRecord>,
}

/// Document id → vector records, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<StoredVectors>", into = "Vec<StoredVectors>")]
pub struct VectorIndex {
    entries: HashMap<String, Vec<VectorRecord>>,
    order: Vec<String>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the records for `doc_id`.
    pub fn insert(&mut self, doc_id: &str, records: Vec<VectorRecord>) {
        if self.entries.insert(doc_id.to_string(), records).is_none() {
            self.order.push(doc_id.to_string());
        }
    }

    pub fn get(&self, doc_id: &str) -> Option<&[VectorRecord]> {
        self.entries.get(doc_id).map(Vec::as_slice)
    }

    /// Remove a document's records, returning them if present.
    pub fn remove(&mut self, doc_id: &str) -> Option<Vec<VectorRecord>> {
        let removed = self.entries.remove(doc_id)?;
        self.order.retain(|id| id != doc_id);
        Some(removed)
    }

    /// Whether `doc_id` has at least one vector record.
    pub fn has_vectors(&self, doc_id: &str) -> bool {
        self.entries.get(doc_id).is_some_and(|r| !r.is_empty())
    }

    /// Ids of documents with a non-empty record set, in insertion order.
    pub fn all_doc_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.has_vectors(id))
            .cloned()
            .collect()
    }

    /// Number of documents in the index, including empty entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total number of records across all documents.
    pub fn record_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl From<Vec<StoredVectors>> for VectorIndex {
    fn from(stored: Vec<StoredVectors>) -> Self {
        let mut index = VectorIndex::new();
        for entry in stored {
            index.insert(&entry.doc_id, entry.records);
        }
        index
    }
}

impl From<VectorIndex> for Vec<StoredVectors> {
    fn from(mut index: VectorIndex) -> Self {
        index
            .order
            .drain(..)
            .filter_map(|doc_id| {
                let records = index.entries.remove(&doc_id)?;
                Some(StoredVectors { doc_id, records })
            })
            .collect()
    }
}
