//! Key-value persistence port.
//!
//! The engine persists three JSON values, each under its own key: the
//! document list, the vector index, and the external-source registry.
//! [`KeyValueStore`] is the only storage surface the engine needs, so any
//! backend that can round-trip a string per key will do.
//!
//! | Implementation | Location |
//! |----------------|----------|
//! | [`MemoryStore`](memory::MemoryStore) | this crate, for tests and embedding |
//! | `SqliteStore` | `rag_harness::sqlite_store`, one `kv` table via sqlx |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key holding the serialized document list.
pub const DOCUMENTS_KEY: &str = "rag_documents";

/// Key holding the serialized vector index.
pub const VECTORS_KEY: &str = "rag_vectors";

/// Key holding the serialized external-source registry.
pub const SOURCES_KEY: &str = "rag_external_sources";

/// Abstract string-per-key storage backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Read and deserialize a JSON value. Absent keys yield `None`.
pub async fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse stored value for '{}'", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized + Sync,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)
        .with_context(|| format!("failed to serialize value for '{}'", key))?;
    store.set(key, &raw).await
}
