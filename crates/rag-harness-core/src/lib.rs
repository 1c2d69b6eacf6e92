//! # Rag Harness Core
//!
//! Shared, WASM-safe retrieval logic for Rag Harness: data models, the
//! tokenizer, sentence chunking, the hashing TF-IDF embedder, the per-document
//! vector index, cached similarity search, keyword matching, and the
//! key-value store abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Everything here is synchronous and deterministic except the
//! [`store::KeyValueStore`] trait, whose implementations may perform I/O.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod keywords;
pub mod models;
pub mod search;
pub mod store;
pub mod tokenize;
