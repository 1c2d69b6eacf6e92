//! # Rag Harness
//!
//! A local-first semantic retrieval engine. Rag Harness chunks documents,
//! embeds every chunk with a hashing TF-IDF embedder, keeps the vectors in a
//! per-document index, and answers similarity queries across uploaded
//! documents, built-in knowledge text, and synced external sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Files / URL │──▶│  RagEngine   │──▶│  KV store   │
//! │ Ext sources │   │ chunk+embed  │   │ SQLite/mem  │
//! └─────────────┘   └──────┬───────┘   └─────────────┘
//!                          │
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!        ┌───────────┐        ┌─────────────────┐
//!        │  search   │        │ query_knowledge │
//!        │ (cached)  │        │  (aggregator)   │
//!        └───────────┘        └─────────────────┘
//! ```
//!
//! The pure algorithms (tokenizer, chunker, embedder, index, search cache,
//! keywords) live in the `rag-harness-core` crate; this crate adds the
//! engine, its collaborators, persistence, and the `rh` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! rh init
//! rh ingest ./notes.md
//! rh search "ownership rules" --min-score 0.3
//! rh query "what is a lifetime"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`engine`] | Documents, ingestion, and search |
//! | [`sources`] | External-source registry and sync |
//! | [`knowledge`] | Knowledge-base aggregation |
//! | [`extract`] | Document-to-text extraction |
//! | [`fetch`] | Network fetch for sources and URLs |
//! | [`sqlite_store`] | SQLite key-value store |
//! | [`logging`] | Logging port and tracing setup |
//! | [`error`] | Error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod knowledge;
pub mod logging;
pub mod migrate;
pub mod sources;
pub mod sqlite_store;
