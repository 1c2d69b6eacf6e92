//! Knowledge-base aggregation.
//!
//! Answers one query against many configured knowledge bases and merges the
//! hits into a single context string.
//!
//! # Strategy order
//!
//! Each enabled knowledge base is tried with the strategies below, in order.
//! The first one that produces anything wins.
//!
//! | # | Strategy | Parameters | Match score |
//! |---|----------|------------|-------------|
//! | 1 | document search, scoped to `doc_ids` or the whole index | top 3, score ≥ 0.3 | 1.0 |
//! | 2 | keyword match against `default_content` | top 20 keywords, ratio > 0.2 | the ratio |
//! | 3 | external sources of the knowledge base | top 2, score ≥ 0.3 | 1.0 |
//!
//! Knowledge bases are evaluated concurrently. Matches are then
//! stable-sorted by descending match score, so equal scores keep the
//! configured order.

use futures::future::join_all;
use serde::Serialize;

use rag_harness_core::keywords::keyword_match;
use rag_harness_core::models::SearchResult;
use rag_harness_core::search::SearchOptions;

use crate::config::KnowledgeBaseConfig;
use crate::engine::RagEngine;

pub const DOCUMENT_TOP_K: usize = 3;
pub const DOCUMENT_MIN_SCORE: f32 = 0.3;
pub const EXTERNAL_TOP_K: usize = 2;
pub const EXTERNAL_MIN_SCORE: f32 = 0.3;

/// Which strategy produced a [`KnowledgeMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Documents,
    BuiltIn,
    External,
}

impl MatchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            MatchStrategy::Documents => "documents",
            MatchStrategy::BuiltIn => "built-in",
            MatchStrategy::External => "external",
        }
    }
}

/// The winning result set for one knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeMatch {
    pub knowledge_base_id: String,
    pub knowledge_base_name: String,
    pub strategy: MatchStrategy,
    pub score: f64,
    /// Ranked chunks for document and external matches.
    pub results: Vec<SearchResult>,
    /// The built-in text for keyword matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Merged answer across knowledge bases.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeContext {
    pub matches: Vec<KnowledgeMatch>,
    pub context: String,
}

impl KnowledgeContext {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl RagEngine {
    /// Query every enabled knowledge base and merge what matched.
    pub async fn query_knowledge(
        &self,
        query: &str,
        knowledge_bases: &[KnowledgeBaseConfig],
    ) -> KnowledgeContext {
        let lookups = knowledge_bases
            .iter()
            .filter(|kb| kb.enabled)
            .map(|kb| self.match_knowledge_base(query, kb));

        let mut matches: Vec<KnowledgeMatch> = join_all(lookups).await.into_iter().flatten().collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let context = format_context(&matches);
        KnowledgeContext { matches, context }
    }

    async fn match_knowledge_base(
        &self,
        query: &str,
        kb: &KnowledgeBaseConfig,
    ) -> Option<KnowledgeMatch> {
        let found = |strategy, score, results, text| KnowledgeMatch {
            knowledge_base_id: kb.id.clone(),
            knowledge_base_name: kb.name.clone(),
            strategy,
            score,
            results,
            text,
        };

        let opts = SearchOptions {
            top_k: DOCUMENT_TOP_K,
            doc_ids: kb.doc_ids.clone(),
            min_score: DOCUMENT_MIN_SCORE,
            use_cache: true,
        };
        let docs = self.search(query, &opts).await;
        if !docs.is_empty() {
            return Some(found(MatchStrategy::Documents, 1.0, docs.to_vec(), None));
        }

        if let Some(content) = &kb.default_content {
            if let Some(ratio) = keyword_match(query, content) {
                return Some(found(
                    MatchStrategy::BuiltIn,
                    ratio,
                    Vec::new(),
                    Some(content.clone()),
                ));
            }
        }

        if self.has_enabled_sources(&kb.id).await {
            let external = self
                .search_external_sources(query, &kb.id, EXTERNAL_TOP_K, EXTERNAL_MIN_SCORE)
                .await;
            if !external.is_empty() {
                return Some(found(MatchStrategy::External, 1.0, external, None));
            }
        }

        None
    }
}

/// One labeled block per match, separated by blank lines.
pub fn format_context(matches: &[KnowledgeMatch]) -> String {
    matches
        .iter()
        .map(|m| {
            let mut block = format!("[{}] ({})\n", m.knowledge_base_name, m.strategy.label());
            match &m.text {
                Some(text) => block.push_str(text.trim()),
                None => {
                    let lines: Vec<String> = m
                        .results
                        .iter()
                        .map(|r| format!("- {} #{}: {}", r.doc_name, r.index, r.text.trim()))
                        .collect();
                    block.push_str(&lines.join("\n"));
                }
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
