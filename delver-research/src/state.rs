use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use delver_core::SourceHit;
use delver_graph::{AddCounter, AppendVec, OverwriteIfSet, StateSchema};

use crate::ResearchError;

/// Immutable research request as received by the facade.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub report_organization: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub search_web: bool,
}

impl ResearchRequest {
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.topic.trim().is_empty() {
            return Err(ResearchError::InvalidRequest("topic is empty".to_string()));
        }
        if self.collection.is_empty() && !self.search_web {
            return Err(ResearchError::InvalidRequest(
                "no retrieval path: collection is empty and web search is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Strategy {
    #[default]
    #[serde(rename = "SIMPLE_RAG")]
    SimpleRag,
    #[serde(rename = "DYNAMIC_STRATEGY")]
    DynamicStrategy,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GeneratedQuery {
    pub query: String,
    #[serde(default)]
    pub report_section: String,
    #[serde(default)]
    pub rationale: String,
}

/// Outcome of one per-query retrieval step: the best hit from each path.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct PerQueryResult {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<SourceHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag: Option<SourceHit>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RelevanceJudgment {
    pub score: String,
    #[serde(default)]
    pub rationale: String,
}

impl RelevanceJudgment {
    pub fn is_relevant(&self) -> bool {
        self.score.eq_ignore_ascii_case("yes")
    }

    /// Ambiguous output falls through to "no" so retrieval continues.
    pub fn not_relevant() -> Self {
        Self {
            score: "no".to_string(),
            rationale: "judgment unavailable".to_string(),
        }
    }
}

/// Shared state carried through the research graph. List fields accumulate,
/// scalar strings overwrite when set, counters add.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ResearchState {
    // inputs
    pub topic: String,
    pub report_organization: String,
    pub collection: String,
    pub search_web: bool,
    // plan artifacts
    pub plan: String,
    pub strategy: Strategy,
    pub udf_strategy: String,
    pub udf_failed: bool,
    // working set
    pub queries: Vec<GeneratedQuery>,
    pub per_query_results: Vec<PerQueryResult>,
    // accumulators
    pub running_summary: String,
    pub sources: Vec<SourceHit>,
    pub logs: Vec<String>,
    /// How many entries of `sources` have already been folded into
    /// `running_summary`. Carried as a delta in updates.
    pub summarized_sources: u32,
    // outputs
    pub final_report: String,
    pub citations: String,
    // control
    pub reflection_count: u32,
}

impl ResearchState {
    pub fn from_request(request: &ResearchRequest) -> Self {
        Self {
            topic: request.topic.clone(),
            report_organization: request.report_organization.clone(),
            collection: request.collection.clone(),
            search_web: request.search_web,
            ..Self::default()
        }
    }

    /// Queries not yet covered by a per-query result entry.
    pub fn pending_queries(&self) -> &[GeneratedQuery] {
        &self.queries[self.per_query_results.len().min(self.queries.len())..]
    }

    /// Sources not yet folded into the running summary.
    pub fn unsummarized_sources(&self) -> &[SourceHit] {
        let from = (self.summarized_sources as usize).min(self.sources.len());
        &self.sources[from..]
    }
}

/// Appends update hits, skipping anything whose (origin, canonical citation)
/// is already present. Also dedups within the batch itself.
fn merge_sources(current: &[SourceHit], update: Vec<SourceHit>) -> Vec<SourceHit> {
    let mut out = current.to_vec();
    let mut seen: HashSet<String> = current.iter().map(SourceHit::dedup_key).collect();
    for hit in update {
        if seen.insert(hit.dedup_key()) {
            out.push(hit);
        }
    }
    out
}

impl StateSchema for ResearchState {
    fn merge(current: &Self, update: Self) -> Self {
        Self {
            topic: OverwriteIfSet::merge(&current.topic, update.topic),
            report_organization: OverwriteIfSet::merge(
                &current.report_organization,
                update.report_organization,
            ),
            collection: OverwriteIfSet::merge(&current.collection, update.collection),
            search_web: current.search_web || update.search_web,
            plan: OverwriteIfSet::merge(&current.plan, update.plan),
            strategy: if update.strategy == Strategy::default() {
                current.strategy
            } else {
                update.strategy
            },
            udf_strategy: OverwriteIfSet::merge(&current.udf_strategy, update.udf_strategy),
            udf_failed: current.udf_failed || update.udf_failed,
            queries: AppendVec::merge(&current.queries, update.queries),
            per_query_results: AppendVec::merge(
                &current.per_query_results,
                update.per_query_results,
            ),
            running_summary: OverwriteIfSet::merge(&current.running_summary, update.running_summary),
            sources: merge_sources(&current.sources, update.sources),
            logs: AppendVec::merge(&current.logs, update.logs),
            summarized_sources: AddCounter::merge(
                &current.summarized_sources,
                update.summarized_sources,
            ),
            final_report: OverwriteIfSet::merge(&current.final_report, update.final_report),
            citations: OverwriteIfSet::merge(&current.citations, update.citations),
            reflection_count: AddCounter::merge(&current.reflection_count, update.reflection_count),
        }
    }
}

/// Per-query results are collapsed to a count on the wire past this size.
pub const SNAPSHOT_RESULTS_LIMIT: usize = 20;

/// Trimmed view of [`ResearchState`] for streamed events.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StateSnapshot {
    pub topic: String,
    pub plan: String,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub udf_strategy: String,
    pub queries: Vec<GeneratedQuery>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub per_query_results: Option<Vec<PerQueryResult>>,
    pub per_query_result_count: usize,
    pub running_summary: String,
    pub sources: Vec<SourceHit>,
    pub logs: Vec<String>,
    pub final_report: String,
    pub citations: String,
    pub reflection_count: u32,
}

impl From<&ResearchState> for StateSnapshot {
    fn from(state: &ResearchState) -> Self {
        let per_query_results = if state.per_query_results.len() <= SNAPSHOT_RESULTS_LIMIT {
            Some(state.per_query_results.clone())
        } else {
            None
        };
        Self {
            topic: state.topic.clone(),
            plan: state.plan.clone(),
            strategy: state.strategy,
            udf_strategy: state.udf_strategy.clone(),
            queries: state.queries.clone(),
            per_query_results,
            per_query_result_count: state.per_query_results.len(),
            running_summary: state.running_summary.clone(),
            sources: state.sources.clone(),
            logs: state.logs.clone(),
            final_report: state.final_report.clone(),
            citations: state.citations.clone(),
            reflection_count: state.reflection_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_core::{Citation, Origin};

    fn hit(url: &str) -> SourceHit {
        SourceHit::new("text", Origin::Web, Citation::url(url))
    }

    #[test]
    fn validate_rejects_missing_retrieval_path() {
        let request = ResearchRequest {
            topic: "tariffs".into(),
            report_organization: String::new(),
            collection: String::new(),
            search_web: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_accepts_web_only_and_rag_only() {
        let web_only = ResearchRequest {
            topic: "t".into(),
            report_organization: String::new(),
            collection: String::new(),
            search_web: true,
        };
        assert!(web_only.validate().is_ok());
        let rag_only = ResearchRequest {
            topic: "t".into(),
            report_organization: String::new(),
            collection: "docs".into(),
            search_web: false,
        };
        assert!(rag_only.validate().is_ok());
    }

    #[test]
    fn merge_deduplicates_sources_by_canonical_citation() {
        let current = ResearchState {
            sources: vec![hit("https://example.com/a")],
            ..ResearchState::default()
        };
        let update = ResearchState {
            sources: vec![
                hit("https://example.com/a/"),
                hit("https://example.com/b"),
                hit("https://example.com/b#frag"),
            ],
            ..ResearchState::default()
        };
        let merged = ResearchState::merge(&current, update);
        assert_eq!(merged.sources.len(), 2);
    }

    #[test]
    fn merge_preserves_scalars_and_adds_counters() {
        let current = ResearchState {
            plan: "the plan".into(),
            strategy: Strategy::DynamicStrategy,
            reflection_count: 1,
            ..ResearchState::default()
        };
        let update = ResearchState {
            reflection_count: 1,
            logs: vec!["line".into()],
            ..ResearchState::default()
        };
        let merged = ResearchState::merge(&current, update);
        assert_eq!(merged.plan, "the plan");
        assert_eq!(merged.strategy, Strategy::DynamicStrategy);
        assert_eq!(merged.reflection_count, 2);
        assert_eq!(merged.logs.len(), 1);
    }

    #[test]
    fn pending_queries_tracks_per_query_results() {
        let mut state = ResearchState::default();
        state.queries = vec![
            GeneratedQuery {
                query: "a".into(),
                report_section: String::new(),
                rationale: String::new(),
            },
            GeneratedQuery {
                query: "b".into(),
                report_section: String::new(),
                rationale: String::new(),
            },
        ];
        state.per_query_results = vec![PerQueryResult {
            query: "a".into(),
            web: None,
            rag: None,
        }];
        let pending = state.pending_queries();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].query, "b");
    }

    #[test]
    fn snapshot_collapses_large_per_query_results() {
        let mut state = ResearchState::default();
        state.per_query_results = (0..SNAPSHOT_RESULTS_LIMIT + 1)
            .map(|i| PerQueryResult {
                query: format!("q{i}"),
                web: None,
                rag: None,
            })
            .collect();
        let snapshot = StateSnapshot::from(&state);
        assert!(snapshot.per_query_results.is_none());
        assert_eq!(snapshot.per_query_result_count, SNAPSHOT_RESULTS_LIMIT + 1);
    }
}
