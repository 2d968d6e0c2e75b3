use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

use delver_core::{
    backoff_delay, parse_json, ChatModel, ChatRequest, Citation, DelverError, Embedding, Message,
    Origin, SourceHit, VectorBackend, WebSearch,
};
use delver_graph::StepWriter;

use crate::citations::build_citation_block;
use crate::config::ResearchConfig;
use crate::judge::RelevanceJudge;
use crate::prompt_vars;
use crate::prompts;
use crate::retriever::RagRetriever;
use crate::state::{GeneratedQuery, RelevanceJudgment};
use crate::ResearchError;

/// Gap analysis produced by the reflect tool.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Reflection {
    #[serde(default)]
    pub gap: String,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// Output of the finalize tool: the report body and the citation block.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalReport {
    pub report: String,
    pub citations: String,
}

/// Placeholder tokens a finalized report must never contain.
const PLACEHOLDER_TOKENS: [&str; 4] = ["[topic]", "[section]", "[report_organization]", "[insert"];

/// The closed set of tool functions available to graph nodes and compiled
/// strategy programs.
pub struct Toolbox {
    llm: Arc<dyn ChatModel>,
    judge: RelevanceJudge,
    retriever: RagRetriever,
    web: Option<Arc<dyn WebSearch>>,
    config: ResearchConfig,
}

impl Toolbox {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedding>,
        vector_backend: Option<Arc<dyn VectorBackend>>,
        web: Option<Arc<dyn WebSearch>>,
        config: ResearchConfig,
    ) -> Self {
        let judge = RelevanceJudge::new(
            llm.clone(),
            config.instruct_model.clone(),
            config.llm_timeout,
        );
        let retriever = RagRetriever::new(
            embedder,
            vector_backend,
            config.rag_topk,
            config.embeddings_timeout,
            config.vector_store_timeout,
        );
        Self {
            llm,
            judge,
            retriever,
            web,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// One chat call with the standard retry policy: empty responses retried
    /// up to twice, transport errors and timeouts retried once with
    /// backoff, everything else surfaced immediately.
    pub(crate) async fn chat(
        &self,
        model: &str,
        prompt: String,
        json: bool,
    ) -> Result<String, DelverError> {
        let mut empty_retries = 0usize;
        let mut transport_retries = 0usize;
        loop {
            let mut request = ChatRequest::new(model, vec![Message::user(prompt.clone())]);
            if json {
                request = request.json();
            }
            let outcome = match timeout(self.config.llm_timeout, self.llm.invoke(request)).await {
                Ok(result) => result,
                Err(_) => Err(DelverError::Timeout(self.config.llm_timeout)),
            };
            match outcome {
                Ok(response) => return Ok(response.content),
                Err(DelverError::EmptyResponse) if empty_retries < 2 => {
                    empty_retries += 1;
                }
                Err(err @ (DelverError::LlmProvider(_) | DelverError::Timeout(_)))
                    if transport_retries < 1 =>
                {
                    tracing::debug!(error = %err, "retrying LLM call");
                    transport_retries += 1;
                    sleep(backoff_delay(1)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Single LLM call that must emit a strict JSON array of queries; parse
    /// failures are retried with the error fed back into the prompt.
    pub async fn generate_queries(
        &self,
        topic: &str,
        report_organization: &str,
        count: usize,
        writer: &StepWriter,
    ) -> Result<Vec<GeneratedQuery>, ResearchError> {
        let base = prompts::QUERY_GENERATION.render(&prompt_vars! {
            "topic" => topic,
            "report_organization" => report_organization,
            "count" => count,
        });

        let mut feedback: Option<String> = None;
        let mut last_reason = String::new();
        for _attempt in 0..3 {
            let prompt = match &feedback {
                Some(reason) => format!(
                    "{base}\n\nYour previous output could not be parsed: {reason}\nOutput ONLY the JSON array."
                ),
                None => base.clone(),
            };
            let content = self
                .chat(&self.config.instruct_model, prompt, true)
                .await
                .map_err(|err| ResearchError::QueryGenerationFailed(err.to_string()))?;
            match parse_json::<Vec<GeneratedQuery>>(&content) {
                Ok(queries) => {
                    let mut queries: Vec<GeneratedQuery> = queries
                        .into_iter()
                        .filter(|q| !q.query.trim().is_empty())
                        .collect();
                    queries.truncate(count);
                    writer.write(format!("generated {} queries", queries.len()));
                    return Ok(queries);
                }
                Err(err) => {
                    last_reason = err.to_string();
                    feedback = Some(last_reason.clone());
                }
            }
        }
        Err(ResearchError::QueryGenerationFailed(last_reason))
    }

    /// Web search: never fatal. A transport failure is retried once with
    /// backoff, then downgraded to an empty result.
    pub async fn search_web(&self, query: &str, writer: &StepWriter) -> Vec<SourceHit> {
        let Some(web) = &self.web else {
            writer.write("web search not configured; skipping");
            tracing::warn!("web search requested but no provider is configured");
            return Vec::new();
        };

        let mut attempt = 0usize;
        let pages = loop {
            match timeout(self.config.web_search_timeout, web.search(query)).await {
                Ok(Ok(pages)) => break pages,
                Ok(Err(err)) if attempt == 0 => {
                    tracing::debug!(%query, error = %err, "web search failed, retrying");
                    attempt += 1;
                    sleep(backoff_delay(1)).await;
                }
                Err(_) if attempt == 0 => {
                    attempt += 1;
                    sleep(backoff_delay(1)).await;
                }
                Ok(Err(err)) => {
                    writer.write(format!("web search unavailable for '{query}': {err}"));
                    tracing::warn!(%query, error = %err, "web search unavailable");
                    return Vec::new();
                }
                Err(_) => {
                    writer.write(format!("web search timed out for '{query}'"));
                    tracing::warn!(%query, "web search timed out");
                    return Vec::new();
                }
            }
        };

        let hits: Vec<SourceHit> = pages
            .into_iter()
            .take(self.config.web_topk)
            .filter(|page| !page.text.trim().is_empty())
            .map(|page| SourceHit::new(page.text, Origin::Web, Citation::url(page.url)))
            .collect();
        writer.write(format!("web search for '{query}' returned {} hits", hits.len()));
        hits
    }

    /// Vector retrieval against the request's collection. Never fatal.
    pub async fn search_rag(
        &self,
        collection: &str,
        query: &str,
        writer: &StepWriter,
    ) -> Vec<SourceHit> {
        let hits = self.retriever.retrieve(collection, query, writer).await;
        if !collection.is_empty() {
            writer.write(format!(
                "document search for '{query}' returned {} hits",
                hits.len()
            ));
        }
        hits
    }

    pub async fn judge_relevance(
        &self,
        query: &str,
        candidate: &str,
        writer: &StepWriter,
    ) -> RelevanceJudgment {
        self.judge.judge(query, candidate, writer).await
    }

    /// Extends `prior_summary` with the new hits. The prior summary is kept
    /// verbatim as a prefix; only the extension is clamped so the total
    /// stays within the configured character limit.
    pub async fn summarize(
        &self,
        label: &str,
        hits: &[SourceHit],
        prior_summary: &str,
        writer: &StepWriter,
    ) -> Result<String, DelverError> {
        let snippets = hits
            .iter()
            .map(|hit| format!("- [{}] {}", hit.citation, hit.text))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::SUMMARIZER.render(&prompt_vars! {
            "topic" => label,
            "prior_summary" => prior_summary,
            "snippets" => snippets,
            "char_limit" => self.config.summary_char_limit,
        });
        let extension = self
            .chat(&self.config.instruct_model, prompt, false)
            .await?;
        let extension = extension.trim();

        let mut summary = if prior_summary.is_empty() {
            extension.to_string()
        } else if extension.is_empty() {
            prior_summary.to_string()
        } else {
            format!("{prior_summary}\n\n{extension}")
        };
        let limit = self.config.summary_char_limit.max(prior_summary.chars().count());
        if summary.chars().count() > limit {
            summary = summary.chars().take(limit).collect();
        }
        writer.write(format!("summarized {} new hits", hits.len()));
        Ok(summary)
    }

    /// Identifies at most two follow-up queries that would close gaps in
    /// the running summary.
    pub async fn reflect(
        &self,
        topic: &str,
        running_summary: &str,
        writer: &StepWriter,
    ) -> Result<Reflection, DelverError> {
        let prompt = prompts::REFLECTION.render(&prompt_vars! {
            "topic" => topic,
            "running_summary" => running_summary,
        });
        let content = self
            .chat(&self.config.reasoning_model, prompt, true)
            .await?;
        let mut reflection: Reflection = parse_json(&content)?;
        reflection
            .follow_up_queries
            .retain(|query| !query.trim().is_empty());
        reflection.follow_up_queries.truncate(2);
        writer.write(format!(
            "reflection found {} follow-up queries",
            reflection.follow_up_queries.len()
        ));
        Ok(reflection)
    }

    /// Composes the final report and the citation block. The report is
    /// guaranteed non-empty and placeholder-free: a violating LLM response
    /// is retried once, then the running summary itself is used as the body.
    pub async fn finalize(
        &self,
        topic: &str,
        report_organization: &str,
        running_summary: &str,
        sources: &[SourceHit],
        writer: &StepWriter,
    ) -> Result<FinalReport, DelverError> {
        let citations = build_citation_block(sources);
        let prompt = prompts::FINALIZER.render(&prompt_vars! {
            "topic" => topic,
            "report_organization" => report_organization,
            "running_summary" => running_summary,
        });

        let mut report = String::new();
        for attempt in 0..2 {
            match self.chat(&self.config.instruct_model, prompt.clone(), false).await {
                Ok(content) => {
                    let content = content.trim().to_string();
                    if !content.is_empty() && !contains_placeholder(&content) {
                        report = content;
                        break;
                    }
                    tracing::debug!(attempt, "finalizer output rejected");
                }
                Err(err) if attempt == 0 => {
                    tracing::debug!(error = %err, "finalizer call failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        if report.is_empty() {
            report = if running_summary.is_empty() {
                format!("No research material was gathered for \"{topic}\".")
            } else {
                running_summary.to_string()
            };
        }
        writer.write("final report composed");
        Ok(FinalReport { report, citations })
    }
}

fn contains_placeholder(report: &str) -> bool {
    let lowered = report.to_lowercase();
    PLACEHOLDER_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}
