use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use delver_core::{parse_json, ChatModel, ChatRequest, Message};
use delver_graph::StepWriter;

use crate::prompts;
use crate::state::RelevanceJudgment;
use crate::prompt_vars;

/// Scores a candidate answer's relevance to a query. Any ambiguity — a
/// provider failure, malformed JSON, an unexpected score value — falls
/// through to "no" so the caller continues retrieving.
pub struct RelevanceJudge {
    llm: Arc<dyn ChatModel>,
    model: String,
    call_timeout: Duration,
}

impl RelevanceJudge {
    pub fn new(llm: Arc<dyn ChatModel>, model: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            llm,
            model: model.into(),
            call_timeout,
        }
    }

    pub async fn judge(
        &self,
        query: &str,
        candidate: &str,
        writer: &StepWriter,
    ) -> RelevanceJudgment {
        if candidate.trim().is_empty() {
            return RelevanceJudgment::not_relevant();
        }

        let prompt = prompts::RELEVANCE_JUDGE.render(&prompt_vars! {
            "query" => query,
            "candidate" => candidate,
        });
        let request =
            ChatRequest::new(self.model.clone(), vec![Message::user(prompt)]).json();

        let content = match timeout(self.call_timeout, self.llm.invoke(request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(err)) => {
                writer.write(format!("relevance judgment unavailable: {err}"));
                tracing::warn!(%query, error = %err, "relevance judge call failed");
                return RelevanceJudgment::not_relevant();
            }
            Err(_) => {
                writer.write("relevance judgment unavailable: timed out");
                return RelevanceJudgment::not_relevant();
            }
        };

        match parse_json::<RelevanceJudgment>(&content) {
            Ok(judgment) if judgment.score.eq_ignore_ascii_case("yes")
                || judgment.score.eq_ignore_ascii_case("no") =>
            {
                judgment
            }
            _ => RelevanceJudgment::not_relevant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use delver_core::{ChatResponse, DelverError};

    struct Scripted(&'static str);

    #[async_trait]
    impl ChatModel for Scripted {
        async fn invoke(&self, _request: ChatRequest) -> Result<ChatResponse, DelverError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
            })
        }
    }

    fn judge(content: &'static str) -> RelevanceJudge {
        RelevanceJudge::new(Arc::new(Scripted(content)), "judge", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn yes_judgment_is_relevant() {
        let writer = StepWriter::new();
        let judgment = judge(r#"{"score": "yes", "rationale": "covers it"}"#)
            .judge("q", "answer", &writer)
            .await;
        assert!(judgment.is_relevant());
    }

    #[tokio::test]
    async fn ambiguous_score_defaults_to_no() {
        let writer = StepWriter::new();
        let judgment = judge(r#"{"score": "maybe", "rationale": "?"}"#)
            .judge("q", "answer", &writer)
            .await;
        assert!(!judgment.is_relevant());
    }

    #[tokio::test]
    async fn empty_candidate_is_not_relevant_without_a_call() {
        let writer = StepWriter::new();
        let judgment = judge("unused").judge("q", "  ", &writer).await;
        assert!(!judgment.is_relevant());
    }
}
