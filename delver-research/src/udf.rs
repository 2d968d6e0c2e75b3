use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use delver_core::{parse_json, SourceHit};
use delver_graph::StepWriter;

use crate::prompt_vars;
use crate::prompts;
use crate::state::ResearchState;
use crate::tools::Toolbox;
use crate::ResearchError;

/// The closed allow-list of operations a compiled strategy may invoke.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UdfOp {
    SearchWeb,
    SearchRag,
    Summarize,
    JudgeRelevance,
    Reflect,
    Finalize,
    Noop,
}

impl fmt::Display for UdfOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UdfOp::SearchWeb => "search_web",
            UdfOp::SearchRag => "search_rag",
            UdfOp::Summarize => "summarize",
            UdfOp::JudgeRelevance => "judge_relevance",
            UdfOp::Reflect => "reflect",
            UdfOp::Finalize => "finalize",
            UdfOp::Noop => "noop",
        };
        write!(f, "{name}")
    }
}

/// One step of a compiled strategy program. Arguments are literals or
/// `$name` references to an earlier step's bind.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UdfStep {
    pub op: UdfOp,
    #[serde(default)]
    pub args: JsonMap<String, Value>,
    #[serde(default)]
    pub bind: Option<String>,
}

impl UdfStep {
    pub fn finalize() -> Self {
        Self {
            op: UdfOp::Finalize,
            args: JsonMap::new(),
            bind: None,
        }
    }
}

/// Result of compiling and executing a dynamic strategy.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct UdfOutcome {
    pub success: bool,
    pub report: String,
    pub citations: String,
    pub sources: Vec<SourceHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UdfOutcome {
    fn failed(error: impl Into<String>, sources: Vec<SourceHit>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            sources,
            ..Self::default()
        }
    }
}

/// Compiles a natural-language strategy into a bounded step list over the
/// tool layer and executes it.
pub struct UdfEngine {
    tools: Arc<Toolbox>,
}

impl UdfEngine {
    pub fn new(tools: Arc<Toolbox>) -> Self {
        Self { tools }
    }

    pub async fn run(&self, state: &ResearchState, writer: &StepWriter) -> UdfOutcome {
        let steps = match self.compile(state, writer).await {
            Ok(steps) => steps,
            Err(err) => {
                writer.write(format!("{err}"));
                tracing::warn!(error = %err, "strategy compilation failed");
                return UdfOutcome::failed(err.to_string(), Vec::new());
            }
        };
        self.execute(state, steps, writer).await
    }

    /// Stage A: one LLM call producing the step list, parse failures retried
    /// with the error fed back, then structural validation.
    pub async fn compile(
        &self,
        state: &ResearchState,
        writer: &StepWriter,
    ) -> Result<Vec<UdfStep>, ResearchError> {
        let max_steps = self.tools.config().udf_max_steps;
        let base = prompts::UDF_COMPILER.render(&prompt_vars! {
            "udf_strategy" => state.udf_strategy,
            "topic" => state.topic,
            "collection" => state.collection,
            "max_steps" => max_steps,
        });

        let mut feedback: Option<String> = None;
        let mut last_reason = String::new();
        let mut steps: Option<Vec<UdfStep>> = None;
        for _attempt in 0..3 {
            let prompt = match &feedback {
                Some(reason) => format!(
                    "{base}\n\nYour previous output could not be parsed: {reason}\nOutput ONLY the JSON array."
                ),
                None => base.clone(),
            };
            let content = self
                .tools
                .chat(&self.tools.config().reasoning_model, prompt, true)
                .await
                .map_err(|err| ResearchError::UdfCompilationFailed(err.to_string()))?;
            match parse_json::<Vec<UdfStep>>(&content) {
                Ok(parsed) => {
                    steps = Some(parsed);
                    break;
                }
                Err(err) => {
                    last_reason = err.to_string();
                    feedback = Some(last_reason.clone());
                }
            }
        }
        let mut steps =
            steps.ok_or_else(|| ResearchError::UdfCompilationFailed(last_reason.clone()))?;

        validate_program(&steps, max_steps)?;

        if steps.is_empty() {
            writer.write("compiled program is empty; synthesizing a finalize step");
            steps.push(UdfStep::finalize());
        } else if steps.last().map(|step| step.op) != Some(UdfOp::Finalize) {
            writer.write("compiled program does not end in finalize; appending one");
            steps.push(UdfStep::finalize());
        }
        writer.write(format!("compiled strategy into {} steps", steps.len()));
        Ok(steps)
    }

    /// Stage B: walk the steps, resolving `$name` references against the
    /// bind environment. Empty retrievals continue with an empty bind; a
    /// fatal tool error aborts the program.
    pub async fn execute(
        &self,
        state: &ResearchState,
        steps: Vec<UdfStep>,
        writer: &StepWriter,
    ) -> UdfOutcome {
        let mut env: HashMap<String, Value> = HashMap::new();
        let mut collected: Vec<SourceHit> = Vec::new();
        let mut summarized = 0usize;
        let mut summary = state.running_summary.clone();
        let mut report = String::new();
        let mut citations = String::new();

        for (position, step) in steps.into_iter().enumerate() {
            let index = position + 1;
            writer.write(format!("UDF step {index}: {}({})", step.op, describe_args(&step.args)));

            let bound: Value = match step.op {
                UdfOp::Noop => Value::Null,
                UdfOp::SearchWeb => {
                    if !state.search_web {
                        writer.write("web search disabled for this request; empty result");
                        Value::Array(Vec::new())
                    } else {
                        let query = arg_text(&env, &step.args, "query");
                        let hits = self.tools.search_web(&query, writer).await;
                        collected.extend(hits.clone());
                        serde_json::to_value(hits).unwrap_or(Value::Array(Vec::new()))
                    }
                }
                UdfOp::SearchRag => {
                    let query = arg_text(&env, &step.args, "query");
                    let collection = {
                        let explicit = arg_text(&env, &step.args, "collection");
                        if explicit.is_empty() {
                            state.collection.clone()
                        } else {
                            explicit
                        }
                    };
                    let hits = self.tools.search_rag(&collection, &query, writer).await;
                    collected.extend(hits.clone());
                    serde_json::to_value(hits).unwrap_or(Value::Array(Vec::new()))
                }
                UdfOp::Summarize => {
                    let hits = arg_hits(&env, &step.args, "hits")
                        .unwrap_or_else(|| collected[summarized.min(collected.len())..].to_vec());
                    if hits.is_empty() {
                        Value::String(summary.clone())
                    } else {
                        match self
                            .tools
                            .summarize(&state.topic, &hits, &summary, writer)
                            .await
                        {
                            Ok(extended) => {
                                summary = extended;
                                summarized = collected.len();
                                Value::String(summary.clone())
                            }
                            Err(err) => {
                                return UdfOutcome::failed(
                                    format!("summarize failed at step {index}: {err}"),
                                    collected,
                                )
                            }
                        }
                    }
                }
                UdfOp::JudgeRelevance => {
                    let query = arg_text(&env, &step.args, "query");
                    let answer = arg_text(&env, &step.args, "answer");
                    let judgment = self.tools.judge_relevance(&query, &answer, writer).await;
                    serde_json::to_value(judgment).unwrap_or(Value::Null)
                }
                UdfOp::Reflect => {
                    match self.tools.reflect(&state.topic, &summary, writer).await {
                        Ok(reflection) => serde_json::to_value(reflection).unwrap_or(Value::Null),
                        Err(err) => {
                            return UdfOutcome::failed(
                                format!("reflect failed at step {index}: {err}"),
                                collected,
                            )
                        }
                    }
                }
                UdfOp::Finalize => {
                    match self
                        .tools
                        .finalize(
                            &state.topic,
                            &state.report_organization,
                            &summary,
                            &collected,
                            writer,
                        )
                        .await
                    {
                        Ok(final_report) => {
                            report = final_report.report;
                            citations = final_report.citations;
                            Value::String(report.clone())
                        }
                        Err(err) => {
                            return UdfOutcome::failed(
                                format!("finalize failed at step {index}: {err}"),
                                collected,
                            )
                        }
                    }
                }
            };

            if let Some(bind) = step.bind {
                env.insert(bind, bound);
            }
        }

        if report.is_empty() {
            return UdfOutcome::failed("program produced no report", collected);
        }

        UdfOutcome {
            success: true,
            report,
            citations,
            sources: collected,
            error: None,
        }
    }
}

/// Rejects programs with too many steps, duplicate binds, or references to
/// binds that are undefined at the point of use.
pub fn validate_program(steps: &[UdfStep], max_steps: usize) -> Result<(), ResearchError> {
    if steps.len() > max_steps {
        return Err(ResearchError::UdfCompilationFailed(format!(
            "program has {} steps, limit is {max_steps}",
            steps.len()
        )));
    }

    let mut defined: HashSet<&str> = HashSet::new();
    for (position, step) in steps.iter().enumerate() {
        for value in step.args.values() {
            if let Some(name) = reference_name(value) {
                if !defined.contains(name) {
                    return Err(ResearchError::UdfCompilationFailed(format!(
                        "step {} references undefined bind '${name}'",
                        position + 1
                    )));
                }
            }
        }
        if let Some(bind) = &step.bind {
            if !defined.insert(bind.as_str()) {
                return Err(ResearchError::UdfCompilationFailed(format!(
                    "duplicate bind '{bind}'"
                )));
            }
        }
    }
    Ok(())
}

fn reference_name(value: &Value) -> Option<&str> {
    value.as_str().and_then(|s| s.strip_prefix('$'))
}

fn resolve<'v>(env: &'v HashMap<String, Value>, value: &'v Value) -> &'v Value {
    match reference_name(value).and_then(|name| env.get(name)) {
        Some(bound) => bound,
        None => value,
    }
}

/// Renders an argument as text: strings verbatim, hit arrays as joined
/// snippets, anything else as JSON.
fn arg_text(env: &HashMap<String, Value>, args: &JsonMap<String, Value>, key: &str) -> String {
    let Some(value) = args.get(key) else {
        return String::new();
    };
    let resolved = resolve(env, value);
    match resolved {
        Value::String(text) => text.clone(),
        Value::Array(_) => match serde_json::from_value::<Vec<SourceHit>>(resolved.clone()) {
            Ok(hits) => hits
                .iter()
                .map(|hit| hit.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => resolved.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn arg_hits(
    env: &HashMap<String, Value>,
    args: &JsonMap<String, Value>,
    key: &str,
) -> Option<Vec<SourceHit>> {
    let value = args.get(key)?;
    let resolved = resolve(env, value);
    serde_json::from_value(resolved.clone()).ok()
}

fn describe_args(args: &JsonMap<String, Value>) -> String {
    args.iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => {
                    let mut text = text.clone();
                    if text.chars().count() > 40 {
                        text = text.chars().take(40).collect::<String>() + "…";
                    }
                    format!("'{text}'")
                }
                other => other.to_string(),
            };
            format!("{key}={rendered}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(op: UdfOp, args: Value, bind: Option<&str>) -> UdfStep {
        UdfStep {
            op,
            args: args.as_object().cloned().unwrap_or_default(),
            bind: bind.map(str::to_string),
        }
    }

    #[test]
    fn unknown_op_fails_to_parse() {
        let raw = r#"[{"op": "rm_rf", "args": {}}]"#;
        assert!(parse_json::<Vec<UdfStep>>(raw).is_err());
    }

    #[test]
    fn forward_reference_is_rejected() {
        let steps = vec![
            step(
                UdfOp::Summarize,
                serde_json::json!({"hits": "$web1"}),
                None,
            ),
            step(
                UdfOp::SearchWeb,
                serde_json::json!({"query": "q"}),
                Some("web1"),
            ),
        ];
        let err = validate_program(&steps, 12).unwrap_err();
        assert!(err.to_string().contains("undefined bind '$web1'"));
    }

    #[test]
    fn duplicate_bind_is_rejected() {
        let steps = vec![
            step(UdfOp::SearchWeb, serde_json::json!({"query": "a"}), Some("x")),
            step(UdfOp::SearchWeb, serde_json::json!({"query": "b"}), Some("x")),
        ];
        assert!(validate_program(&steps, 12).is_err());
    }

    #[test]
    fn oversized_program_is_rejected() {
        let steps: Vec<UdfStep> = (0..13)
            .map(|_| step(UdfOp::Noop, serde_json::json!({}), None))
            .collect();
        let err = validate_program(&steps, 12).unwrap_err();
        assert!(matches!(err, ResearchError::UdfCompilationFailed(_)));
    }

    #[test]
    fn valid_program_passes() {
        let steps = vec![
            step(
                UdfOp::SearchWeb,
                serde_json::json!({"query": "solid state batteries"}),
                Some("web1"),
            ),
            step(
                UdfOp::Summarize,
                serde_json::json!({"hits": "$web1"}),
                Some("sum1"),
            ),
            step(UdfOp::Finalize, serde_json::json!({}), None),
        ];
        assert!(validate_program(&steps, 12).is_ok());
    }
}
