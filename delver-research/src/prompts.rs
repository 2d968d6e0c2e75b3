//! Prompt templates for the research engine. All templates demand strict
//! JSON where the caller parses structured output.

use crate::prompt::PromptTemplate;

pub const PLANNER: PromptTemplate = PromptTemplate::new(
    r#"You are a research planning assistant. Decide how to research the topic below.

Topic: {{topic}}
Requested report shape: {{report_organization}}

Pick exactly one strategy:
- "SIMPLE_RAG": the standard pipeline (generate queries, retrieve from the document collection and/or the web, summarize, reflect, finalize). Choose this for most topics.
- "DYNAMIC_STRATEGY": a custom ordered plan, only when the topic clearly needs a bespoke sequence of retrieval and synthesis steps.

Output ONLY a JSON object:
{"strategy": "SIMPLE_RAG" | "DYNAMIC_STRATEGY", "plan": "<one-paragraph plan>", "rationale": "<why this strategy>", "udf_strategy": "<numbered list of steps; empty string unless strategy is DYNAMIC_STRATEGY>"}"#,
);

pub const QUERY_GENERATION: PromptTemplate = PromptTemplate::new(
    r#"Generate exactly {{count}} focused search queries to research the topic below. Each query should target one logical section of the final report.

Topic: {{topic}}
Report shape: {{report_organization}}

Output ONLY a JSON array, no other text:
[{"query": "<search query>", "report_section": "<section this feeds>", "rationale": "<why this query>"}]"#,
);

pub const RELEVANCE_JUDGE: PromptTemplate = PromptTemplate::new(
    r#"Judge whether the candidate answer is relevant to the query.

Query: {{query}}
Candidate answer: {{candidate}}

Output ONLY a JSON object: {"score": "yes" | "no", "rationale": "<one sentence>"}"#,
);

pub const SUMMARIZER: PromptTemplate = PromptTemplate::new(
    r#"You are extending a research summary with newly retrieved material.

Topic: {{topic}}
Existing summary (do not repeat it):
{{prior_summary}}

New material:
{{snippets}}

Write ONLY the new paragraphs to append to the summary. Cover what the new material adds. Do not invent facts or citations that are not in the material. Keep it under {{char_limit}} characters."#,
);

pub const REFLECTION: PromptTemplate = PromptTemplate::new(
    r#"Review the research summary for the topic below and identify the most important knowledge gap.

Topic: {{topic}}
Summary:
{{running_summary}}

Output ONLY a JSON object:
{"gap": "<the gap, one sentence>", "follow_up_queries": ["<at most 2 search queries that would close the gap>"]}"#,
);

pub const FINALIZER: PromptTemplate = PromptTemplate::new(
    r#"Compose the final research report for the topic below, written in the same language as the topic.

Topic: {{topic}}
Requested report shape: {{report_organization}}
Research summary:
{{running_summary}}

Rules:
- Base the report only on the research summary.
- Follow the requested report shape when one is given.
- Use concrete wording; never emit placeholder tokens such as [topic] or [section].
- Do not append a source list; sources are appended separately.

Output the report as Markdown text."#,
);

pub const UDF_COMPILER: PromptTemplate = PromptTemplate::new(
    r#"Compile the research plan below into an executable program over a fixed tool API.

Plan:
{{udf_strategy}}

Topic: {{topic}}
Document collection: {{collection}}

Tool API (the only allowed ops):
- search_web(query: string) -> hits: list of source hits
- search_rag(query: string, collection: string) -> hits: list of source hits
- summarize(hits: $ref) -> summary: string (extends the running summary)
- judge_relevance(query: string, answer: string | $ref) -> judgment
- reflect() -> gap and follow-up queries for the running summary
- finalize() -> the final report from the running summary and all collected hits
- noop()

Rules:
- Output ONLY a JSON array of at most {{max_steps}} steps, in execution order.
- Each step is {"op": "<tool name>", "args": {<literal args>}, "bind": "<optional result name>"}.
- An argument may reference an earlier step's bind as the string "$name". Never reference a bind before the step that defines it.
- The last step must be finalize.

Example:
[{"op": "search_web", "args": {"query": "solid state battery energy density 2025"}, "bind": "web1"},
 {"op": "summarize", "args": {"hits": "$web1"}, "bind": "sum1"},
 {"op": "finalize", "args": {}}]"#,
);
