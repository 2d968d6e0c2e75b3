mod embedding;
mod error;
mod llm;
mod parse;
mod retry;
mod search;
mod source;
mod vector;

pub use embedding::Embedding;
pub use error::{DelverError, EmbeddingError, SearchError, StoreError};
pub use llm::{ChatModel, ChatRequest, ChatResponse, Message, Role};
pub use parse::{extract_json, parse_json};
pub use retry::{backoff_delay, is_retryable};
pub use search::{WebPage, WebSearch};
pub use source::{Citation, Origin, SourceHit, SNIPPET_CHAR_LIMIT};
pub use vector::{ChunkHit, VectorBackend, VectorIndex};
