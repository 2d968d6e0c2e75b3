use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine configuration. Every knob has a default and can be set through
/// the environment (`ResearchConfig::from_env`).
#[derive(Clone, Debug)]
pub struct ResearchConfig {
    pub reasoning_model: String,
    pub instruct_model: String,
    pub embedding_model: String,
    pub vector_store_host: String,
    pub vector_store_port: u16,
    pub embedding_dim: usize,
    pub web_search_endpoint: String,
    pub web_search_api_key: String,
    pub reflection_limit: u32,
    pub queries_per_pass: usize,
    pub web_topk: usize,
    pub rag_topk: usize,
    pub summary_char_limit: usize,
    pub udf_max_steps: usize,
    pub request_deadline: Duration,
    pub keepalive_interval: Duration,
    pub llm_timeout: Duration,
    pub embeddings_timeout: Duration,
    pub vector_store_timeout: Duration,
    pub web_search_timeout: Duration,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            reasoning_model: "reasoning".to_string(),
            instruct_model: "instruct".to_string(),
            embedding_model: "embedding".to_string(),
            vector_store_host: "127.0.0.1".to_string(),
            vector_store_port: 6333,
            embedding_dim: 1024,
            web_search_endpoint: String::new(),
            web_search_api_key: String::new(),
            reflection_limit: 1,
            queries_per_pass: 3,
            web_topk: 5,
            rag_topk: 4,
            summary_char_limit: 12_000,
            udf_max_steps: 12,
            request_deadline: Duration::from_secs(300),
            keepalive_interval: Duration::from_secs(15),
            llm_timeout: Duration::from_secs(60),
            embeddings_timeout: Duration::from_secs(10),
            vector_store_timeout: Duration::from_secs(10),
            web_search_timeout: Duration::from_secs(15),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl ResearchConfig {
    /// Reads configuration from the environment, falling back to the
    /// defaults and clamping values to their allowed ranges.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut config = Self {
            reasoning_model: env_string("REASONING_MODEL", &defaults.reasoning_model),
            instruct_model: env_string("INSTRUCT_MODEL", &defaults.instruct_model),
            embedding_model: env_string("EMBEDDING_MODEL", &defaults.embedding_model),
            vector_store_host: env_string("VECTOR_STORE_HOST", &defaults.vector_store_host),
            vector_store_port: env_parse("VECTOR_STORE_PORT", defaults.vector_store_port),
            embedding_dim: env_parse("EMBEDDING_DIM", defaults.embedding_dim),
            web_search_endpoint: env_string("WEB_SEARCH_ENDPOINT", ""),
            web_search_api_key: env_string("WEB_SEARCH_API_KEY", ""),
            reflection_limit: env_parse("REFLECTION_LIMIT", defaults.reflection_limit),
            queries_per_pass: env_parse("QUERIES_PER_PASS", defaults.queries_per_pass),
            web_topk: env_parse("WEB_TOPK", defaults.web_topk),
            rag_topk: env_parse("RAG_TOPK", defaults.rag_topk),
            summary_char_limit: env_parse("SUMMARY_CHAR_LIMIT", defaults.summary_char_limit),
            udf_max_steps: env_parse("UDF_MAX_STEPS", defaults.udf_max_steps),
            request_deadline: env_secs("REQUEST_DEADLINE_SECS", defaults.request_deadline),
            keepalive_interval: env_secs("KEEPALIVE_INTERVAL_SECS", defaults.keepalive_interval),
            llm_timeout: env_secs("LLM_TIMEOUT_SECS", defaults.llm_timeout),
            embeddings_timeout: env_secs("EMBEDDINGS_TIMEOUT_SECS", defaults.embeddings_timeout),
            vector_store_timeout: env_secs(
                "VECTOR_STORE_TIMEOUT_SECS",
                defaults.vector_store_timeout,
            ),
            web_search_timeout: env_secs("WEB_SEARCH_TIMEOUT_SECS", defaults.web_search_timeout),
        };
        config.clamp();
        config
    }

    fn clamp(&mut self) {
        self.reflection_limit = self.reflection_limit.min(3);
        self.queries_per_pass = self.queries_per_pass.clamp(1, 8);
        if self.udf_max_steps == 0 {
            self.udf_max_steps = 1;
        }
    }

    pub fn vector_store_url(&self) -> String {
        format!("http://{}:{}", self.vector_store_host, self.vector_store_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ResearchConfig::default();
        assert_eq!(config.reflection_limit, 1);
        assert_eq!(config.queries_per_pass, 3);
        assert_eq!(config.web_topk, 5);
        assert_eq!(config.rag_topk, 4);
        assert_eq!(config.summary_char_limit, 12_000);
        assert_eq!(config.udf_max_steps, 12);
        assert_eq!(config.embedding_dim, 1024);
        assert_eq!(config.request_deadline, Duration::from_secs(300));
    }

    #[test]
    fn clamp_bounds_reflection_and_query_counts() {
        let mut config = ResearchConfig {
            reflection_limit: 9,
            queries_per_pass: 40,
            ..ResearchConfig::default()
        };
        config.clamp();
        assert_eq!(config.reflection_limit, 3);
        assert_eq!(config.queries_per_pass, 8);
    }
}
