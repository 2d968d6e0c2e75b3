use std::env;
use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use delver_core::{ChatModel, Embedding, VectorBackend, WebSearch};
use delver_embeddings::HttpEmbedding;
use delver_llm::OpenAiCompatibleClient;
use delver_qdrant::QdrantBackend;
use delver_research::{ResearchConfig, Toolbox};
use delver_server::{router, AppState};
use delver_websearch::TavilyClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ResearchConfig::from_env();

    let llm_base_url =
        env::var("LLM_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:11434/v1".to_string());
    let mut llm_builder = OpenAiCompatibleClient::builder()
        .base_url(&llm_base_url)
        .default_model(&config.instruct_model)
        .timeout(config.llm_timeout);
    if let Ok(api_key) = env::var("LLM_API_KEY") {
        llm_builder = llm_builder.api_key(api_key);
    }
    let llm: Arc<dyn ChatModel> = Arc::new(llm_builder.build()?);

    let embeddings_base_url = env::var("EMBEDDINGS_BASE_URL").unwrap_or(llm_base_url);
    let embedder: Arc<dyn Embedding> = Arc::new(HttpEmbedding::new(
        embeddings_base_url,
        &config.embedding_model,
        config.embedding_dim,
    )?);

    let vector_backend: Arc<dyn VectorBackend> = Arc::new(
        QdrantBackend::builder()
            .host_port(&config.vector_store_host, config.vector_store_port)
            .timeout(config.vector_store_timeout)
            .build()?,
    );

    let web_search: Option<Arc<dyn WebSearch>> = if config.web_search_endpoint.is_empty() {
        tracing::warn!("WEB_SEARCH_ENDPOINT not set; web search is disabled");
        None
    } else {
        Some(Arc::new(TavilyClient::new(
            &config.web_search_endpoint,
            &config.web_search_api_key,
            config.web_topk,
        )?))
    };

    let keepalive_interval = config.keepalive_interval;
    let tools = Arc::new(Toolbox::new(
        llm,
        embedder,
        Some(vector_backend),
        web_search,
        config,
    ));

    let app = router(AppState {
        tools,
        keepalive_interval,
    });

    let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(%listen_addr, "delver server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
