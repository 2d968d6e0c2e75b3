use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SearchError;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct WebPage {
    pub title: String,
    pub url: String,
    pub text: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WebPage>, SearchError>;
}

#[async_trait]
impl<T: WebSearch + ?Sized> WebSearch for std::sync::Arc<T> {
    async fn search(&self, query: &str) -> Result<Vec<WebPage>, SearchError> {
        self.as_ref().search(query).await
    }
}
