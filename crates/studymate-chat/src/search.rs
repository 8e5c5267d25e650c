//! Web-search seam. Failures never propagate: they become [`WebSnippets`]
//! values that render as informational text.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use studymate_core::config::WebSearchSettings;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSnippets {
    Found(String),
    NotFound,
    Failed(String),
}

impl WebSnippets {
    /// Snippet text worth putting into a prompt, if any.
    pub fn usable(&self) -> Option<&str> {
        match self {
            WebSnippets::Found(text) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for WebSnippets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebSnippets::Found(text) => f.write_str(text),
            WebSnippets::NotFound => f.write_str("No information found on the web."),
            WebSnippets::Failed(reason) => write!(f, "Error fetching information from the web: {reason}"),
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> WebSnippets;
}

/// Search that is switched off; every query finds nothing.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &str) -> WebSnippets {
        WebSnippets::NotFound
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchItem {
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search JSON API client.
pub struct GoogleSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    max_snippets: usize,
}

impl GoogleSearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        max_snippets: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            max_snippets: max_snippets.max(1),
        })
    }

    async fn fetch(&self, query: &str) -> std::result::Result<SearchResponse, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[("key", self.api_key.as_str()), ("cx", self.engine_id.as_str()), ("q", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str) -> WebSnippets {
        match self.fetch(query).await {
            Ok(response) => join_snippets(&response, self.max_snippets),
            Err(e) => {
                tracing::warn!(error = %e, "web search failed");
                WebSnippets::Failed(e.to_string())
            }
        }
    }
}

fn join_snippets(response: &SearchResponse, max: usize) -> WebSnippets {
    let snippets: Vec<&str> = response
        .items
        .iter()
        .take(max)
        .map(|item| item.snippet.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if snippets.is_empty() {
        WebSnippets::NotFound
    } else {
        WebSnippets::Found(snippets.join(" "))
    }
}

/// Google search when enabled and credentialed, otherwise [`DisabledSearch`].
pub fn build_web_search(settings: &WebSearchSettings) -> Result<Arc<dyn WebSearch>> {
    if !settings.enabled {
        return Ok(Arc::new(DisabledSearch));
    }
    match (settings.api_key.as_deref(), settings.engine_id.as_deref()) {
        (Some(key), Some(cx)) if !key.is_empty() && !cx.is_empty() => Ok(Arc::new(GoogleSearch::new(
            settings.endpoint.clone(),
            key,
            cx,
            settings.max_snippets,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )?)),
        _ => {
            tracing::info!("web search enabled but api_key/engine_id not set; searching disabled");
            Ok(Arc::new(DisabledSearch))
        }
    }
}
