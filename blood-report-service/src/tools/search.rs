use async_trait::async_trait;
use crew_flow::{FlowError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::WEB_SEARCH;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const MAX_HITS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// Google results through the Serper API
pub struct SerperSearch {
    client: Client,
    api_key: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::TaskExecutionFailed(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchTool for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!("Web search: {}", query);

        let response = self
            .client
            .post(SERPER_ENDPOINT)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query }))
            .send()
            .await
            .map_err(|e| FlowError::TaskExecutionFailed(format!("Search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FlowError::TaskExecutionFailed(format!(
                "Search request failed: {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            FlowError::TaskExecutionFailed(format!("Failed to parse search response: {e}"))
        })?;

        let hits = parse_organic(&body);
        info!("Web search returned {} results", hits.len());
        Ok(hits)
    }
}

fn parse_organic(body: &Value) -> Vec<SearchHit> {
    body["organic"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .take(MAX_HITS)
                .filter_map(|r| {
                    Some(SearchHit {
                        title: r["title"].as_str()?.to_string(),
                        link: r["link"].as_str()?.to_string(),
                        snippet: r["snippet"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Markdown list used as reference material inside prompts
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("- [{}]({}): {}", h.title, h.link, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organic_results() {
        let body = json!({
            "searchParameters": { "q": "ferritin low" },
            "organic": [
                { "title": "Ferritin test", "link": "https://example.org/ferritin", "snippet": "Measures iron stores." },
                { "title": "No link" },
                { "title": "Anemia", "link": "https://example.org/anemia" }
            ]
        });

        let hits = parse_organic(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "Measures iron stores.");
        assert_eq!(hits[1].snippet, "");

        assert_eq!(
            format_hits(&hits[..1]),
            "- [Ferritin test](https://example.org/ferritin): Measures iron stores."
        );
    }

    #[test]
    fn test_parse_without_organic_section() {
        assert!(parse_organic(&json!({ "answerBox": {} })).is_empty());
    }

    /// Usage: SERPER_API_KEY=key cargo test test_serper_live
    #[tokio::test]
    async fn test_serper_live() {
        let Ok(api_key) = std::env::var("SERPER_API_KEY") else {
            println!("Skipping test - set SERPER_API_KEY environment variable");
            return;
        };

        let search = SerperSearch::new(api_key, Duration::from_secs(30)).unwrap();
        let hits = search.search("ferritin normal range").await.unwrap();
        assert!(!hits.is_empty());
    }
}
