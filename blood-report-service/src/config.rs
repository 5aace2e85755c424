//! Process configuration: every value comes from a CLI flag or its environment variable.

use anyhow::{Context as _, anyhow};
use clap::Args;
use crew_flow::{BoundedLlm, CallBounds, LlmClient, OpenRouterClient, Pipeline};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::agents::Roster;
use crate::db::JobStore;
use crate::queue::SqliteTaskQueue;
use crate::tools::{SearchTool, SerperSearch, Toolkit};
use crate::workflow::build_report_pipeline;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://analysis_results.db?mode=rwc";
pub const DEFAULT_QUEUE_URL: &str = "sqlite://task_queue.db?mode=rwc";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";
pub const DEFAULT_QUERY: &str =
    "Summarise my Blood Test Report and give me some health recommendations";
pub const DEFAULT_FILE: &str = "data/sample.pdf";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Job record store.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,
}

impl DatabaseArgs {
    pub async fn connect(&self) -> anyhow::Result<JobStore> {
        JobStore::connect(&self.database_url)
            .await
            .with_context(|| format!("connecting to {}", self.database_url))
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Task queue broker.
    #[arg(long, env = "QUEUE_BROKER_URL", default_value = DEFAULT_QUEUE_URL)]
    pub broker_url: String,

    /// Where the queue keeps its own task states.
    #[arg(long, env = "QUEUE_RESULT_BACKEND", default_value = DEFAULT_QUEUE_URL)]
    pub result_backend: String,

    /// Worker poll interval when the queue is empty.
    #[arg(long, env = "QUEUE_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,
}

impl QueueArgs {
    pub async fn connect(&self) -> anyhow::Result<SqliteTaskQueue> {
        SqliteTaskQueue::connect(&self.broker_url, &self.result_backend)
            .await
            .with_context(|| format!("connecting to queue broker {}", self.broker_url))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Model id on OpenRouter.
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f64,

    /// Upper bound for a single LLM call, in seconds.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 120)]
    pub llm_timeout_secs: u64,

    /// Retries after a failed or timed-out LLM call.
    #[arg(long, env = "LLM_MAX_RETRIES", default_value_t = 1)]
    pub llm_max_retries: u32,

    /// Serper API key; web search is disabled without it.
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    pub serper_api_key: Option<String>,
}

impl LlmArgs {
    pub fn bounds(&self) -> CallBounds {
        CallBounds {
            timeout: Duration::from_secs(self.llm_timeout_secs),
            max_retries: self.llm_max_retries,
            ..CallBounds::default()
        }
    }

    /// One bounded client for the whole process
    pub fn build_llm(&self) -> anyhow::Result<Arc<dyn LlmClient>> {
        let api_key = self
            .openrouter_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("OPENROUTER_API_KEY environment variable is required"))?;

        let client = OpenRouterClient::new(api_key, &self.model, self.temperature);
        info!(
            model = %self.model,
            timeout_secs = self.llm_timeout_secs,
            max_retries = self.llm_max_retries,
            "LLM client ready"
        );
        Ok(Arc::new(BoundedLlm::new(client, self.bounds())))
    }

    pub fn build_search(&self) -> anyhow::Result<Option<Arc<dyn SearchTool>>> {
        match self.serper_api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => {
                info!("Web search enabled");
                let search = SerperSearch::new(key, SEARCH_TIMEOUT)?;
                Ok(Some(Arc::new(search)))
            }
            None => {
                info!("SERPER_API_KEY not set, web search disabled");
                Ok(None)
            }
        }
    }

    /// Roles, tools and the five-stage pipeline, all sharing one client
    pub fn build_pipeline(&self) -> anyhow::Result<Pipeline> {
        let llm = self.build_llm()?;
        let toolkit = Toolkit::new(llm.clone(), self.build_search()?);
        Ok(build_report_pipeline(Roster::new(llm), &toolkit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        queue: QueueArgs,
        #[command(flatten)]
        llm: LlmArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::parse_from([
            "test",
            "--database-url",
            "sqlite::memory:",
            "--llm-timeout-secs",
            "5",
            "--llm-max-retries",
            "3",
            "--poll-interval-ms",
            "50",
        ]);

        assert_eq!(cli.db.database_url, "sqlite::memory:");
        assert_eq!(cli.queue.poll_interval(), Duration::from_millis(50));
        let bounds = cli.llm.bounds();
        assert_eq!(bounds.timeout, Duration::from_secs(5));
        assert_eq!(bounds.max_retries, 3);
        assert_eq!(bounds.retry_backoff, CallBounds::default().retry_backoff);
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let cli = TestCli::parse_from(["test", "--openrouter-api-key", ""]);
        let err = cli.llm.build_llm().err().unwrap();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_search_needs_a_key() {
        let cli = TestCli::parse_from(["test", "--serper-api-key", ""]);
        assert!(cli.llm.build_search().unwrap().is_none());
    }
}
