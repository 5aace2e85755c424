use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Text handed to downstream tasks that declare this one as context
    pub output: String,
    /// Optional human readable note about what the task did
    pub status_message: Option<String>,
}

impl TaskResult {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status_message: None,
        }
    }

    pub fn new_with_status(output: impl Into<String>, status_message: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status_message: Some(status_message.into()),
        }
    }
}

/// Outputs of the upstream tasks a task declared as its context,
/// in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upstream {
    entries: Vec<(String, String)>,
}

impl Upstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, task_id: impl Into<String>, output: impl Into<String>) {
        self.entries.push((task_id.into(), output.into()));
    }

    pub fn get(&self, task_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, output)| output.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(id, output)| (id.as_str(), output.as_str()))
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as Markdown blocks, one per upstream task, for use inside a prompt
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(id, output)| format!("### Output of `{id}`\n{}\n", output.trim_end()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<(String, String)> for Upstream {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str;

    /// Execute the task with the shared inputs and the outputs of its declared upstream tasks
    async fn run(&self, context: Context, upstream: &Upstream) -> Result<TaskResult>;
}
