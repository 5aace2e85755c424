use std::fmt;
use std::sync::Arc;

use crate::{
    context::Context,
    error::Result,
    llm::{CompletionRequest, LlmClient},
};

/// A named participant with a fixed goal, persona and capability list.
///
/// Tools are referenced by name; the list is fixed once the agent is built.
#[derive(Clone)]
pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    tools: Vec<String>,
    llm: Arc<dyn LlmClient>,
}

impl Agent {
    pub fn builder(role: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            tools: Vec::new(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn llm(&self) -> Arc<dyn LlmClient> {
        self.llm.clone()
    }

    pub fn allows_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }

    /// System prompt for this agent; `{placeholders}` in the goal are filled from the context
    pub fn preamble(&self, context: &Context) -> String {
        format!(
            "You are {}.\nYour goal: {}\n\n{}",
            self.role,
            context.interpolate(&self.goal),
            self.backstory
        )
    }

    /// Prompt the agent's model with its persona as preamble
    pub async fn complete(&self, context: &Context, prompt: impl Into<String>) -> Result<String> {
        let request = CompletionRequest::new(prompt).with_preamble(self.preamble(context));
        self.llm.complete(request).await
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

pub struct AgentBuilder {
    role: String,
    goal: String,
    backstory: String,
    tools: Vec<String>,
}

impl AgentBuilder {
    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn build(self, llm: Arc<dyn LlmClient>) -> Agent {
        Agent {
            role: self.role,
            goal: self.goal,
            backstory: self.backstory,
            tools: self.tools,
            llm,
        }
    }
}
