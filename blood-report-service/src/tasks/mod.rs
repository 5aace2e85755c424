pub mod analysis;
pub mod compile;
pub mod exercise;
pub mod nutrition;
pub mod utils;
pub mod verification;

pub use analysis::AnalysisTask;
pub use compile::CompileTask;
pub use exercise::ExerciseTask;
pub use nutrition::NutritionTask;
pub use verification::VerificationTask;

use crew_flow::{Agent, FlowError, Result};

// Context keys shared by every stage
pub const QUERY: &str = "query";
pub const FILE_PATH: &str = "file_path";

/// Static description of one stage: what it asks for and which tools it may use
#[derive(Debug, Clone, Copy)]
pub struct StageDef {
    pub id: &'static str,
    pub description: &'static str,
    pub expected_output: &'static str,
    pub tools: &'static [&'static str],
}

impl StageDef {
    /// Every stage tool must be in the owning agent's capability list
    pub fn check_tools(&self, agent: &Agent) -> Result<()> {
        match self.tools.iter().find(|tool| !agent.allows_tool(tool)) {
            Some(tool) => Err(FlowError::InvalidPipeline(format!(
                "stage `{}` uses tool `{}`, which agent `{}` does not allow",
                self.id,
                tool,
                agent.role()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{BLOOD_TEST_REPORT_READER, NUTRITION_RECOMMENDER};
    use async_trait::async_trait;
    use crew_flow::{CompletionRequest, LlmClient};
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl LlmClient for Silent {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_stage_tool_outside_capabilities_is_rejected() {
        let agent = Agent::builder("Reader only")
            .tool(BLOOD_TEST_REPORT_READER)
            .build(Arc::new(Silent));

        let ok = StageDef {
            id: "read",
            description: "",
            expected_output: "",
            tools: &[BLOOD_TEST_REPORT_READER],
        };
        assert!(ok.check_tools(&agent).is_ok());

        let bad = StageDef {
            tools: &[BLOOD_TEST_REPORT_READER, NUTRITION_RECOMMENDER],
            ..ok
        };
        let err = bad.check_tools(&agent).unwrap_err();
        assert!(matches!(err, FlowError::InvalidPipeline(ref msg) if msg.contains("Nutrition Recommender")));
    }
}
