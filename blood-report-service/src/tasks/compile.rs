use async_trait::async_trait;
use crew_flow::{Agent, Context, Result, Task, TaskResult, Upstream};
use tracing::{error, info};

use super::StageDef;
use super::utils::build_stage_prompt;

pub const STAGE: StageDef = StageDef {
    id: "compile",
    description: "Compile the analysis from the doctor, the nutritional advice, and the exercise plan into a single, cohesive report. \
                  The final output should be a well-structured Markdown document that is easy for the user to read. \
                  Ensure all necessary disclaimers from the previous tasks are included and prominently displayed.",
    expected_output: "A single, comprehensive Markdown document containing:\n\
                      1.  **Blood Test Analysis:** The full analysis from the doctor.\n\
                      2.  **Nutritional Recommendations:** The full advice from the nutritionist.\n\
                      3.  **Exercise Recommendations:** The full plan from the fitness planner.\n\
                      4.  **Final Disclaimers:** A consolidated and clear section of all disclaimers.\n\
                      The report should be formatted professionally and be ready to be presented to the user.",
    tools: &[],
};

/// Final Markdown report; its output is the pipeline's output
pub struct CompileTask {
    agent: Agent,
}

impl CompileTask {
    pub fn new(agent: Agent) -> Result<Self> {
        STAGE.check_tools(&agent)?;
        Ok(Self { agent })
    }
}

#[async_trait]
impl Task for CompileTask {
    fn id(&self) -> &str {
        STAGE.id
    }

    async fn run(&self, context: Context, upstream: &Upstream) -> Result<TaskResult> {
        info!(sections = upstream.len(), "Compiling final report");

        let prompt = build_stage_prompt(&context, &STAGE, upstream, &[]);
        let report = self.agent.complete(&context, prompt).await.map_err(|e| {
            error!("Report compilation failed: {}", e);
            e
        })?;

        Ok(TaskResult::new_with_status(report, "Final report compiled"))
    }
}
