use async_trait::async_trait;
use crew_flow::{Agent, Context, FlowError, Result, Task, TaskResult, Upstream};
use tracing::{error, info};

use super::utils::upstream_output;
use super::{StageDef, analysis};
use crate::tools::{EXERCISE_PLAN_CREATOR, RecommendationKind, RecommendationTool};

pub const STAGE: StageDef = StageDef {
    id: "exercise",
    description: "Based on the medical report analysis provided in the context, create a general exercise plan. \
                  The plan should be safe and suitable for a general audience. \
                  Do not suggest overly strenuous or high-risk activities.",
    expected_output: "A sample weekly exercise plan.\n\
                      - Include a mix of cardiovascular, strength, and flexibility exercises.\n\
                      - Specify recommended frequencies and durations (e.g., '30 minutes of moderate cardio, 3-5 times a week').\n\
                      - Emphasize the importance of a warm-up and cool-down.\n\
                      - Include a prominent safety warning to consult a doctor before beginning any new exercise regimen.",
    tools: &[EXERCISE_PLAN_CREATOR],
};

pub struct ExerciseTask {
    agent: Agent,
    tool: RecommendationTool,
}

impl ExerciseTask {
    pub fn new(agent: Agent, tool: RecommendationTool) -> Result<Self> {
        STAGE.check_tools(&agent)?;
        if tool.kind() != RecommendationKind::Exercise {
            return Err(FlowError::InvalidPipeline(format!(
                "stage `{}` needs the {} tool, got {}",
                STAGE.id,
                EXERCISE_PLAN_CREATOR,
                tool.name()
            )));
        }
        Ok(Self { agent, tool })
    }
}

#[async_trait]
impl Task for ExerciseTask {
    fn id(&self) -> &str {
        STAGE.id
    }

    async fn run(&self, _context: Context, upstream: &Upstream) -> Result<TaskResult> {
        let analysis = upstream_output(upstream, analysis::STAGE.id)?;
        info!(agent = self.agent.role(), "Preparing exercise plan");

        let plan = self.tool.recommend(analysis).await.map_err(|e| {
            error!("Exercise plan failed: {}", e);
            e
        })?;

        Ok(TaskResult::new_with_status(
            plan,
            format!("Exercise plan by {}", self.agent.role()),
        ))
    }
}
