use async_trait::async_trait;
use crew_flow::{Agent, Context, FlowError, Result, Task, TaskResult, Upstream};
use tracing::{error, info};

use super::utils::upstream_output;
use super::{StageDef, analysis};
use crate::tools::{NUTRITION_RECOMMENDER, RecommendationKind, RecommendationTool};

pub const STAGE: StageDef = StageDef {
    id: "nutrition",
    description: "Based on the medical report analysis provided in the context, provide general nutrition advice. \
                  Focus on well-established links between biomarkers and diet. Do not recommend specific supplements \
                  unless they are widely recognized (e.g., iron for anemia).",
    expected_output: "A list of general, evidence-based nutritional suggestions.\n\
                      - Connect dietary advice to specific findings in the report (e.g., 'For elevated cholesterol, consider increasing soluble fiber...').\n\
                      - Recommend food groups and healthy eating patterns rather than specific, restrictive diets.\n\
                      - Include a disclaimer that this is not a personalized meal plan and a registered dietitian or doctor should be consulted.",
    tools: &[NUTRITION_RECOMMENDER],
};

/// Nutrition advice derived from the analysis output.
///
/// The stage output is the recommendation tool's response as is.
pub struct NutritionTask {
    agent: Agent,
    tool: RecommendationTool,
}

impl NutritionTask {
    pub fn new(agent: Agent, tool: RecommendationTool) -> Result<Self> {
        STAGE.check_tools(&agent)?;
        if tool.kind() != RecommendationKind::Nutrition {
            return Err(FlowError::InvalidPipeline(format!(
                "stage `{}` needs the {} tool, got {}",
                STAGE.id,
                NUTRITION_RECOMMENDER,
                tool.name()
            )));
        }
        Ok(Self { agent, tool })
    }
}

#[async_trait]
impl Task for NutritionTask {
    fn id(&self) -> &str {
        STAGE.id
    }

    async fn run(&self, _context: Context, upstream: &Upstream) -> Result<TaskResult> {
        let analysis = upstream_output(upstream, analysis::STAGE.id)?;
        info!(agent = self.agent.role(), "Preparing nutrition advice");

        let advice = self.tool.recommend(analysis).await.map_err(|e| {
            error!("Nutrition recommendation failed: {}", e);
            e
        })?;

        Ok(TaskResult::new_with_status(
            advice,
            format!("Nutrition advice by {}", self.agent.role()),
        ))
    }
}
