use crew_flow::{CompletionRequest, LlmClient, Result};
use std::sync::Arc;
use tracing::info;

use super::{EXERCISE_PLAN_CREATOR, NUTRITION_RECOMMENDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKind {
    Nutrition,
    Exercise,
}

/// Turns a blood report analysis into nutrition or exercise advice with one LLM call.
///
/// The response is returned exactly as the model produced it.
#[derive(Clone)]
pub struct RecommendationTool {
    kind: RecommendationKind,
    llm: Arc<dyn LlmClient>,
}

impl RecommendationTool {
    pub fn nutrition(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            kind: RecommendationKind::Nutrition,
            llm,
        }
    }

    pub fn exercise(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            kind: RecommendationKind::Exercise,
            llm,
        }
    }

    pub fn kind(&self) -> RecommendationKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            RecommendationKind::Nutrition => NUTRITION_RECOMMENDER,
            RecommendationKind::Exercise => EXERCISE_PLAN_CREATOR,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.kind {
            RecommendationKind::Nutrition => {
                "Provides general dietary recommendations based on an analysis of a blood report."
            }
            RecommendationKind::Exercise => {
                "Creates a general and safe exercise plan based on a health data summary."
            }
        }
    }

    pub fn prompt(&self, blood_report_analysis: &str) -> String {
        match self.kind {
            RecommendationKind::Nutrition => nutrition_prompt(blood_report_analysis),
            RecommendationKind::Exercise => exercise_prompt(blood_report_analysis),
        }
    }

    pub async fn recommend(&self, blood_report_analysis: &str) -> Result<String> {
        info!(tool = self.name(), "Generating recommendations");
        let request = CompletionRequest::new(self.prompt(blood_report_analysis));
        self.llm.complete(request).await
    }
}

fn nutrition_prompt(blood_report_analysis: &str) -> String {
    format!(
        "You are a specialized AI assistant acting as a clinical nutritionist.
Your task is to generate general, evidence-based dietary recommendations based on the provided summary of a blood test report.

- Connect your recommendations directly to the findings in the report (e.g., \"Due to elevated LDL cholesterol, consider...\").
- Focus on food groups and healthy eating patterns, not restrictive or fad diets.
- Do NOT invent or diagnose new conditions. Base your advice solely on the provided analysis.
- Output the recommendations in Markdown format.
- CRITICALLY: End with a clear and strong disclaimer that this is not personalized medical advice and the user must consult a registered dietitian or doctor.

Here is the blood report analysis:
---
{blood_report_analysis}
---

Generate the nutritional recommendations now."
    )
}

fn exercise_prompt(blood_report_analysis: &str) -> String {
    format!(
        "You are a specialized AI assistant acting as a certified fitness planner.
Your task is to create a safe, general, and appropriate weekly exercise plan based on the provided summary of a health report.

- The plan should be suitable for a general audience.
- Consider any health flags in the analysis (e.g., if cholesterol is high, emphasize cardiovascular exercise).
- Include a balanced mix of cardiovascular, strength, and flexibility exercises.
- Specify recommended frequencies and durations (e.g., '3-5 times a week').
- Emphasize the importance of warm-ups and cool-downs.
- Do NOT suggest overly strenuous or high-risk activities.
- Do NOT invent or diagnose new conditions. Base the plan solely on the provided analysis.
- Output the plan in Markdown format, structured as a sample weekly schedule.
- CRITICALLY: End with a prominent safety disclaimer that this is a sample plan and the user must consult a doctor before beginning any new exercise regimen.

Here is the health report analysis:
---
{blood_report_analysis}
---

Generate the exercise plan now."
    )
}
