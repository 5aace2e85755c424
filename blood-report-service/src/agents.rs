//! The five roles of the blood report crew.

use crew_flow::{Agent, LlmClient};
use std::sync::Arc;

use crate::tools::{
    BLOOD_TEST_REPORT_READER, EXERCISE_PLAN_CREATOR, NUTRITION_RECOMMENDER, WEB_SEARCH,
};

/// All roles, sharing one model handle
#[derive(Debug, Clone)]
pub struct Roster {
    pub verifier: Agent,
    pub doctor: Agent,
    pub nutritionist: Agent,
    pub exercise_specialist: Agent,
    pub report_compiler: Agent,
}

impl Roster {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            verifier: verifier(llm.clone()),
            doctor: doctor(llm.clone()),
            nutritionist: nutritionist(llm.clone()),
            exercise_specialist: exercise_specialist(llm.clone()),
            report_compiler: report_compiler(llm),
        }
    }
}

pub fn verifier(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::builder("Medical Data Verifier")
        .goal("To verify that the provided document appears to be a medical report and is suitable for analysis.")
        .backstory(
            "You are a meticulous AI designed to pre-screen documents. \
             Your primary function is to check if a file contains structured data resembling a medical report, such as a blood test. \
             You look for keywords, tables, and formats common to such documents to ensure the subsequent analysis is relevant. \
             Accuracy and relevance are your top priorities.",
        )
        .tool(BLOOD_TEST_REPORT_READER)
        .build(llm)
}

pub fn doctor(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::builder("Medical Report Analyst AI")
        .goal("To analyze a blood test report, summarize its key findings, and answer the user's query: {query}")
        .backstory(
            "You are a sophisticated AI assistant designed to interpret medical documents. \
             Your expertise lies in breaking down complex data from reports into understandable summaries for users. \
             You are careful to identify values that fall outside standard reference ranges and explain their potential significance in a clear, objective manner. \
             You always emphasize that your analysis is for informational purposes and is not a substitute for professional medical advice from a qualified doctor.",
        )
        .tool(BLOOD_TEST_REPORT_READER)
        .tool(WEB_SEARCH)
        .build(llm)
}

pub fn nutritionist(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::builder("Clinical Nutritionist AI")
        .goal("To provide general, evidence-based dietary recommendations based on the findings in a blood test report.")
        .backstory(
            "You are an AI nutritionist trained on established clinical guidelines and scientific research. \
             You analyze blood work to suggest general dietary adjustments that could support overall health. \
             You avoid fad diets and focus on balanced, sustainable nutritional advice. \
             You always clarify that your recommendations are general and should be discussed with a healthcare provider before implementation.",
        )
        .tool(NUTRITION_RECOMMENDER)
        .tool(WEB_SEARCH)
        .build(llm)
}

pub fn exercise_specialist(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::builder("Fitness Planning AI")
        .goal("To suggest safe and appropriate general exercise guidelines based on a user's health data summary.")
        .backstory(
            "You are an AI fitness planner with a strong foundation in exercise science and physiology. \
             You specialize in creating safe, effective, and generalized fitness recommendations. \
             You prioritize safety and feasibility, ensuring your suggestions are appropriate for a general audience \
             and always include a disclaimer to consult a doctor before starting a new exercise program.",
        )
        .tool(EXERCISE_PLAN_CREATOR)
        .tool(WEB_SEARCH)
        .build(llm)
}

pub fn report_compiler(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::builder("Report Compilation Specialist")
        .goal("To compile the medical analysis, nutritional advice, and exercise plan into a single, cohesive, and well-formatted final report.")
        .backstory(
            "You are a skilled editor AI. Your expertise is in taking multiple pieces of related information \
             and structuring them into a single, easy-to-read document. You ensure that all disclaimers are present \
             and that the final report flows logically from analysis to recommendations.",
        )
        .build(llm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crew_flow::{CompletionRequest, Context, Result};

    struct Silent;

    #[async_trait]
    impl LlmClient for Silent {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_capability_lists() {
        let roster = Roster::new(Arc::new(Silent));

        assert_eq!(roster.verifier.tools(), [BLOOD_TEST_REPORT_READER]);
        assert!(roster.doctor.allows_tool(WEB_SEARCH));
        assert!(roster.nutritionist.allows_tool(NUTRITION_RECOMMENDER));
        assert!(!roster.nutritionist.allows_tool(EXERCISE_PLAN_CREATOR));
        assert!(roster.exercise_specialist.allows_tool(EXERCISE_PLAN_CREATOR));
        assert!(roster.report_compiler.tools().is_empty());
    }

    #[tokio::test]
    async fn test_doctor_goal_is_templated_with_query() {
        let roster = Roster::new(Arc::new(Silent));
        let context = Context::new();
        context.set("query", "Is my cholesterol ok?").await;

        let preamble = roster.doctor.preamble(&context);
        assert!(preamble.starts_with("You are Medical Report Analyst AI."));
        assert!(preamble.contains("answer the user's query: Is my cholesterol ok?"));
    }
}
