pub mod document_reader;
pub mod recommendations;
pub mod search;

pub use document_reader::{DocumentReader, READ_ERROR_MARKER, is_read_error};
pub use recommendations::{RecommendationKind, RecommendationTool};
pub use search::{SearchHit, SearchTool, SerperSearch};

use crew_flow::LlmClient;
use std::sync::Arc;

// Tool names, as listed in agent capability lists and stage tool lists
pub const BLOOD_TEST_REPORT_READER: &str = "Blood Test Report Reader";
pub const NUTRITION_RECOMMENDER: &str = "Nutrition Recommender";
pub const EXERCISE_PLAN_CREATOR: &str = "Exercise Plan Creator";
pub const WEB_SEARCH: &str = "Search the internet";

/// Every tool instance the stages may use, built once per process
#[derive(Clone)]
pub struct Toolkit {
    pub reader: DocumentReader,
    pub nutrition: RecommendationTool,
    pub exercise: RecommendationTool,
    /// Absent when no search API key is configured
    pub search: Option<Arc<dyn SearchTool>>,
}

impl Toolkit {
    pub fn new(llm: Arc<dyn LlmClient>, search: Option<Arc<dyn SearchTool>>) -> Self {
        Self {
            reader: DocumentReader::new(),
            nutrition: RecommendationTool::nutrition(llm.clone()),
            exercise: RecommendationTool::exercise(llm),
            search,
        }
    }
}
