use async_trait::async_trait;
use crew_flow::{Agent, Context, Result, Task, TaskResult, Upstream};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::utils::{ToolOutput, build_stage_prompt, required_input};
use super::{FILE_PATH, QUERY, StageDef};
use crate::tools::search::format_hits;
use crate::tools::{BLOOD_TEST_REPORT_READER, DocumentReader, SearchTool, WEB_SEARCH, is_read_error};

pub const STAGE: StageDef = StageDef {
    id: "analysis",
    description: "Analyze the blood test report from this file: {file_path}.\n\
                  First, read the content of the file using the Blood Test Report Reader tool.\n\
                  Then, provide a summary of the key findings based on the user's query: {query}.\n\
                  Identify any biomarkers that are outside of the standard reference ranges and explain what they typically measure.\n\
                  Conclude with a clear disclaimer that this is an AI-generated analysis and not a substitute for professional medical advice.",
    expected_output: "A clear, structured summary of the blood test report. The output should be in Markdown format and include:\n\
                      - A brief introduction addressing the user's query.\n\
                      - A section titled 'Key Findings' with a bulleted list of important biomarkers from the report, their values, and their standard ranges.\n\
                      - A section titled 'Analysis' highlighting any values that are high or low, with a brief, neutral explanation of what these markers generally relate to.\n\
                      - A concluding paragraph with a strong disclaimer urging the user to consult a qualified healthcare professional for a proper diagnosis and treatment plan.",
    tools: &[BLOOD_TEST_REPORT_READER, WEB_SEARCH],
};

/// The doctor's summary of the report, answering the user's query
pub struct AnalysisTask {
    agent: Agent,
    reader: DocumentReader,
    search: Option<Arc<dyn SearchTool>>,
}

impl AnalysisTask {
    pub fn new(
        agent: Agent,
        reader: DocumentReader,
        search: Option<Arc<dyn SearchTool>>,
    ) -> Result<Self> {
        STAGE.check_tools(&agent)?;
        Ok(Self {
            agent,
            reader,
            search,
        })
    }
}

#[async_trait]
impl Task for AnalysisTask {
    fn id(&self) -> &str {
        STAGE.id
    }

    async fn run(&self, context: Context, upstream: &Upstream) -> Result<TaskResult> {
        let file_path = required_input(&context, FILE_PATH).await?;
        let query = required_input(&context, QUERY).await?;
        info!("Analysing {} for query: {}", file_path, query);

        let document = self.reader.read(&file_path).await;
        if is_read_error(&document) {
            warn!("Continuing analysis with read error text for {}", file_path);
        }

        let references = match &self.search {
            Some(search) => {
                let hits = search.search(&query).await.map_err(|e| {
                    error!("Web search failed: {}", e);
                    e
                })?;
                Some((search.name().to_string(), format_hits(&hits)))
            }
            None => None,
        };

        let mut tool_outputs = vec![ToolOutput {
            tool: DocumentReader::NAME,
            content: &document,
        }];
        if let Some((tool, hits)) = references.as_ref().filter(|(_, hits)| !hits.is_empty()) {
            tool_outputs.push(ToolOutput {
                tool: tool.as_str(),
                content: hits.as_str(),
            });
        }

        let prompt = build_stage_prompt(&context, &STAGE, upstream, &tool_outputs);

        let analysis = self.agent.complete(&context, prompt).await.map_err(|e| {
            error!("Report analysis failed: {}", e);
            e
        })?;

        Ok(TaskResult::new_with_status(
            analysis,
            format!("Report analysed with {} tool results", tool_outputs.len()),
        ))
    }
}
