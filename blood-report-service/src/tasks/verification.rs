use async_trait::async_trait;
use crew_flow::{Agent, Context, Result, Task, TaskResult, Upstream};
use tracing::{error, info, warn};

use super::utils::{ToolOutput, build_stage_prompt, required_input};
use super::{FILE_PATH, StageDef};
use crate::tools::{BLOOD_TEST_REPORT_READER, DocumentReader, is_read_error};

pub const STAGE: StageDef = StageDef {
    id: "verification",
    description: "Verify that the file at {file_path} appears to be a medical document, like a blood report. \
                  Scan the document for common medical terms, tables, and reference ranges. \
                  State whether the document is suitable for medical analysis.",
    expected_output: "A confirmation statement. For example: 'The document at {file_path} has been verified and \
                      appears to be a blood test report suitable for analysis.' or 'The document does not \
                      appear to be a standard medical report.'",
    tools: &[BLOOD_TEST_REPORT_READER],
};

/// Asks the verifier whether the submitted document is a medical report
pub struct VerificationTask {
    agent: Agent,
    reader: DocumentReader,
}

impl VerificationTask {
    pub fn new(agent: Agent, reader: DocumentReader) -> Result<Self> {
        STAGE.check_tools(&agent)?;
        Ok(Self { agent, reader })
    }
}

#[async_trait]
impl Task for VerificationTask {
    fn id(&self) -> &str {
        STAGE.id
    }

    async fn run(&self, context: Context, upstream: &Upstream) -> Result<TaskResult> {
        let file_path = required_input(&context, FILE_PATH).await?;
        info!("Verifying document {}", file_path);

        let document = self.reader.read(&file_path).await;
        if is_read_error(&document) {
            warn!("Continuing verification with read error text for {}", file_path);
        }

        let prompt = build_stage_prompt(
            &context,
            &STAGE,
            upstream,
            &[ToolOutput {
                tool: DocumentReader::NAME,
                content: &document,
            }],
        );

        let verdict = self.agent.complete(&context, prompt).await.map_err(|e| {
            error!("Verification failed: {}", e);
            e
        })?;

        Ok(TaskResult::new_with_status(
            verdict,
            format!("Document {file_path} checked by {}", self.agent.role()),
        ))
    }
}
