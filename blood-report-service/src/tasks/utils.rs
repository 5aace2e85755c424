use crew_flow::{Context, FlowError, Result, Upstream};

use super::StageDef;

/// Read a required string input from the shared context
pub async fn required_input(context: &Context, key: &str) -> Result<String> {
    context
        .get(key)
        .await
        .ok_or_else(|| FlowError::ContextError(format!("`{key}` not found in context")))
}

/// Output of a declared upstream stage
pub fn upstream_output<'a>(upstream: &'a Upstream, task_id: &str) -> Result<&'a str> {
    upstream
        .get(task_id)
        .ok_or_else(|| FlowError::ContextError(format!("output of `{task_id}` not in context")))
}

/// A block of tool output to show the agent, labelled with the tool's name
pub struct ToolOutput<'a> {
    pub tool: &'a str,
    pub content: &'a str,
}

/// Render the full stage prompt.
///
/// Placeholders in the description and expected output are filled from the
/// context. Upstream outputs come first, then any tool output.
pub fn build_stage_prompt(
    context: &Context,
    stage: &StageDef,
    upstream: &Upstream,
    tool_outputs: &[ToolOutput<'_>],
) -> String {
    let mut prompt = format!("## Task\n{}\n", context.interpolate(stage.description));

    if !upstream.is_empty() {
        prompt.push_str("\n## Context from previous tasks\n");
        prompt.push_str(&upstream.render());
    }

    for output in tool_outputs {
        prompt.push_str(&format!(
            "\n## Result of the `{}` tool\n---\n{}\n---\n",
            output.tool,
            output.content.trim_end()
        ));
    }

    prompt.push_str(&format!(
        "\n## Expected output\n{}\n",
        context.interpolate(stage.expected_output)
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGE: StageDef = StageDef {
        id: "check",
        description: "Check the file at {file_path}.",
        expected_output: "A verdict on {file_path}.",
        tools: &[],
    };

    #[tokio::test]
    async fn test_prompt_sections_in_order() {
        let context = Context::new();
        context.set("file_path", "data/sample.pdf").await;
        let upstream: Upstream = vec![("verification".to_string(), "Looks medical.".to_string())]
            .into_iter()
            .collect();

        let prompt = build_stage_prompt(
            &context,
            &STAGE,
            &upstream,
            &[ToolOutput {
                tool: "Blood Test Report Reader",
                content: "Hemoglobin 13.5\n",
            }],
        );

        assert!(prompt.starts_with("## Task\nCheck the file at data/sample.pdf.\n"));
        let ctx = prompt.find("### Output of `verification`\nLooks medical.").unwrap();
        let tool = prompt.find("`Blood Test Report Reader` tool\n---\nHemoglobin 13.5\n---").unwrap();
        let expected = prompt.find("## Expected output\nA verdict on data/sample.pdf.").unwrap();
        assert!(ctx < tool && tool < expected);
    }

    #[tokio::test]
    async fn test_prompt_without_context_or_tools() {
        let prompt = build_stage_prompt(&Context::new(), &STAGE, &Upstream::new(), &[]);
        assert!(!prompt.contains("Context from previous tasks"));
        assert!(!prompt.contains("tool\n"));
        assert!(prompt.contains("Check the file at {file_path}."));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let err = required_input(&Context::new(), "query").await.unwrap_err();
        assert!(matches!(err, FlowError::ContextError(_)));
    }
}
