use crate::agents::Roster;
use crate::tasks::*;
use crate::tools::Toolkit;
use crew_flow::{Context, Pipeline, PipelineBuilder, Result, Task};
use std::sync::Arc;

pub const PIPELINE_ID: &str = "blood_report_crew";

/// The five stages in their fixed order, each reading only the outputs it declares
pub fn build_report_pipeline(roster: Roster, toolkit: &Toolkit) -> Result<Pipeline> {
    let verification_task = Arc::new(VerificationTask::new(
        roster.verifier,
        toolkit.reader.clone(),
    )?);
    let verification_id = verification_task.id().to_string();

    let analysis_task = Arc::new(AnalysisTask::new(
        roster.doctor,
        toolkit.reader.clone(),
        toolkit.search.clone(),
    )?);
    let analysis_id = analysis_task.id().to_string();

    let nutrition_task = Arc::new(NutritionTask::new(
        roster.nutritionist,
        toolkit.nutrition.clone(),
    )?);
    let nutrition_id = nutrition_task.id().to_string();

    let exercise_task = Arc::new(ExerciseTask::new(
        roster.exercise_specialist,
        toolkit.exercise.clone(),
    )?);
    let exercise_id = exercise_task.id().to_string();

    let compile_task = Arc::new(CompileTask::new(roster.report_compiler)?);

    PipelineBuilder::new(PIPELINE_ID)
        .add_task(verification_task)
        .add_task_with_context(analysis_task, &[&verification_id])
        .add_task_with_context(nutrition_task, &[&analysis_id])
        .add_task_with_context(exercise_task, &[&analysis_id])
        .add_task_with_context(compile_task, &[&analysis_id, &nutrition_id, &exercise_id])
        .build()
}

/// Shared inputs for one run
pub async fn create_analysis_context(query: &str, file_path: &str) -> Context {
    let context = Context::new();
    context.set(QUERY, query).await;
    context.set(FILE_PATH, file_path).await;
    context
}
