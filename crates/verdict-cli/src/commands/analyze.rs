use std::sync::Arc;

use serde_json::json;
use verdict_llm::HttpGenerator;
use verdict_pipeline::{
    AnalysisRequest, AnalysisRunner, Outcome, PromptSet, RetryOrchestrator, RunReport,
};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::AnalyzeArgs;
use crate::commands::shared::read_text;
use crate::context::AppContext;
use crate::output::output;

/// Handle `vdt analyze`.
///
/// Ctrl-C cancels the run; whatever was persisted so far is rolled back.
pub async fn handle(args: &AnalyzeArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let generator = HttpGenerator::from_config(&ctx.config.llm)?;
    let prompts = PromptSet::load_dir(&args.prompts)?;
    let orchestrator =
        RetryOrchestrator::from_config(generator, prompts, &ctx.config, ctx.events.clone())?;
    let runner = AnalysisRunner::new(
        orchestrator,
        Arc::clone(&ctx.service),
        ctx.artifacts.clone(),
        ctx.evaluation_delay(),
    );

    let request = build_request(args)?;
    let run = runner.run(&request);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    tracing::info!(subject_id = %request.subject_id, "interrupt received");
                    runner.cancel(&request.subject_id);
                }
                Err(error) => tracing::warn!(%error, "failed to listen for interrupt"),
            }
            run.await
        }
    };

    let RunReport { outcome, record } = result?;
    let outcome_label = outcome.record_outcome();
    let report = match outcome {
        Outcome::Accepted(report) | Outcome::Degraded(report) => report,
        Outcome::Failed(error) => {
            return Err(anyhow::Error::new(error)
                .context(format!("analysis for '{}' failed", request.subject_id)));
        }
    };

    output(
        &json!({
            "subject_id": report.subject_id,
            "outcome": outcome_label,
            "status": report.validation.status,
            "score": report.validation.score,
            "issues": report.validation.issues,
            "degraded_modules": report.degraded_modules().collect::<Vec<_>>(),
            "synthesis_attempts": report.synthesis_attempts,
            "record": record,
            "text": report.text,
        }),
        flags.format,
    )
}

fn build_request(args: &AnalyzeArgs) -> anyhow::Result<AnalysisRequest> {
    let mut request = AnalysisRequest::new(&args.subject, read_text(&args.context)?);
    if let Some(path) = &args.retry_context {
        request = request.with_retry_context(read_text(path)?);
    }
    if let Some(count) = args.comments {
        request = request.with_comment_count(count);
    }
    Ok(request)
}
