use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use verdict_llm::HttpGenerator;
use verdict_pipeline::{BestOfNSelector, LlmEvaluator};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SelectArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `vdt select`.
///
/// Without `--once` the selector runs on its configured interval until
/// Ctrl-C.
pub async fn handle(args: &SelectArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let generator = HttpGenerator::from_config(&ctx.config.llm)?;
    let evaluator = LlmEvaluator::from_config(generator, &ctx.config.selector)?;
    let selector = BestOfNSelector::new(
        Arc::clone(&ctx.service),
        ctx.artifacts.clone(),
        evaluator,
        ctx.config.selector.clone(),
    );

    if args.once {
        let summary = selector.tick().await?;
        return output(&summary, flags.format);
    }

    let shutdown = CancellationToken::new();
    let on_interrupt = shutdown.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for interrupt");
            return;
        }
        tracing::info!("interrupt received; stopping selector");
        on_interrupt.cancel();
    });

    tracing::info!(
        interval_secs = ctx.config.selector.interval_secs,
        "best-of-N selector started"
    );
    selector.run(shutdown).await;
    Ok(())
}
