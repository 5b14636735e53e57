use anyhow::Context;
use serde_json::json;
use verdict_config::VerdictConfig;
use verdict_report::extract::scan_typed_ids;
use verdict_report::{AggregationData, AutoCorrector, FinalReportValidator};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CorrectArgs;
use crate::commands::shared::read_text;
use crate::output::output;

/// Handle `vdt correct`.
///
/// Prints the repaired text, or the input unchanged when nothing applied.
/// With `--out` the text goes to that file and a summary is printed instead.
/// Indices written into a synthesized aggregation block come from a
/// validation pass over the same input.
pub fn handle(args: &CorrectArgs, config: &VerdictConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let raw = read_text(&args.file)?;
    let partials = args.subject.partials()?;
    let meta = args.subject.meta();

    let validation = FinalReportValidator::new(config.validation.clone()).validate(
        &raw,
        &meta,
        partials.as_ref(),
    );
    let referenced = scan_typed_ids(&raw);
    let correction = AutoCorrector::new(config.validation.max_referenced_ids_per_kind).correct(
        &raw,
        &AggregationData {
            subject_id: meta.subject_id.as_deref().unwrap_or("unknown"),
            mode: validation.mode,
            chi: validation.indices.chi.best(),
            ssi: validation.indices.ssi.best(),
            ids: &referenced,
        },
    );

    tracing::info!(fixes = ?correction.fixes, "correction pass finished");

    let Some(path) = &args.out else {
        print!("{}", correction.text);
        return Ok(());
    };
    std::fs::write(path, &correction.text)
        .with_context(|| format!("failed to write {}", path.display()))?;
    output(
        &json!({
            "applied": correction.applied(),
            "fixes": correction.fixes,
            "path": path.display().to_string(),
        }),
        flags.format,
    )
}
