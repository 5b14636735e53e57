use verdict_config::VerdictConfig;
use verdict_report::FinalReportValidator;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CheckReportArgs;
use crate::commands::shared::read_text;
use crate::output::output;

/// Handle `vdt check-report`.
pub fn handle(
    args: &CheckReportArgs,
    config: &VerdictConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let raw = read_text(&args.file)?;
    let partials = args.subject.partials()?;

    let result = FinalReportValidator::new(config.validation.clone()).validate(
        &raw,
        &args.subject.meta(),
        partials.as_ref(),
    );
    tracing::debug!(
        status = %result.status,
        score = result.score,
        issues = result.issues.len(),
        "report validated"
    );

    output(&result, flags.format)
}
