use verdict_config::VerdictConfig;
use verdict_report::ModuleValidator;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CheckModuleArgs;
use crate::commands::shared::read_text;
use crate::output::output;

/// Handle `vdt check-module`.
pub fn handle(
    args: &CheckModuleArgs,
    config: &VerdictConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let text = read_text(&args.file)?;
    let validator = ModuleValidator::from_config(&config.validation, &config.retry)?;

    let result = validator.validate(args.module, &text, args.attempt.max(1));
    tracing::debug!(
        module = %args.module,
        score = result.rounded_score(),
        valid = result.is_valid,
        "module scored"
    );

    output(&result, flags.format)
}
