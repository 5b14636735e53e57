use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `vdt` binary.
#[derive(Debug, Parser)]
#[command(name = "vdt", version, about = "verdict - comment analysis report toolkit")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub const fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;
    use verdict_core::enums::ModuleKind;

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from(["vdt", "--format", "raw", "--verbose", "select", "--once"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Select(ref args) if args.once));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["vdt", "select", "--format", "raw", "--quiet"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Select(ref args) if !args.once));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        let parsed = Cli::try_parse_from(["vdt", "--format", "table", "select"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn module_accepts_id_or_name() {
        for (value, expected) in [("10-2", ModuleKind::Emotions), ("risks", ModuleKind::RisksOpportunities)] {
            let cli = Cli::try_parse_from(["vdt", "check-module", "--module", value, "out.md"])
                .expect("cli should parse");
            match cli.command {
                Commands::CheckModule(args) => {
                    assert_eq!(args.module, expected);
                    assert_eq!(args.attempt, 1);
                    assert_eq!(args.file, Path::new("out.md"));
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    }

    #[test]
    fn module_rejects_unknown_id() {
        let parsed = Cli::try_parse_from(["vdt", "check-module", "--module", "10-9", "out.md"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn report_commands_share_subject_flags() {
        let cli = Cli::try_parse_from([
            "vdt",
            "correct",
            "report.md",
            "--subject",
            "vid-42",
            "--comments",
            "1000",
            "--partials",
            "parts",
            "--out",
            "fixed.md",
        ])
        .expect("cli should parse");

        match cli.command {
            Commands::Correct(args) => {
                assert_eq!(args.subject.subject.as_deref(), Some("vid-42"));
                assert_eq!(args.subject.comments, Some(1000));
                assert_eq!(args.subject.partials.as_deref(), Some(Path::new("parts")));
                assert_eq!(args.out.as_deref(), Some(Path::new("fixed.md")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn analyze_requires_subject_context_and_prompts() {
        assert!(Cli::try_parse_from(["vdt", "analyze", "--subject", "vid-42"]).is_err());

        let cli = Cli::try_parse_from([
            "vdt",
            "analyze",
            "--subject",
            "vid-42",
            "--context",
            "ctx.txt",
            "--prompts",
            "prompts",
        ])
        .expect("cli should parse");
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.subject, "vid-42");
                assert!(args.retry_context.is_none());
                assert!(args.comments.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
