use std::path::PathBuf;

use clap::{Args, Subcommand};
use verdict_core::enums::ModuleKind;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Score one module output against its rubric.
    CheckModule(CheckModuleArgs),
    /// Validate a final synthesized report.
    CheckReport(CheckReportArgs),
    /// Repair envelope and aggregation defects of a final report.
    Correct(CorrectArgs),
    /// Generate, validate and persist one analysis.
    Analyze(AnalyzeArgs),
    /// Rank accumulated analyses and prune all but the best.
    Select(SelectArgs),
}

#[derive(Clone, Debug, Args)]
pub struct CheckModuleArgs {
    /// Module id (10-1 .. 10-4) or name.
    #[arg(short, long)]
    pub module: ModuleKind,

    /// 1-based attempt number; decides whether a retry is still allowed.
    #[arg(long, default_value_t = 1)]
    pub attempt: u32,

    /// Module output to score.
    pub file: PathBuf,
}

/// Subject data shared by the report commands.
#[derive(Clone, Debug, Args)]
pub struct SubjectArgs {
    /// Subject id the report must mention.
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Known comment count of the subject.
    #[arg(long)]
    pub comments: Option<u64>,

    /// Directory holding the module outputs as 10-1.md .. 10-4.md.
    #[arg(long)]
    pub partials: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct CheckReportArgs {
    /// Final report to validate.
    pub file: PathBuf,

    #[command(flatten)]
    pub subject: SubjectArgs,
}

#[derive(Clone, Debug, Args)]
pub struct CorrectArgs {
    /// Final report to repair.
    pub file: PathBuf,

    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Write the repaired text here instead of printing it.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct AnalyzeArgs {
    /// Subject id.
    #[arg(short, long)]
    pub subject: String,

    /// Full context for first attempts.
    #[arg(long)]
    pub context: PathBuf,

    /// Reduced context for retries.
    #[arg(long)]
    pub retry_context: Option<PathBuf>,

    /// Directory with 10-1.md .. 10-4.md and synthesis.md prompts.
    #[arg(long)]
    pub prompts: PathBuf,

    /// Known comment count of the subject.
    #[arg(long)]
    pub comments: Option<u64>,
}

#[derive(Clone, Debug, Args)]
pub struct SelectArgs {
    /// Run a single pass and exit.
    #[arg(long)]
    pub once: bool,
}
