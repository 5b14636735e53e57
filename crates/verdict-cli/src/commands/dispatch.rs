use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a command that needs the analysis store.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => commands::analyze::handle(&args, ctx, flags).await,
        Commands::Select(args) => commands::select::handle(&args, ctx, flags).await,
        Commands::CheckModule(_) | Commands::Correct(_) | Commands::CheckReport(_) => {
            unreachable!("offline commands are pre-dispatched in main")
        }
    }
}
