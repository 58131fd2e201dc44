mod commands;

use crate::commands::{
    handle_build_request, handle_update_queries, BuildRequestArgs, CliError, UpdateQueriesArgs,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "callbackctl", about = "Build partner callbacks and follow-up update statements")]
pub struct Cli {
    #[arg(
        long = "log-level",
        short = 'l',
        help = "log filter used when RUST_LOG is unset",
        global = true
    )]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Build (and optionally send) a callback request
    BuildRequest(BuildRequestArgs),
    /// Print the update statements for a callback outcome
    UpdateQueries(UpdateQueriesArgs),
}

fn run_cmd(func: Result<(), CliError>) {
    if let Err(e) = func {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logger(cli.log_level.as_deref());

    match cli.command {
        Cmd::BuildRequest(args) => run_cmd(handle_build_request(&args)),
        Cmd::UpdateQueries(args) => run_cmd(handle_update_queries(&args)),
    }
}
