use crate::commands::{read_input, CliError};
use clap::Args;
use common::config::loader::load_update_data_config;
use sql_builder::{UpdateOptions, UpdateStatementBuilder};
use std::path::PathBuf;
use tracing::info_span;

#[derive(Debug, Args)]
pub struct UpdateQueriesArgs {
    /// Update rules, bare or inside a callback configuration (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Stored row the conditions are read from (JSON)
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Partner response the column values are read from
    #[arg(long, value_name = "FILE")]
    pub response: PathBuf,

    /// Trigger state of the row
    #[arg(long)]
    pub state: String,

    /// Outcome of the callback, e.g. success or failed
    #[arg(long)]
    pub status: String,

    /// Emit PREPARE/EXECUTE batches instead of literal statements
    #[arg(long)]
    pub prepared: bool,

    /// Fail on unresolvable column values instead of rendering them empty
    #[arg(long)]
    pub strict: bool,
}

impl UpdateQueriesArgs {
    fn options(&self) -> UpdateOptions {
        let mut options = UpdateOptions::default();
        if self.prepared {
            options = options.prepared();
        }
        if self.strict {
            options = options.strict();
        }
        options
    }
}

/// Print one statement per line. Nothing is executed.
pub fn handle_update_queries(args: &UpdateQueriesArgs) -> Result<(), CliError> {
    let config = load_update_data_config(&args.config).map_err(CliError::update)?;
    let data = read_input(&args.data)?;
    let response = read_input(&args.response)?;

    let queries = UpdateStatementBuilder::new(args.options())
        .with_span(info_span!("update", state = %args.state, status = %args.status))
        .build_from_str(&config, &data, &response, &args.state, &args.status)
        .map_err(CliError::update)?;

    for query in queries {
        println!("{query}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql_builder::{OutputMode, ResolutionMode};
    use test_utils::fixture_path;

    fn args(state: &str, prepared: bool, strict: bool) -> UpdateQueriesArgs {
        UpdateQueriesArgs {
            config: fixture_path("policy_updates.yml"),
            data: fixture_path("policy_snapshot.json"),
            response: fixture_path("partner_response.json"),
            state: state.to_string(),
            status: "success".to_string(),
            prepared,
            strict,
        }
    }

    #[test]
    fn test_flags_map_to_options() {
        let options = args("X", true, true).options();
        assert_eq!(options.output, OutputMode::Prepared);
        assert_eq!(options.resolution, ResolutionMode::Strict);
        assert_eq!(args("X", false, false).options(), UpdateOptions::default());
    }

    #[test]
    fn test_handle_update_queries_from_fixtures() {
        assert!(handle_update_queries(&args("CLAIM_INITIATED", false, false)).is_ok());
        assert!(matches!(
            handle_update_queries(&args("UNKNOWN", false, false)),
            Err(CliError::Update(_))
        ));
    }

    #[test]
    fn test_missing_input_file() {
        let mut missing = args("CLAIM_INITIATED", false, false);
        missing.data = fixture_path("does_not_exist.json");
        assert!(matches!(handle_update_queries(&missing), Err(CliError::Read { .. })));
    }
}
