pub mod build_request;
pub mod update_queries;

pub use build_request::{handle_build_request, BuildRequestArgs};
pub use update_queries::{handle_update_queries, UpdateQueriesArgs};

use std::error::Error;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request build failed: {0}")]
    Build(#[source] Box<dyn Error + Send + Sync>),
    #[error("update query build failed: {0}")]
    Update(#[source] Box<dyn Error + Send + Sync>),
}

impl CliError {
    pub fn build(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        CliError::Build(err.into())
    }

    pub fn update(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        CliError::Update(err.into())
    }
}

pub(crate) fn read_input(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}
