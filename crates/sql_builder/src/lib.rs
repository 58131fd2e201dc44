//! Post-callback `UPDATE` statements driven by `update_data_config`.

pub mod error;
pub mod escape;
pub mod update;

pub use error::UpdateError;
pub use escape::escape_string;
pub use update::{ColumnOp, OutputMode, ResolutionMode, UpdateOptions, UpdateStatementBuilder};
