use thiserror::Error;

use crate::metadata::MetadataError;
use crate::sql::SqlError;

/// Any action-building or execution failure.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Sql(#[from] SqlError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Action {0} already exists in this registry")]
    DuplicateAction(String),
    #[error("Action {0} does not exist in this registry")]
    UnknownAction(String),
    #[error("Weight offset {0} is outside of this registry")]
    WeightOffsetOutOfRange(usize),
    #[error("No tables available for {0}")]
    NoTables(&'static str),
    #[error("Only table names can be injected into custom queries, not {0}")]
    UnsupportedInjection(String),
}
