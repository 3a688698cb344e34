use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Result column `{alias}` exceeds {max} bytes; shorten the type or part names on this path")]
    AliasTooLong { alias: String, max: usize },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaterializeError {
    #[error("Result row has no column `{column}`")]
    MissingColumn { column: String },

    #[error("Column `{column}` holds {found}, expected {expected}")]
    UnexpectedValue {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Column `{column}` does not hold valid JSON: {message}")]
    InvalidJson { column: String, message: String },
}
