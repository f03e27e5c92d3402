use thiserror::Error;

/// Fatal problems with an inventory snapshot. Anything reported here aborts the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{table} table is missing required field `{field}`")]
    MissingField {
        table: &'static str,
        field: &'static str,
    },

    #[error("volume name `{0}` appears more than once in the inventory")]
    DuplicateVolume(String),
}
