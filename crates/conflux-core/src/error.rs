use thiserror::Error;

use crate::fileset::Pos;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown type name: {0}")]
    UnknownType(String),

    #[error("Position {0:?} does not belong to any file in the set")]
    PositionOutOfRange(Pos),

    #[error("invalid import path {path:?}: {reason}")]
    InvalidImportPath { path: String, reason: &'static str },

    #[error("file set is full; cannot register {0}")]
    FileSetFull(String),
}
