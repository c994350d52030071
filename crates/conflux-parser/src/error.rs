use conflux_core::{CoreError, Position};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("{position}: invalid token {text:?}")]
    Lex { position: Position, text: String },

    #[error("{position}: {message}")]
    Syntax { position: Position, message: String },

    #[error("{filename}: IO error: {message}")]
    Io { filename: String, message: String },

    #[error(transparent)]
    FileSet(#[from] CoreError),
}

impl ParserError {
    pub fn position(&self) -> Option<&Position> {
        match self {
            ParserError::Lex { position, .. } | ParserError::Syntax { position, .. } => {
                Some(position)
            }
            ParserError::Io { .. } | ParserError::FileSet(_) => None,
        }
    }
}
