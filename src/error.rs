use std::io;

use thiserror::Error;

/// Failures surfaced by rendering, navigation and input handling.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// A record's notation cannot be played from the position it follows.
    #[error("illegal move {notation} at index {index} from position {fen}")]
    IllegalMove {
        index: usize,
        notation: String,
        fen: String,
    },

    /// Navigation asked for a move that is not in the store.
    #[error("move index {index} out of range (store holds {len} moves)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The move exists but the render pass never reached it.
    #[error("move {index} has no computed position")]
    Unrendered { index: usize },

    #[error("game has no moves")]
    EmptyStore,

    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    /// The render pass finished with variation scopes still open.
    #[error("malformed move list: {open} variation scope(s) left open")]
    UnclosedVariation { open: usize },

    #[error("no game found in PGN input")]
    NoGame,

    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Collects non-fatal diagnostics for a single game.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
