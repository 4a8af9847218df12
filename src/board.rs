//! The board the viewer drives, and a plain-text implementation of it.

use std::fmt;

use shakmaty::{Board, Color, File, Rank, Square, fen::Fen};

use crate::error::{Result, ViewerError};

/// Visual board the viewer pushes positions to.
pub trait BoardView {
    fn set_position(&mut self, fen: &str) -> Result<()>;
    fn flip(&mut self);
    fn set_highlights(&mut self, squares: &[Square]);
}

/// ASCII board: one line per rank, pieces by FEN letter, `*` on highlighted
/// empty squares.
#[derive(Debug, Clone)]
pub struct TextBoard {
    board: Board,
    fen: String,
    orientation: Color,
    highlights: Vec<Square>,
}

impl Default for TextBoard {
    fn default() -> Self {
        Self::new(Color::White)
    }
}

impl TextBoard {
    pub fn new(orientation: Color) -> Self {
        Self {
            board: Board::default(),
            fen: crate::engine::starting_fen(),
            orientation,
            highlights: Vec::new(),
        }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn orientation(&self) -> Color {
        self.orientation
    }

    pub fn highlights(&self) -> &[Square] {
        &self.highlights
    }

    fn square_char(&self, square: Square) -> char {
        match self.board.piece_at(square) {
            Some(piece) => piece.char(),
            None if self.highlights.contains(&square) => '*',
            None => '.',
        }
    }
}

impl BoardView for TextBoard {
    fn set_position(&mut self, fen: &str) -> Result<()> {
        let parsed: Fen = fen.trim().parse().map_err(|e| ViewerError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{e}"),
        })?;
        self.board = parsed.into_setup().board;
        self.fen = fen.trim().to_string();
        Ok(())
    }

    fn flip(&mut self) {
        self.orientation = !self.orientation;
    }

    fn set_highlights(&mut self, squares: &[Square]) {
        self.highlights = squares.to_vec();
    }
}

impl fmt::Display for TextBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ranks, files): (Vec<Rank>, Vec<File>) = match self.orientation {
            Color::White => (Rank::ALL.into_iter().rev().collect(), File::ALL.to_vec()),
            Color::Black => (Rank::ALL.to_vec(), File::ALL.into_iter().rev().collect()),
        };
        for &rank in &ranks {
            write!(f, "{} ", rank.char())?;
            for &file in &files {
                write!(f, "{}", self.square_char(Square::from_coords(file, rank)))?;
            }
            writeln!(f)?;
        }
        f.write_str("  ")?;
        for &file in &files {
            write!(f, "{}", file.char())?;
        }
        writeln!(f)
    }
}
