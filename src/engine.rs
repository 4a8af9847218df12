//! Working position used while rendering and during interactive play.

use pgn_reader::SanPlus;
use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square, fen::Fen,
};

use crate::error::{Result, ViewerError};

/// A move that was accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub color: Color,
    pub san: SanPlus,
    pub from: Option<Square>,
    pub to: Square,
    /// Position after the move.
    pub fen: String,
}

pub fn fen_string(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn starting_fen() -> String {
    fen_string(&Chess::default())
}

pub fn position_from_fen(fen: &str, castling_mode: CastlingMode) -> Result<Chess> {
    let parsed: Fen = fen.trim().parse().map_err(|e| ViewerError::InvalidFen {
        fen: fen.to_string(),
        reason: format!("{e}"),
    })?;
    parsed
        .into_position::<Chess>(castling_mode)
        .map_err(|e| ViewerError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{e}"),
        })
}

#[derive(Debug, Clone)]
pub struct RulesEngine {
    pos: Chess,
    castling_mode: CastlingMode,
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new(CastlingMode::Standard)
    }
}

impl RulesEngine {
    pub fn new(castling_mode: CastlingMode) -> Self {
        Self {
            pos: Chess::default(),
            castling_mode,
        }
    }

    /// Back to the standard starting position.
    pub fn reset(&mut self) {
        self.pos = Chess::default();
    }

    pub fn load(&mut self, fen: &str) -> Result<()> {
        self.pos = position_from_fen(fen, self.castling_mode)?;
        Ok(())
    }

    /// Plays `san` if it is legal here; the position is untouched otherwise.
    pub fn play(&mut self, san: &SanPlus) -> Option<PlayedMove> {
        let m = san.san.to_move(&self.pos).ok()?;
        Some(self.play_legal(m))
    }

    /// Plays the legal move from `from` to `to`, preferring a queen when the
    /// move is a promotion.
    pub fn play_from_to(&mut self, from: Square, to: Square) -> Option<PlayedMove> {
        let m = self
            .pos
            .legal_moves()
            .into_iter()
            .filter(|m| m.from() == Some(from) && m.to() == to)
            .find(|m| matches!(m.promotion(), None | Some(Role::Queen)))?;
        Some(self.play_legal(m))
    }

    fn play_legal(&mut self, m: Move) -> PlayedMove {
        let color = self.pos.turn();
        let (from, to) = (m.from(), m.to());
        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, m);
        PlayedMove {
            color,
            san,
            from,
            to,
            fen: fen_string(&self.pos),
        }
    }

    pub fn fen(&self) -> String {
        fen_string(&self.pos)
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    pub fn is_game_over(&self) -> bool {
        self.pos.is_game_over()
    }

    /// Squares the piece on `square` can legally move to.
    pub fn legal_destinations(&self, square: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .pos
            .legal_moves()
            .into_iter()
            .filter(|m| m.from() == Some(square))
            .map(|m| m.to())
            .collect();
        targets.dedup();
        targets
    }

    pub fn position(&self) -> &Chess {
        &self.pos
    }
}
