//! Flat, index-addressed move list with the variation structure encoded in
//! `prev`/`next`/`variation_level`.

use shakmaty::CastlingMode;

use crate::engine::starting_fen;
use crate::error::{Result, ViewerError};
use crate::types::MoveRecord;

/// Arena of move records. A record's position in the vector is its index.
#[derive(Debug, Clone)]
pub struct MoveStore {
    moves: Vec<MoveRecord>,
    initial_fen: String,
    castling_mode: CastlingMode,
}

impl Default for MoveStore {
    fn default() -> Self {
        Self::new(starting_fen(), CastlingMode::Standard)
    }
}

impl MoveStore {
    pub fn new(initial_fen: String, castling_mode: CastlingMode) -> Self {
        Self {
            moves: Vec::new(),
            initial_fen,
            castling_mode,
        }
    }

    /// Appends a record, assigning it the next free index.
    pub fn push(&mut self, mut record: MoveRecord) -> usize {
        let index = self.moves.len();
        record.index = index;
        self.moves.push(record);
        index
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.moves.len().checked_sub(1)
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn get(&self, index: usize) -> Result<&MoveRecord> {
        self.moves.get(index).ok_or(ViewerError::IndexOutOfRange {
            index,
            len: self.moves.len(),
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut MoveRecord> {
        let len = self.moves.len();
        self.moves
            .get_mut(index)
            .ok_or(ViewerError::IndexOutOfRange { index, len })
    }

    /// Position before the first move of the game.
    pub fn initial_fen(&self) -> &str {
        &self.initial_fen
    }

    pub fn castling_mode(&self) -> CastlingMode {
        self.castling_mode
    }

    /// Position the move at `index` is played from.
    pub fn fen_before(&self, index: usize) -> Result<Option<&str>> {
        match self.get(index)?.prev {
            Some(prev) => Ok(self.get(prev)?.fen.as_deref()),
            None => Ok(Some(self.initial_fen.as_str())),
        }
    }

    /// True when the record opens a side line: it sits below the main line
    /// and is not the main continuation of its predecessor.
    pub fn is_variation_start(&self, index: usize) -> bool {
        let Some(record) = self.moves.get(index) else {
            return false;
        };
        if record.variation_level == 0 {
            return false;
        }
        match record.prev {
            Some(prev) => self.moves.get(prev).and_then(|p| p.next) != Some(index),
            // Alternative to the very first move of the game.
            None => true,
        }
    }

    /// True when the record is the last move of a side line.
    pub fn is_variation_end(&self, index: usize) -> bool {
        self.moves
            .get(index)
            .is_some_and(|record| record.variation_level > 0 && record.next.is_none())
    }

    /// Checks that every `prev`/`next` reference points into the store and
    /// that each `next` link is mirrored by the successor's `prev`.
    pub fn validate(&self) -> Result<()> {
        let len = self.moves.len();
        for record in &self.moves {
            for link in [record.prev, record.next].into_iter().flatten() {
                if link >= len {
                    return Err(ViewerError::IndexOutOfRange { index: link, len });
                }
            }
            if let Some(next) = record.next
                && self.moves[next].prev != Some(record.index)
            {
                return Err(ViewerError::Parse(format!(
                    "move {} lists {} as next, but {} does not follow it",
                    record.index, next, next
                )));
            }
        }
        Ok(())
    }
}
