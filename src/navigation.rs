//! The "current move" pointer and the transitions that move it.
//!
//! Linear stepping (`go_next`/`go_prev`) follows `next`/`prev` and never
//! crosses into or out of a side line; only [`Navigator::jump_to`] does.

use crate::error::{Result, ViewerError};
use crate::store::MoveStore;
use crate::types::MoveRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Unstarted,
    At(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: Option<usize>, to: usize },
    /// Already at a boundary; nothing changed.
    NoOp,
}

/// Everything that has to follow the pointer: board, engine, highlight,
/// comment surface.
pub trait TransitionEffects {
    /// Runs before the pointer moves; an error leaves the pointer in place.
    fn apply(&mut self, from: Option<usize>, to: &MoveRecord) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Navigator {
    current: Option<usize>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn state(&self) -> NavState {
        match self.current {
            Some(index) => NavState::At(index),
            None => NavState::Unstarted,
        }
    }

    pub fn go_to_first(
        &mut self,
        store: &MoveStore,
        effects: &mut impl TransitionEffects,
    ) -> Result<Transition> {
        if store.is_empty() {
            return Err(ViewerError::EmptyStore);
        }
        self.jump_to(store, 0, effects)
    }

    pub fn go_to_last(
        &mut self,
        store: &MoveStore,
        effects: &mut impl TransitionEffects,
    ) -> Result<Transition> {
        let last = store.last_index().ok_or(ViewerError::EmptyStore)?;
        self.jump_to(store, last, effects)
    }

    /// Follows the main continuation of the current move. Unstarted means
    /// the first move; the end of a line is a no-op.
    pub fn go_next(
        &mut self,
        store: &MoveStore,
        effects: &mut impl TransitionEffects,
    ) -> Result<Transition> {
        match self.current {
            None if store.is_empty() => Ok(Transition::NoOp),
            None => self.go_to_first(store, effects),
            Some(index) => match store.get(index)?.next {
                Some(next) => self.jump_to(store, next, effects),
                None => Ok(Transition::NoOp),
            },
        }
    }

    pub fn go_prev(
        &mut self,
        store: &MoveStore,
        effects: &mut impl TransitionEffects,
    ) -> Result<Transition> {
        let Some(index) = self.current else {
            return Ok(Transition::NoOp);
        };
        match store.get(index)?.prev {
            Some(prev) => self.jump_to(store, prev, effects),
            None => Ok(Transition::NoOp),
        }
    }

    /// Makes `index` current regardless of where the pointer is.
    pub fn jump_to(
        &mut self,
        store: &MoveStore,
        index: usize,
        effects: &mut impl TransitionEffects,
    ) -> Result<Transition> {
        let target = store.get(index)?;
        let from = self.current;
        effects.apply(from, target)?;
        self.current = Some(index);
        Ok(Transition::Moved { from, to: index })
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
