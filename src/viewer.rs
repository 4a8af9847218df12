//! One viewer instance: owns the game, its rendered move list, the working
//! position, the current-move pointer and the autoplay timer.

use std::time::Instant;

use shakmaty::{Piece, Square};

use crate::autoplay::Autoplay;
use crate::board::BoardView;
use crate::config::{ViewerConfig, ViewerMode};
use crate::engine::{PlayedMove, RulesEngine, starting_fen};
use crate::error::{Result, ViewerError};
use crate::log;
use crate::navigation::{NavState, Navigator, Transition, TransitionEffects};
use crate::reader::read_game_from_str;
use crate::render::{RenderTree, UnitId, render_moves};
use crate::store::MoveStore;
use crate::types::{GameHeaders, LoadedGame, MoveRecord};

/// Named buttons of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    First,
    Prev,
    Next,
    Last,
    Flip,
    PlayToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Space,
}

impl Key {
    pub fn control(self) -> Control {
        match self {
            Key::Left => Control::Prev,
            Key::Right => Control::Next,
            Key::Space => Control::PlayToggle,
        }
    }
}

/// Answer to a piece dropped on the board in edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Accepted(PlayedMove),
    /// Illegal; the piece goes back to its square.
    Snapback,
}

/// Players plus the remaining headers as a single `" | "` separated line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLine {
    pub white: Option<String>,
    pub black: Option<String>,
    pub rest: String,
}

impl HeaderLine {
    const REST: [&'static str; 6] = ["Event", "Site", "Round", "Date", "ECO", "Result"];

    pub fn from_game(game: &LoadedGame) -> Self {
        let headers = &game.headers;
        let rest = Self::REST
            .iter()
            .filter_map(|&name| match name {
                "Result" => game.result(),
                _ => headers.get(name),
            })
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        Self {
            white: non_empty(headers, "White"),
            black: non_empty(headers, "Black"),
            rest,
        }
    }
}

/// Position shown when the viewer is only a board.
fn board_position(config: &ViewerConfig) -> String {
    config.position.clone().unwrap_or_else(starting_fen)
}

fn non_empty(headers: &GameHeaders, name: &str) -> Option<String> {
    headers
        .get(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// What follows the pointer on every transition.
struct ViewEffects<'a> {
    engine: &'a mut RulesEngine,
    board: &'a mut dyn BoardView,
    tree: &'a mut RenderTree,
    comment_surface: &'a mut String,
}

impl TransitionEffects for ViewEffects<'_> {
    fn apply(&mut self, from: Option<usize>, to: &MoveRecord) -> Result<()> {
        let fen = to
            .fen
            .as_deref()
            .ok_or(ViewerError::Unrendered { index: to.index })?;
        self.board.set_position(fen)?;
        self.engine.load(fen)?;

        if let Some(from) = from
            && let Some(unit) = self.tree.unit_mut(from)
        {
            unit.highlighted = false;
        }
        if let Some(unit) = self.tree.unit_mut(to.index) {
            unit.highlighted = true;
        }

        self.comment_surface.clear();
        if let Some(text) = to.comment_after.as_ref().and_then(|c| c.text()) {
            self.comment_surface.push_str(text);
        }
        Ok(())
    }
}

pub struct Viewer {
    config: ViewerConfig,
    game: LoadedGame,
    tree: RenderTree,
    engine: RulesEngine,
    navigator: Navigator,
    autoplay: Autoplay,
    board: Box<dyn BoardView>,
    header_line: Option<HeaderLine>,
    comment_surface: String,
    highlights: Vec<Square>,
}

impl Viewer {
    /// `board` is expected in its default, white-at-the-bottom orientation.
    pub fn new(config: ViewerConfig, mut board: Box<dyn BoardView>) -> Result<Self> {
        let position = board_position(&config);
        let mut engine = RulesEngine::default();
        engine.load(&position)?;
        board.set_position(&position)?;
        if config.orientation == shakmaty::Color::Black {
            board.flip();
        }

        Ok(Self {
            autoplay: Autoplay::new(config.timer_interval),
            config,
            game: LoadedGame::default(),
            tree: RenderTree::default(),
            engine,
            navigator: Navigator::new(),
            board,
            header_line: None,
            comment_surface: String::new(),
            highlights: Vec::new(),
        })
    }

    pub fn from_pgn(pgn: &str, config: ViewerConfig, board: Box<dyn BoardView>) -> Result<Self> {
        let mut viewer = Self::new(config, board)?;
        viewer.load_pgn(pgn)?;
        Ok(viewer)
    }

    /// Loads the first game of `pgn`. Call [`Viewer::generate_moves`] to show it.
    pub fn load_pgn(&mut self, pgn: &str) -> Result<()> {
        let game = read_game_from_str(pgn)?;
        self.load_game(game);
        Ok(())
    }

    pub fn load_game(&mut self, game: LoadedGame) {
        if let Some(error) = &game.parse_error {
            log::warn(format!("game loaded with errors: {error}"));
        }
        self.engine = RulesEngine::new(game.store.castling_mode());
        self.game = game;
        self.tree.clear();
        self.header_line = None;
        self.reset_interaction();
        if self.config.mode == ViewerMode::Board
            && let Err(error) = self.engine.load(&board_position(&self.config))
        {
            log::warn(format!("could not load board position: {error}"));
        }
    }

    fn reset_interaction(&mut self) {
        self.navigator.reset();
        self.autoplay.stop();
        self.comment_surface.clear();
        self.highlights.clear();
    }

    /// Renders the move list and header line and puts the board on the
    /// game's initial position. Rendering errors are returned; whatever was
    /// rendered before the error stays visible.
    pub fn generate_moves(&mut self) -> Result<()> {
        self.reset_interaction();
        self.tree.clear();
        if self.config.mode == ViewerMode::Board {
            let position = board_position(&self.config);
            self.engine.load(&position)?;
            return self.board.set_position(&position);
        }

        self.header_line = self
            .config
            .show_headers
            .then(|| HeaderLine::from_game(&self.game));

        let initial_fen = self.game.store.initial_fen().to_string();
        if let Err(error) = render_moves(&mut self.game.store, &mut self.engine, &mut self.tree) {
            if let Err(reset) = self.engine.load(&initial_fen) {
                log::warn(format!("could not restore initial position: {reset}"));
            }
            return Err(error);
        }
        self.board.set_position(&initial_fen)
    }

    fn navigate<F>(&mut self, step: F) -> Result<Transition>
    where
        F: FnOnce(&mut Navigator, &MoveStore, &mut ViewEffects<'_>) -> Result<Transition>,
    {
        let mut effects = ViewEffects {
            engine: &mut self.engine,
            board: self.board.as_mut(),
            tree: &mut self.tree,
            comment_surface: &mut self.comment_surface,
        };
        step(&mut self.navigator, &self.game.store, &mut effects)
    }

    pub fn go_to_first(&mut self) -> Result<Transition> {
        self.navigate(|nav, store, fx| nav.go_to_first(store, fx))
    }

    pub fn go_to_last(&mut self) -> Result<Transition> {
        self.navigate(|nav, store, fx| nav.go_to_last(store, fx))
    }

    pub fn go_next(&mut self) -> Result<Transition> {
        self.navigate(|nav, store, fx| nav.go_next(store, fx))
    }

    pub fn go_prev(&mut self) -> Result<Transition> {
        self.navigate(|nav, store, fx| nav.go_prev(store, fx))
    }

    pub fn jump_to(&mut self, index: usize) -> Result<Transition> {
        self.navigate(|nav, store, fx| nav.jump_to(store, index, fx))
    }

    /// Dispatches a button press. Does nothing outside view and edit mode;
    /// first/last on a game without moves are ignored.
    pub fn handle_control(&mut self, control: Control) -> Result<()> {
        if !self.config.mode.allows_navigation() {
            return Ok(());
        }
        let outcome = match control {
            Control::First => self.go_to_first(),
            Control::Prev => self.go_prev(),
            Control::Next => self.go_next(),
            Control::Last => self.go_to_last(),
            Control::Flip => {
                self.board.flip();
                return Ok(());
            }
            Control::PlayToggle => {
                self.toggle_play(Instant::now());
                return Ok(());
            }
        };
        match outcome {
            Ok(_) | Err(ViewerError::EmptyStore) => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub fn handle_key(&mut self, key: Key) -> Result<()> {
        self.handle_control(key.control())
    }

    /// Click on a rendered move.
    pub fn click(&mut self, unit: UnitId) -> Result<()> {
        if !self.config.mode.allows_navigation() {
            return Ok(());
        }
        match self.tree.trigger(unit) {
            Some(index) => self.jump_to(index).map(|_| ()),
            None => {
                log::warn(format!("click on unknown unit {}", unit.0));
                Ok(())
            }
        }
    }

    pub fn toggle_play(&mut self, now: Instant) {
        if self.config.mode.allows_navigation() {
            self.autoplay.toggle(now);
        }
    }

    /// Label for the play-toggle button.
    pub fn play_label(&self) -> &'static str {
        if self.autoplay.is_running() {
            "stop"
        } else {
            "play"
        }
    }

    /// Advances one move if an autoplay tick is due. True when a tick fired.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        if !self.autoplay.poll(now) {
            return Ok(false);
        }
        self.go_next()?;
        Ok(true)
    }

    /// Replaces the rendered comment of the current move. The store keeps
    /// the comment read from the PGN.
    pub fn edit_comment(&mut self, text: &str) {
        let Some(current) = self.navigator.current() else {
            return;
        };
        if let Some(unit) = self.tree.unit_mut(current) {
            unit.comment_after = Some(format!(" {text} "));
        }
        self.comment_surface = text.to_string();
    }

    /// Edit-mode board hooks. In every other mode they leave the engine,
    /// the board and the highlights alone.
    pub fn on_drag_start(&self, piece: Piece) -> bool {
        self.config.mode == ViewerMode::Edit
            && !self.engine.is_game_over()
            && piece.color == self.engine.turn()
    }

    pub fn on_drop(&mut self, from: Square, to: Square) -> DropOutcome {
        if self.config.mode != ViewerMode::Edit {
            return DropOutcome::Snapback;
        }
        self.clear_highlights();
        match self.engine.play_from_to(from, to) {
            Some(played) => DropOutcome::Accepted(played),
            None => DropOutcome::Snapback,
        }
    }

    /// Highlights `square` and where its piece can go, if anywhere.
    pub fn on_mouseover_square(&mut self, square: Square) {
        if self.config.mode != ViewerMode::Edit {
            return;
        }
        let targets = self.engine.legal_destinations(square);
        if targets.is_empty() {
            return;
        }
        self.highlights = std::iter::once(square).chain(targets).collect();
        self.board.set_highlights(&self.highlights);
    }

    pub fn on_mouseout_square(&mut self) {
        if self.config.mode == ViewerMode::Edit {
            self.clear_highlights();
        }
    }

    pub fn on_snap_end(&mut self) -> Result<()> {
        if self.config.mode != ViewerMode::Edit {
            return Ok(());
        }
        self.board.set_position(&self.engine.fen())
    }

    fn clear_highlights(&mut self) {
        self.highlights.clear();
        self.board.set_highlights(&[]);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn game(&self) -> &LoadedGame {
        &self.game
    }

    pub fn tree(&self) -> &RenderTree {
        &self.tree
    }

    pub fn engine(&self) -> &RulesEngine {
        &self.engine
    }

    pub fn state(&self) -> NavState {
        self.navigator.state()
    }

    pub fn current(&self) -> Option<usize> {
        self.navigator.current()
    }

    pub fn header_line(&self) -> Option<&HeaderLine> {
        self.header_line.as_ref()
    }

    pub fn comment_surface(&self) -> &str {
        &self.comment_surface
    }

    pub fn highlights(&self) -> &[Square] {
        &self.highlights
    }

    pub fn is_playing(&self) -> bool {
        self.autoplay.is_running()
    }
}
