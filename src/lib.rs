//! PGN game viewer core: a flat move store rebuilt into nested variations,
//! a current-move state machine and an autoplay driver.

pub mod autoplay;
pub mod board;
pub mod comment;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod navigation;
pub mod reader;
pub mod render;
pub mod store;
pub mod types;
pub mod viewer;
pub mod visitor;

pub use autoplay::{Autoplay, AutoplayState};
pub use board::{BoardView, TextBoard};
pub use config::{ViewerConfig, ViewerMode};
pub use engine::{PlayedMove, RulesEngine};
pub use error::{Result, ViewerError};
pub use navigation::{NavState, Navigator, Transition, TransitionEffects};
pub use reader::{CompressionMode, read_game_from_str, read_games_from_path, read_games_from_str};
pub use render::{RenderTree, UnitId, render_moves};
pub use store::MoveStore;
pub use types::{Comment, GameHeaders, LoadedGame, MoveRecord};
pub use viewer::{Control, DropOutcome, HeaderLine, Key, Viewer};
