use std::time::Duration;

use shakmaty::Color;

use crate::autoplay::DEFAULT_INTERVAL;
use crate::error::{Result, ViewerError};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ViewerMode {
    /// Move list plus board, navigation enabled.
    #[default]
    View,
    /// Like `View`, with moves playable on the board.
    Edit,
    /// Static move list; navigation controls do nothing.
    Print,
    /// A board for `ViewerConfig::position` only, no moves.
    Board,
}

impl ViewerMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "print" => Ok(Self::Print),
            "board" => Ok(Self::Board),
            other => Err(ViewerError::Parse(format!(
                "Invalid mode value '{}'. Supported values: 'view', 'edit', 'print' or 'board'.",
                other
            ))),
        }
    }

    pub fn allows_navigation(self) -> bool {
        matches!(self, Self::View | Self::Edit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewerConfig {
    pub timer_interval: Duration,
    pub mode: ViewerMode,
    pub show_headers: bool,
    /// Side shown at the bottom of the board.
    pub orientation: Color,
    /// Position for `ViewerMode::Board`; `None` is the starting position.
    pub position: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            timer_interval: DEFAULT_INTERVAL,
            mode: ViewerMode::default(),
            show_headers: true,
            orientation: Color::White,
            position: None,
        }
    }
}

impl ViewerConfig {
    /// Sets the autoplay interval from a millisecond count.
    pub fn with_timer_ms(mut self, raw: &str) -> Result<Self> {
        let normalized = raw.trim();
        let millis = normalized
            .parse::<u64>()
            .ok()
            .filter(|&ms| ms > 0)
            .ok_or_else(|| {
                ViewerError::Parse(format!(
                    "Invalid timer value '{}'. Expected a positive number of milliseconds.",
                    normalized
                ))
            })?;
        self.timer_interval = Duration::from_millis(millis);
        Ok(self)
    }

    pub fn with_mode(mut self, mode: ViewerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_orientation(mut self, orientation: Color) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_position(mut self, fen: impl Into<String>) -> Self {
        self.position = Some(fen.into());
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }
}
