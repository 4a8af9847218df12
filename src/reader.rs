use std::fs::File;
use std::io::Read;
use std::path::Path;

use pgn_reader::Reader;
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::error::{Result, ViewerError};
use crate::log;
use crate::types::LoadedGame;
use crate::visitor::MoveTreeVisitor;

pub type PgnInput = Box<dyn Read + Send>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompressionMode {
    #[default]
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim();
        if normalized.is_empty() || normalized.eq_ignore_ascii_case("none") {
            Ok(Self::Plain)
        } else if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else {
            Err(ViewerError::Parse(format!(
                "Invalid compression value '{}'. Supported values: 'zstd' or 'none'.",
                normalized
            )))
        }
    }

    /// Picks the mode from the file extension (`.zst` means zstd).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

pub fn open_pgn(path: &Path, compression: CompressionMode) -> Result<PgnInput> {
    let file = File::open(path).map_err(|e| {
        ViewerError::Parse(format!("Failed to open file '{}': {}", path.display(), e))
    })?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|e| {
                ViewerError::Parse(format!(
                    "Failed to initialize zstd decoder for '{}': {}",
                    path.display(),
                    e
                ))
            }),
    }
}

/// Reads every game from `input`. A game the parser chokes on is kept with
/// its `parse_error` set, and reading stops there.
pub fn read_games<R: Read>(input: R, source: &str) -> Vec<LoadedGame> {
    let mut reader = Reader::new(input);
    let mut visitor = MoveTreeVisitor::new();
    let mut games = Vec::new();
    let mut game_index = 1;

    loop {
        match reader.read_game(&mut visitor) {
            Ok(Some(())) => {
                if let Some(game) = visitor.current_game.take() {
                    games.push(game);
                }
                game_index += 1;
            }
            Ok(None) => break,
            Err(error) => {
                let error_msg = format!(
                    "Parser-stage error: source='{}'; game_index={}; error={}",
                    source, game_index, error
                );
                log::warn(&error_msg);
                visitor.finalize_game_with_error(error_msg);
                if let Some(game) = visitor.current_game.take() {
                    games.push(game);
                }
                break;
            }
        }
    }

    games
}

pub fn read_games_from_str(pgn: &str) -> Vec<LoadedGame> {
    read_games(pgn.as_bytes(), "<string>")
}

/// First game of `pgn`.
pub fn read_game_from_str(pgn: &str) -> Result<LoadedGame> {
    read_games_from_str(pgn)
        .into_iter()
        .next()
        .ok_or(ViewerError::NoGame)
}

pub fn read_games_from_path(path: &Path, compression: CompressionMode) -> Result<Vec<LoadedGame>> {
    let input = open_pgn(path, compression)?;
    Ok(read_games(input, &path.display().to_string()))
}
