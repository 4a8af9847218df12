use pgn_reader::SanPlus;
use shakmaty::Color;
use smallvec::SmallVec;

use crate::store::MoveStore;

pub type NagList = SmallVec<[u8; 2]>;

/// Text attached after a move, or the request to draw a diagram there
/// together with any prose written next to the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comment {
    Text(String),
    Diagram(Option<String>),
}

impl Comment {
    pub fn is_diagram(&self) -> bool {
        matches!(self, Self::Diagram(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Diagram(Some(text)) => Some(text),
            Self::Diagram(None) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Diagram(text) => text,
        }
    }
}

/// One ply plus the structure and annotations around it.
///
/// `index` is the record's identity inside its [`MoveStore`]; `prev` and
/// `next` refer to other records of the same store.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub index: usize,
    pub notation: SanPlus,
    pub move_number: u32,
    /// Side that played the move; filled in by the render pass.
    pub color: Option<Color>,
    pub prev: Option<usize>,
    /// Main continuation only; the first move of a side line is never a `next`.
    pub next: Option<usize>,
    pub variation_level: u32,
    pub comment_before: Option<String>,
    pub comment_after: Option<Comment>,
    pub nags: NagList,
    /// Position after the move; filled in by the render pass.
    pub fen: Option<String>,
}

impl MoveRecord {
    pub fn new(index: usize, notation: SanPlus, move_number: u32) -> Self {
        Self {
            index,
            notation,
            move_number,
            color: None,
            prev: None,
            next: None,
            variation_level: 0,
            comment_before: None,
            comment_after: None,
            nags: NagList::new(),
            fen: None,
        }
    }
}

/// PGN tag pairs in the order they appeared. The first value of a
/// duplicated tag wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameHeaders(Vec<(String, String)>);

impl GameHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Case-insensitive lookup, used for tags like `FEN` and `Variant`
    /// that are often written in lower case.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn insert_if_absent(&mut self, name: String, value: String) {
        if value.is_empty() || self.get(&name).is_some() {
            return;
        }
        self.0.push((name, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// A parsed game ready to be rendered.
#[derive(Debug, Clone, Default)]
pub struct LoadedGame {
    pub headers: GameHeaders,
    pub store: MoveStore,
    /// Result marker from the movetext, e.g. `1-0`.
    pub outcome: Option<String>,
    /// Non-fatal reader diagnostics joined with `"; "`.
    pub parse_error: Option<String>,
}

impl LoadedGame {
    /// The `Result` tag, falling back to the movetext marker.
    pub fn result(&self) -> Option<&str> {
        self.headers.get("Result").or(self.outcome.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_preserve_first_value() {
        let mut headers = GameHeaders::default();
        headers.insert_if_absent("Event".to_string(), "First".to_string());
        headers.insert_if_absent("Event".to_string(), "Second".to_string());

        assert_eq!(headers.get("Event"), Some("First"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_skip_empty_values() {
        let mut headers = GameHeaders::default();
        headers.insert_if_absent("Site".to_string(), String::new());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_case_insensitive_lookup() {
        let mut headers = GameHeaders::default();
        headers.insert_if_absent("fen".to_string(), "8/8/8/8/8/8/8/8 w - - 0 1".to_string());

        assert_eq!(headers.get("FEN"), None);
        assert!(headers.get_ignore_case("FEN").is_some());
    }

    #[test]
    fn test_result_falls_back_to_outcome_marker() {
        let game = LoadedGame {
            outcome: Some("0-1".to_string()),
            ..LoadedGame::default()
        };
        assert_eq!(game.result(), Some("0-1"));
    }

    #[test]
    fn test_comment_text_and_diagram() {
        assert_eq!(Comment::Text("ok".to_string()).text(), Some("ok"));
        assert!(Comment::Diagram(None).is_diagram());
        assert_eq!(Comment::Diagram(None).text(), None);
        let annotated = Comment::Diagram(Some("critical".to_string()));
        assert!(annotated.is_diagram());
        assert_eq!(annotated.text(), Some("critical"));
    }
}
