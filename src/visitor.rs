use std::mem;
use std::ops::ControlFlow;

use pgn_reader::{Nag, Outcome, RawComment, RawTag, SanPlus, Skip, Visitor};
use shakmaty::{CastlingMode, Color, Position};

use crate::comment;
use crate::engine::{fen_string, position_from_fen, starting_fen};
use crate::error::ErrorAccumulator;
use crate::store::MoveStore;
use crate::types::{GameHeaders, LoadedGame, MoveRecord};

/// Where the next move of the line being read attaches.
#[derive(Debug, Clone, Copy, Default)]
struct LineCursor {
    /// Last move played in this line; `None` before the first move.
    last: Option<usize>,
    level: u32,
    /// Set while the line is a variation that has not received a move yet.
    opens_variation: bool,
}

/// Streaming PGN visitor (pgn-reader) that flattens the movetext, side
/// lines included, into a [`MoveStore`].
///
/// Moves get indices in document order. Each variation is read with its own
/// [`LineCursor`] that starts from the predecessor of the move it replaces.
pub struct MoveTreeVisitor {
    headers: GameHeaders,
    store: MoveStore,
    /// Absolute ply count after each stored move.
    plies: Vec<u32>,
    start_ply: u32,
    line: LineCursor,
    saved_lines: Vec<LineCursor>,
    /// Move that a following comment or NAG annotates.
    annotated: Option<usize>,
    pending_before: Option<String>,
    result_marker: Option<String>,
    parse_error: ErrorAccumulator,
    pub current_game: Option<LoadedGame>,
}

impl Default for MoveTreeVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveTreeVisitor {
    pub fn new() -> Self {
        Self {
            headers: GameHeaders::default(),
            store: MoveStore::default(),
            plies: Vec::new(),
            start_ply: 0,
            line: LineCursor::default(),
            saved_lines: Vec::new(),
            annotated: None,
            pending_before: None,
            result_marker: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }

    fn castling_mode(&self) -> CastlingMode {
        match self.headers.get_ignore_case("Variant") {
            Some(variant) if variant.trim().eq_ignore_ascii_case("chess960") => {
                CastlingMode::Chess960
            }
            _ => CastlingMode::Standard,
        }
    }

    /// Sets up the store for the starting position named by the headers.
    fn begin_store(&mut self) {
        let castling_mode = self.castling_mode();
        let mut initial_fen = starting_fen();
        self.start_ply = 0;

        if let Some(raw) = self.headers.get_ignore_case("FEN") {
            match position_from_fen(raw, castling_mode) {
                Ok(pos) => {
                    let fullmoves = pos.fullmoves().get();
                    let black_to_move = u32::from(pos.turn() == Color::Black);
                    self.start_ply = match (fullmoves - 1)
                        .checked_mul(2)
                        .and_then(|ply| ply.checked_add(black_to_move))
                    {
                        Some(ply) => ply,
                        None => {
                            self.parse_error.push(&format!(
                                "fullmove number {fullmoves} out of range; numbering from 1"
                            ));
                            black_to_move
                        }
                    };
                    initial_fen = fen_string(&pos);
                }
                Err(e) => {
                    self.parse_error.push(&format!("{e}; using the standard start"));
                }
            }
        }

        self.store = MoveStore::new(initial_fen, castling_mode);
        self.plies.clear();
        self.line = LineCursor::default();
        self.saved_lines.clear();
        self.annotated = None;
        self.pending_before = None;
    }

    fn push_comment_before(&mut self, raw: &str) {
        let text = comment::clean_text(raw);
        if text.is_empty() {
            return;
        }
        match &mut self.pending_before {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(&text);
            }
            None => self.pending_before = Some(text),
        }
    }

    fn build_game(&mut self) {
        if !self.saved_lines.is_empty() {
            self.parse_error.push(&format!(
                "{} variation(s) not closed at end of movetext",
                self.saved_lines.len()
            ));
        }

        self.current_game = Some(LoadedGame {
            headers: mem::take(&mut self.headers),
            store: mem::take(&mut self.store),
            outcome: self.result_marker.take(),
            parse_error: self.parse_error.take(),
        });
    }

    /// Records a reader-stage failure and emits whatever was read so far.
    pub fn finalize_game_with_error(&mut self, error_msg: String) {
        self.parse_error.push(&error_msg);
        self.build_game();
    }
}

impl Visitor for MoveTreeVisitor {
    type Tags = ();
    type Movetext = ();
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers.clear();
        self.result_marker = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let key = String::from_utf8_lossy(key).into_owned();
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        self.headers.insert_if_absent(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        self.begin_store();
        ControlFlow::Continue(())
    }

    fn san(&mut self, _: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let prev = self.line.last;
        let ply_before = prev.map_or(self.start_ply, |i| self.plies[i]);

        let mut record = MoveRecord::new(0, san_plus, ply_before / 2 + 1);
        record.prev = prev;
        record.variation_level = self.line.level;
        record.comment_before = self.pending_before.take();
        let index = self.store.push(record);
        self.plies.push(ply_before.saturating_add(1));

        if !self.line.opens_variation
            && let Some(prev) = prev
            && let Ok(prev_record) = self.store.get_mut(prev)
        {
            prev_record.next = Some(index);
        }

        self.line.opens_variation = false;
        self.line.last = Some(index);
        self.annotated = Some(index);
        ControlFlow::Continue(())
    }

    fn nag(&mut self, _: &mut Self::Movetext, nag: Nag) -> ControlFlow<Self::Output> {
        if let Some(index) = self.annotated
            && let Ok(record) = self.store.get_mut(index)
        {
            record.nags.push(nag.0);
        }
        ControlFlow::Continue(())
    }

    fn comment(
        &mut self,
        _: &mut Self::Movetext,
        raw_comment: RawComment<'_>,
    ) -> ControlFlow<Self::Output> {
        let raw = String::from_utf8_lossy(raw_comment.as_bytes());

        match self.annotated {
            Some(index) => {
                if let Some(addition) = comment::classify(&raw)
                    && let Ok(record) = self.store.get_mut(index)
                {
                    record.comment_after =
                        Some(comment::merge(record.comment_after.take(), addition));
                }
            }
            None => self.push_comment_before(&raw),
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        // A variation needs a move to be an alternative to. The parser still
        // reports the end of a skipped one, which restores the saved line.
        let Some(replaced) = self.line.last else {
            self.saved_lines.push(self.line);
            self.parse_error.push("variation before the first move of its line ignored");
            return ControlFlow::Continue(Skip(true));
        };
        let parent = self.store.get(replaced).ok().and_then(|record| record.prev);

        self.saved_lines.push(self.line);
        self.line = LineCursor {
            last: parent,
            level: self.line.level + 1,
            opens_variation: true,
        };
        self.annotated = None;
        ControlFlow::Continue(Skip(false))
    }

    fn end_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output> {
        if let Some(line) = self.saved_lines.pop() {
            self.line = line;
        }
        self.annotated = None;
        ControlFlow::Continue(())
    }

    fn outcome(&mut self, _: &mut Self::Movetext, outcome: Outcome) -> ControlFlow<Self::Output> {
        self.result_marker = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, _: Self::Movetext) -> Self::Output {
        self.build_game();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Comment;
    use pgn_reader::Reader;

    fn read(pgn: &str) -> LoadedGame {
        let mut reader = Reader::new(pgn.as_bytes());
        let mut visitor = MoveTreeVisitor::new();
        reader.read_game(&mut visitor).unwrap();
        visitor.current_game.expect("Should have parsed a game")
    }

    fn links(game: &LoadedGame) -> Vec<(Option<usize>, Option<usize>, u32)> {
        game.store
            .moves()
            .iter()
            .map(|m| (m.prev, m.next, m.variation_level))
            .collect()
    }

    #[test]
    fn test_visitor_mainline_links() {
        let game = read("1. e4 e5 2. Nf3 1-0");

        assert_eq!(
            links(&game),
            vec![(None, Some(1), 0), (Some(0), Some(2), 0), (Some(1), None, 0)]
        );
        assert_eq!(game.outcome.as_deref(), Some("1-0"));
        assert!(game.parse_error.is_none());
    }

    #[test]
    fn test_visitor_variation_branches_from_replaced_move() {
        let game = read("1. e4 e5 2. Nf3 (2. Bc4 Nf6) Nc6 *");

        // e4, e5, Nf3, Bc4, Nf6, Nc6
        assert_eq!(
            links(&game),
            vec![
                (None, Some(1), 0),
                (Some(0), Some(2), 0),
                (Some(1), Some(5), 0),
                (Some(1), Some(4), 1),
                (Some(3), None, 1),
                (Some(2), None, 0),
            ]
        );
        assert!(game.store.is_variation_start(3));
        assert!(game.store.is_variation_end(4));
        assert!(game.store.validate().is_ok());
    }

    #[test]
    fn test_visitor_nested_and_sibling_variations() {
        let game = read("1. e4 e5 (1... c5 2. Nf3 (2. Nc3) d6) (1... e6) 2. Nf3 *");

        // 0 e4, 1 e5, 2 c5, 3 Nf3, 4 Nc3, 5 d6, 6 e6, 7 Nf3
        assert_eq!(
            links(&game),
            vec![
                (None, Some(1), 0),
                (Some(0), Some(7), 0),
                (Some(0), Some(3), 1),
                (Some(2), Some(5), 1),
                (Some(2), None, 2),
                (Some(3), None, 1),
                (Some(0), None, 1),
                (Some(1), None, 0),
            ]
        );
        assert!(game.store.is_variation_start(2));
        assert!(game.store.is_variation_start(4));
        assert!(game.store.is_variation_start(6));
        assert!(!game.store.is_variation_start(3));
    }

    #[test]
    fn test_visitor_move_numbers() {
        let game = read("1. e4 e5 2. Nf3 (2. Bc4) Nc6 3. Bb5 *");
        let numbers: Vec<u32> = game.store.moves().iter().map(|m| m.move_number).collect();
        assert_eq!(numbers, vec![1, 1, 2, 2, 2, 3]);
    }

    #[test]
    fn test_visitor_move_numbers_from_fen_header() {
        let game = read(
            r#"[FEN "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3"]

3... a6 4. Ba4 *"#,
        );
        let numbers: Vec<u32> = game.store.moves().iter().map(|m| m.move_number).collect();
        assert_eq!(numbers, vec![3, 4]);
        assert!(game.store.initial_fen().starts_with("r1bqkbnr/pppp1ppp/2n5/1B2p3"));
    }

    #[test]
    fn test_visitor_invalid_fen_header_falls_back() {
        let game = read(
            r#"[FEN "invalid fen string"]

1. e4 *"#,
        );
        assert!(game.parse_error.as_deref().unwrap().contains("invalid FEN"));
        assert_eq!(game.store.initial_fen(), starting_fen());
    }

    #[test]
    fn test_visitor_huge_fullmove_counter_does_not_overflow() {
        let game = read(
            r#"[FEN "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 4294967295"]

e4 e5 Nf3 *"#,
        );
        assert!(
            game.parse_error
                .as_deref()
                .unwrap()
                .contains("fullmove number 4294967295 out of range")
        );
        let numbers: Vec<u32> = game.store.moves().iter().map(|m| m.move_number).collect();
        assert_eq!(numbers, vec![1, 1, 2]);
    }

    #[test]
    fn test_visitor_variation_without_a_move_to_replace_keeps_lines_balanced() {
        let game = read("1. e4 ( (1. c4) 1. d4 ) e5 *");

        // e4, d4, e5; the inner variation has nothing to be an alternative to.
        assert_eq!(
            links(&game),
            vec![(None, Some(2), 0), (None, None, 1), (Some(0), None, 0)]
        );
        assert_eq!(game.store.moves()[1].notation.to_string(), "d4");
        assert!(game.parse_error.as_deref().unwrap().contains("ignored"));
    }

    #[test]
    fn test_visitor_chess960_variant() {
        let game = read(
            r#"[Variant "Chess960"]
[FEN "brkrqnnb/pppppppp/8/8/8/8/PPPPPPPP/BRKRQNNB w KQkq - 0 1"]

1. g3 d5 *"#,
        );
        assert_eq!(game.store.castling_mode(), CastlingMode::Chess960);
    }

    #[test]
    fn test_visitor_comments_before_and_after() {
        let game = read("{ opening } 1. e4 { best by test } e5 ( { instead } 1... c5 ) 2. Nf3 *");
        let moves = game.store.moves();

        assert_eq!(moves[0].comment_before.as_deref(), Some("opening"));
        assert_eq!(
            moves[0].comment_after,
            Some(Comment::Text("best by test".to_string()))
        );
        assert_eq!(moves[2].comment_before.as_deref(), Some("instead"));
        assert_eq!(moves[1].comment_after, None);
    }

    #[test]
    fn test_visitor_diagram_comment() {
        let game = read("1. e4 e5 { diagram } 2. Nf3 { the key square [%diagram] } *");
        assert_eq!(game.store.moves()[1].comment_after, Some(Comment::Diagram(None)));
        assert_eq!(
            game.store.moves()[2].comment_after,
            Some(Comment::Diagram(Some("the key square".to_string())))
        );
    }

    #[test]
    fn test_visitor_command_only_comment_is_dropped() {
        let game = read("1. d4 { [%eval 0.25] [%clk 1:30:43] } Nf6 *");
        assert_eq!(game.store.moves()[0].comment_after, None);
    }

    #[test]
    fn test_visitor_nags_in_order() {
        let game = read("1. e4! $14 e5?? *");
        let moves = game.store.moves();
        assert_eq!(moves[0].nags.as_slice(), &[1, 14]);
        assert_eq!(moves[1].nags.as_slice(), &[4]);
    }

    #[test]
    fn test_visitor_headers_first_value_wins() {
        let game = read(
            r#"[Event "First Event"]
[Event "Second Event"]
[White "Carlsen"]
1. e4 1-0"#,
        );
        assert_eq!(game.headers.get("Event"), Some("First Event"));
        assert_eq!(game.headers.get("White"), Some("Carlsen"));
        assert_eq!(game.result(), Some("1-0"));
    }

    #[test]
    fn test_visitor_empty_movetext() {
        let game = read(
            r#"[Event "Empty"]
[Result "*"]
*"#,
        );
        assert!(game.store.is_empty());
        assert_eq!(game.result(), Some("*"));
    }

    #[test]
    fn test_visitor_error_finalization_sets_parse_error() {
        let mut visitor = MoveTreeVisitor::new();
        let mut reader = Reader::new("1. e4 e5".as_bytes());
        reader.read_game(&mut visitor).unwrap();
        let partial = visitor.current_game.take().unwrap();
        assert_eq!(partial.store.len(), 2);

        visitor.finalize_game_with_error("boom".to_string());
        let game = visitor.current_game.expect("Should have built a game");
        assert_eq!(game.parse_error.as_deref(), Some("boom"));
    }
}
