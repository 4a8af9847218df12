//! Rebuilds the nested variation layout from the flat move list in a single
//! forward pass, computing every move's position on the way.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};
use shakmaty::Color;

use crate::comment;
use crate::engine::RulesEngine;
use crate::error::{Result, ViewerError};
use crate::log;
use crate::store::MoveStore;
use crate::types::Comment;

/// Glyphs for NAG codes 0..=19. Codes without a glyph render as nothing.
const NAG_SYMBOLS: [Option<&str>; 20] = [
    None,
    Some("!"),
    Some("?"),
    Some("!!"),
    Some("??"),
    Some("!?"),
    Some("?!"),
    Some("□"),
    None,
    None,
    Some("="),
    None,
    None,
    Some("∞"),
    Some("⩲"),
    Some("⩱"),
    Some("±"),
    Some("∓"),
    Some("+−"),
    Some("-+"),
];

pub fn nag_symbol(code: u8) -> &'static str {
    NAG_SYMBOLS
        .get(usize::from(code))
        .copied()
        .flatten()
        .unwrap_or("")
}

pub fn nags_to_symbols(nags: &[u8]) -> String {
    nags.iter().map(|&code| nag_symbol(code)).collect()
}

/// Identity of a clickable element in the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveUnit {
    pub id: UnitId,
    pub index: usize,
    /// Shown for white moves only.
    pub move_number: Option<u32>,
    pub color: Color,
    pub variation_level: u32,
    pub comment_before: Option<String>,
    /// SAN followed by the NAG glyphs.
    pub notation: String,
    pub comment_after: Option<String>,
    pub classes: Vec<String>,
    pub highlighted: bool,
}

/// Board snapshot embedded in the move list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramUnit {
    pub id: UnitId,
    pub index: usize,
    pub fen: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Move(MoveUnit),
    Variation(Scope),
    Diagram(DiagramUnit),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub nodes: Vec<Node>,
}

impl Scope {
    fn find_unit_mut(&mut self, index: usize) -> Option<&mut MoveUnit> {
        for node in &mut self.nodes {
            match node {
                Node::Move(unit) if unit.index == index => return Some(unit),
                Node::Variation(scope) => {
                    if let Some(unit) = scope.find_unit_mut(index) {
                        return Some(unit);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn find_unit(&self, index: usize) -> Option<&MoveUnit> {
        self.nodes.iter().find_map(|node| match node {
            Node::Move(unit) if unit.index == index => Some(unit),
            Node::Variation(scope) => scope.find_unit(index),
            _ => None,
        })
    }

    fn collect_outline(&self, depth: usize, out: &mut Vec<(usize, usize)>) {
        for node in &self.nodes {
            match node {
                Node::Move(unit) => out.push((depth, unit.index)),
                Node::Variation(scope) => scope.collect_outline(depth + 1, out),
                Node::Diagram(_) => {}
            }
        }
    }

    fn to_json(&self) -> Value {
        Value::Array(
            self.nodes
                .iter()
                .map(|node| match node {
                    Node::Move(unit) => json!({
                        "type": "move",
                        "id": unit.id.0,
                        "index": unit.index,
                        "moveNumber": unit.move_number,
                        "color": if unit.color == Color::White { "w" } else { "b" },
                        "commentBefore": unit.comment_before,
                        "notation": unit.notation,
                        "commentAfter": unit.comment_after,
                        "classes": unit.classes,
                        "highlighted": unit.highlighted,
                    }),
                    Node::Variation(scope) => json!({
                        "type": "variation",
                        "nodes": scope.to_json(),
                    }),
                    Node::Diagram(diagram) => json!({
                        "type": "diagram",
                        "id": diagram.id.0,
                        "index": diagram.index,
                        "fen": diagram.fen,
                    }),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for node in &self.nodes {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match node {
                Node::Move(unit) => {
                    if let Some(number) = unit.move_number {
                        write!(f, "{number}. ")?;
                    }
                    if let Some(before) = &unit.comment_before {
                        write!(f, "{{ {before} }} ")?;
                    }
                    f.write_str(&unit.notation)?;
                    if let Some(after) = &unit.comment_after {
                        write!(f, " {{ {} }}", after.trim())?;
                    }
                }
                Node::Variation(scope) => write!(f, "({scope})")?,
                Node::Diagram(_) => f.write_str("[diagram]")?,
            }
        }
        Ok(())
    }
}

/// Output of a render pass: the main-line scope with nested variations,
/// and the click targets registered for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTree {
    pub main: Scope,
    triggers: BTreeMap<UnitId, usize>,
}

impl RenderTree {
    /// Move index a click on `unit` navigates to.
    pub fn trigger(&self, unit: UnitId) -> Option<usize> {
        self.triggers.get(&unit).copied()
    }

    pub fn triggers(&self) -> impl Iterator<Item = (UnitId, usize)> + '_ {
        self.triggers.iter().map(|(&unit, &index)| (unit, index))
    }

    pub fn unit(&self, index: usize) -> Option<&MoveUnit> {
        self.main.find_unit(index)
    }

    pub fn unit_mut(&mut self, index: usize) -> Option<&mut MoveUnit> {
        self.main.find_unit_mut(index)
    }

    /// `(depth, move index)` for every move unit in display order.
    pub fn outline(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        self.main.collect_outline(0, &mut out);
        out
    }

    pub fn to_json(&self) -> Value {
        self.main.to_json()
    }

    pub fn clear(&mut self) {
        self.main.nodes.clear();
        self.triggers.clear();
    }

    fn register(&mut self, index: usize) -> UnitId {
        let unit = UnitId(self.triggers.len());
        self.triggers.insert(unit, index);
        unit
    }
}

impl fmt::Display for RenderTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.main, f)
    }
}

/// Currently open variation scopes; the innermost is last. With nothing
/// open, output goes to the main scope.
#[derive(Debug, Default)]
struct RenderScopeStack {
    open: Vec<Scope>,
}

impl RenderScopeStack {
    fn current<'a>(&'a mut self, main: &'a mut Scope) -> &'a mut Scope {
        match self.open.last_mut() {
            Some(scope) => scope,
            None => main,
        }
    }

    fn open(&mut self) {
        self.open.push(Scope::default());
    }

    /// Closes the innermost scope into its parent. False if none was open.
    fn close(&mut self, main: &mut Scope) -> bool {
        match self.open.pop() {
            Some(scope) => {
                self.current(main).nodes.push(Node::Variation(scope));
                true
            }
            None => false,
        }
    }

    /// Closes everything still open; returns how many scopes that was.
    fn close_all(&mut self, main: &mut Scope) -> usize {
        let open = self.open.len();
        while self.close(main) {}
        open
    }
}

fn unit_classes(level: u32, color: Color) -> Vec<String> {
    let mut classes = vec!["move".to_string()];
    if level > 0 {
        classes.push("var".to_string());
        classes.push(format!("var{level}"));
    }
    if color == Color::White {
        classes.push("white".to_string());
    }
    classes
}

/// Renders every record of `store` into `tree`, filling in each record's
/// `fen` and `color`.
///
/// On failure the output produced so far stays in `tree` (open scopes are
/// folded into their parents) and the error is returned.
pub fn render_moves(
    store: &mut MoveStore,
    engine: &mut RulesEngine,
    tree: &mut RenderTree,
) -> Result<()> {
    tree.clear();
    let initial_fen = store.initial_fen().to_string();
    engine.load(&initial_fen)?;

    let mut stack = RenderScopeStack::default();
    let mut cursor: Option<usize> = None;

    for index in 0..store.len() {
        if let Err(e) = render_one(store, engine, tree, &mut stack, cursor, index) {
            stack.close_all(&mut tree.main);
            log::error(format!("render pass aborted: {e}"));
            return Err(e);
        }
        cursor = Some(index);
    }

    let open = stack.close_all(&mut tree.main);
    engine.load(&initial_fen)?;
    if open > 0 {
        log::warn(format!("render pass left {open} variation scope(s) open"));
        return Err(ViewerError::UnclosedVariation { open });
    }
    Ok(())
}

fn render_one(
    store: &mut MoveStore,
    engine: &mut RulesEngine,
    tree: &mut RenderTree,
    stack: &mut RenderScopeStack,
    cursor: Option<usize>,
    index: usize,
) -> Result<()> {
    let record = store.get(index)?;
    let notation = record.notation;

    // Entering a variation: the engine holds some other line's position.
    if record.prev != cursor {
        let fen = store
            .fen_before(index)?
            .ok_or_else(|| {
                ViewerError::Parse(format!(
                    "move {index} follows a move that has not been rendered yet"
                ))
            })?
            .to_string();
        engine.load(&fen)?;
    }

    let played = engine
        .play(&notation)
        .ok_or_else(|| ViewerError::IllegalMove {
            index,
            notation: notation.to_string(),
            fen: engine.fen(),
        })?;

    let record = store.get_mut(index)?;
    record.fen = Some(played.fen.clone());
    record.color = Some(played.color);
    let record = store.get(index)?;

    if store.is_variation_start(index) {
        stack.open();
    }

    let id = tree.register(index);
    let unit = MoveUnit {
        id,
        index,
        move_number: (played.color == Color::White).then_some(record.move_number),
        color: played.color,
        variation_level: record.variation_level,
        comment_before: record.comment_before.clone(),
        notation: format!("{}{}", notation, nags_to_symbols(&record.nags)),
        comment_after: record
            .comment_after
            .as_ref()
            .and_then(Comment::text)
            .map(comment::clean_text),
        classes: unit_classes(record.variation_level, played.color),
        highlighted: false,
    };
    let wants_diagram = record
        .comment_after
        .as_ref()
        .is_some_and(Comment::is_diagram);
    stack.current(&mut tree.main).nodes.push(Node::Move(unit));

    if wants_diagram {
        let id = tree.register(index);
        stack
            .current(&mut tree.main)
            .nodes
            .push(Node::Diagram(DiagramUnit {
                id,
                index,
                fen: played.fen,
            }));
    }

    if store.is_variation_end(index) && !stack.close(&mut tree.main) {
        log::warn(format!("move {index} ends a variation that was never opened"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_game_from_str;
    use crate::store::tests::record;

    fn render_pgn(pgn: &str) -> (MoveStore, RenderTree, Result<()>) {
        let mut store = read_game_from_str(pgn).unwrap().store;
        let mut engine = RulesEngine::new(store.castling_mode());
        let mut tree = RenderTree::default();
        let result = render_moves(&mut store, &mut engine, &mut tree);
        (store, tree, result)
    }

    #[test]
    fn test_nag_symbols() {
        assert_eq!(nag_symbol(1), "!");
        assert_eq!(nag_symbol(4), "??");
        assert_eq!(nag_symbol(8), "");
        assert_eq!(nag_symbol(19), "-+");
        assert_eq!(nag_symbol(200), "");
        assert_eq!(nags_to_symbols(&[3, 14]), "!!⩲");
    }

    #[test]
    fn test_render_mainline_fills_positions() {
        let (store, tree, result) = render_pgn("1. e4 e5 *");
        result.unwrap();

        let moves = store.moves();
        assert_eq!(
            moves[0].fen.as_deref(),
            Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
        );
        assert_eq!(
            moves[1].fen.as_deref(),
            Some("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
        );
        assert_eq!(moves[0].color, Some(Color::White));
        assert_eq!(moves[1].color, Some(Color::Black));
        assert_eq!(tree.to_string(), "1. e4 e5");
        assert_eq!(tree.outline(), vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn test_render_variation_gets_its_own_scope() {
        let (store, tree, result) = render_pgn("1. e4 e5 2. Nf3 (2. Bc4 Nf6) Nc6 *");
        result.unwrap();

        assert_eq!(tree.to_string(), "1. e4 e5 2. Nf3 (2. Bc4 Nf6) Nc6");
        assert_eq!(
            tree.outline(),
            vec![(0, 0), (0, 1), (0, 2), (1, 3), (1, 4), (0, 5)]
        );
        // Bc4 is played from the position after e5, not after Nf3.
        assert!(store.moves()[3].fen.as_deref().unwrap().contains("2B1P3"));
        assert_eq!(
            tree.unit(3).unwrap().classes,
            vec!["move", "var", "var1", "white"]
        );
    }

    #[test]
    fn test_render_nested_variations() {
        let (_, tree, result) =
            render_pgn("1. e4 e5 (1... c5 2. Nf3 (2. Nc3 Nc6) d6) 2. Nf3 *");
        result.unwrap();

        assert_eq!(
            tree.to_string(),
            "1. e4 e5 (c5 2. Nf3 (2. Nc3 Nc6) d6) 2. Nf3"
        );
        assert_eq!(
            tree.outline(),
            vec![(0, 0), (0, 1), (1, 2), (1, 3), (2, 4), (2, 5), (1, 6), (0, 7)]
        );
    }

    #[test]
    fn test_render_spec_scenario_store() {
        // 0 d4, 1 d5, 2 c4 (main continuation), 3 e6, 4 Nc3, then 5 Nf3 as
        // a side line branching after d5.
        let mut store = MoveStore::default();
        store.push(record("d4", None, Some(1), 0));
        store.push(record("d5", Some(0), Some(2), 0));
        store.push(record("c4", Some(1), Some(3), 0));
        store.push(record("e6", Some(2), Some(4), 0));
        store.push(record("Nc3", Some(3), None, 0));
        store.push(record("Nf3", Some(1), None, 1));

        let mut engine = RulesEngine::default();
        let mut tree = RenderTree::default();
        render_moves(&mut store, &mut engine, &mut tree).unwrap();

        assert_eq!(
            tree.outline(),
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (1, 5)]
        );
        assert!(store.moves()[5].fen.as_deref().unwrap().contains("5N2"));
    }

    #[test]
    fn test_render_comments_nags_and_diagram() {
        let (store, tree, result) =
            render_pgn("{ start } 1. e4! { [%clk 0:03:00] good } e5 { diagram } 2. Nf3?! *");
        result.unwrap();

        let e4 = tree.unit(0).unwrap();
        assert_eq!(e4.comment_before.as_deref(), Some("start"));
        assert_eq!(e4.notation, "e4!");
        assert_eq!(e4.comment_after.as_deref(), Some("good"));
        assert_eq!(tree.unit(1).unwrap().comment_after, None);
        assert_eq!(tree.unit(2).unwrap().notation, "Nf3?!");

        let diagram = tree
            .main
            .nodes
            .iter()
            .find_map(|node| match node {
                Node::Diagram(d) => Some(d),
                _ => None,
            })
            .expect("diagram emitted");
        assert_eq!(diagram.index, 1);
        assert_eq!(Some(diagram.fen.as_str()), store.moves()[1].fen.as_deref());
        assert_eq!(tree.trigger(diagram.id), Some(1));
        assert_eq!(
            tree.to_string(),
            "1. { start } e4! { good } e5 [diagram] 2. Nf3?!"
        );
    }

    #[test]
    fn test_render_diagram_keeps_surrounding_text() {
        let (_, tree, result) = render_pgn("1. e4 { the plan [%diagram] } e5 *");
        result.unwrap();

        assert_eq!(tree.unit(0).unwrap().comment_after.as_deref(), Some("the plan"));
        assert_eq!(tree.to_string(), "1. e4 { the plan } [diagram] e5");
    }

    #[test]
    fn test_render_registers_one_trigger_per_move() {
        let (store, tree, result) = render_pgn("1. e4 e5 2. Nf3 (2. Bc4) Nc6 *");
        result.unwrap();

        let targets: Vec<usize> = tree.triggers().map(|(_, index)| index).collect();
        assert_eq!(targets, (0..store.len()).collect::<Vec<_>>());
        for (unit, index) in tree.triggers() {
            assert_eq!(tree.unit(index).unwrap().id, unit);
        }
    }

    #[test]
    fn test_render_is_idempotent() {
        let pgn = "1. e4 e5 (1... c5 2. Nf3 (2. Nc3) d6) (1... e6) 2. Nf3 *";
        let mut store = read_game_from_str(pgn).unwrap().store;
        let mut engine = RulesEngine::default();

        let mut first = RenderTree::default();
        render_moves(&mut store, &mut engine, &mut first).unwrap();
        let mut second = RenderTree::default();
        render_moves(&mut store, &mut engine, &mut second).unwrap();

        assert_eq!(first.outline(), second.outline());
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_resets_engine_to_initial_position() {
        let mut store = read_game_from_str("1. e4 e5 2. Nf3 *").unwrap().store;
        let mut engine = RulesEngine::default();
        let mut tree = RenderTree::default();
        render_moves(&mut store, &mut engine, &mut tree).unwrap();

        assert_eq!(engine.fen(), store.initial_fen());
    }

    #[test]
    fn test_render_illegal_move_keeps_partial_output() {
        let mut store = MoveStore::default();
        store.push(record("e4", None, Some(1), 0));
        store.push(record("e5", Some(0), Some(2), 0));
        store.push(record("Ke3", Some(1), Some(3), 0));
        store.push(record("Nc6", Some(2), None, 0));

        let mut engine = RulesEngine::default();
        let mut tree = RenderTree::default();
        let err = render_moves(&mut store, &mut engine, &mut tree).unwrap_err();

        assert!(matches!(err, ViewerError::IllegalMove { index: 2, .. }));
        assert_eq!(tree.outline(), vec![(0, 0), (0, 1)]);
        assert!(store.moves()[2].fen.is_none());
    }

    #[test]
    fn test_render_illegal_move_inside_variation_folds_open_scope() {
        let mut store = MoveStore::default();
        store.push(record("e4", None, Some(1), 0));
        store.push(record("e5", Some(0), None, 0));
        store.push(record("c5", Some(0), Some(3), 1));
        store.push(record("Qxf7", Some(2), None, 1));

        let mut engine = RulesEngine::default();
        let mut tree = RenderTree::default();
        let err = render_moves(&mut store, &mut engine, &mut tree).unwrap_err();

        assert!(matches!(err, ViewerError::IllegalMove { index: 3, .. }));
        assert_eq!(tree.outline(), vec![(0, 0), (0, 1), (1, 2)]);
    }

    #[test]
    fn test_render_flags_unclosed_variation() {
        // The side line claims a continuation that keeps it open to the end.
        let mut store = MoveStore::default();
        store.push(record("e4", None, Some(1), 0));
        store.push(record("e5", Some(0), None, 0));
        store.push(record("c5", Some(0), Some(3), 1));
        store.push(record("Nf3", Some(2), Some(3), 1));

        let mut engine = RulesEngine::default();
        let mut tree = RenderTree::default();
        let err = render_moves(&mut store, &mut engine, &mut tree).unwrap_err();

        assert!(matches!(err, ViewerError::UnclosedVariation { open: 1 }));
        assert_eq!(tree.outline(), vec![(0, 0), (0, 1), (1, 2), (1, 3)]);
    }

    #[test]
    fn test_render_json_shape() {
        let (_, tree, result) = render_pgn("1. e4 (1. d4) e5 *");
        result.unwrap();

        let json = tree.to_json();
        assert_eq!(json[0]["type"], "move");
        assert_eq!(json[0]["notation"], "e4");
        assert_eq!(json[0]["moveNumber"], 1);
        assert_eq!(json[1]["type"], "variation");
        assert_eq!(json[1]["nodes"][0]["notation"], "d4");
        assert_eq!(json[2]["color"], "b");
        assert_eq!(json[2]["moveNumber"], Value::Null);
    }

    #[test]
    fn test_render_variation_on_first_move() {
        let (store, tree, result) = render_pgn("1. e4 (1. d4 d5) e5 *");
        result.unwrap();

        assert_eq!(store.moves()[1].prev, None);
        assert!(store.is_variation_start(1));
        assert_eq!(tree.to_string(), "1. e4 (1. d4 d5) e5");
    }
}
