use std::sync::LazyLock;

use crate::types::Comment;

/// Embedded commands such as `[%clk 0:03:00]` or `[%eval 0.17]`.
static COMMAND_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\[%[^\]]*\]").expect("valid comment command regex"));

static DIAGRAM_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^\s*diagram\s*$|\[%diagram\]")
        .expect("valid diagram marker regex")
});

pub fn is_diagram_marker(raw: &str) -> bool {
    DIAGRAM_RE.is_match(raw)
}

/// Removes embedded commands and collapses whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_commands = COMMAND_RE.replace_all(raw, " ");
    without_commands
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns raw comment text into what a move carries after it. Comments that
/// only held commands yield `None`.
pub fn classify(raw: &str) -> Option<Comment> {
    if is_diagram_marker(raw) {
        let text = clean_text(&DIAGRAM_RE.replace_all(raw, " "));
        return Some(Comment::Diagram((!text.is_empty()).then_some(text)));
    }
    let text = clean_text(raw);
    if text.is_empty() {
        None
    } else {
        Some(Comment::Text(text))
    }
}

/// Appends `addition` to an existing comment. A diagram request on either
/// side is kept, and so is the text of both.
pub fn merge(existing: Option<Comment>, addition: Comment) -> Comment {
    let Some(existing) = existing else {
        return addition;
    };
    let diagram = existing.is_diagram() || addition.is_diagram();
    let text = match (existing.into_text(), addition.into_text()) {
        (Some(mut text), Some(more)) => {
            text.push(' ');
            text.push_str(&more);
            Some(text)
        }
        (text, more) => text.or(more),
    };
    if diagram {
        Comment::Diagram(text)
    } else {
        Comment::Text(text.unwrap_or_default())
    }
}
