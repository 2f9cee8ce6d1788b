//! Integration tests for inline diff highlighting over highlighted blocks.

use lectern_diff::{
    DiffBlock, Fragment, Highlighter, InlineDiffOptions, InlineMark, LineKind, PlainHighlighter,
    StyledText, highlight_inline_diffs,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Splits text into word, whitespace and punctuation tokens, each styled by
/// its class, so that changed spans regularly straddle fragment boundaries.
struct TokenHighlighter;

impl Highlighter for TokenHighlighter {
    fn highlight(&self, text: &str, _language: Option<&str>) -> Vec<StyledText> {
        fn class(c: char) -> &'static str {
            if c.is_alphanumeric() || c == '_' {
                "word"
            } else if c.is_whitespace() {
                "space"
            } else {
                "punct"
            }
        }

        let mut out: Vec<StyledText> = Vec::new();
        for c in text.chars() {
            match out.last_mut() {
                Some(last) if last.style.as_deref() == Some(class(c)) && class(c) != "punct" => {
                    last.text.push(c)
                }
                _ => out.push(StyledText::styled(c.to_string(), class(c))),
            }
        }
        out
    }
}

fn block(lines: &[(LineKind, &str)]) -> DiffBlock {
    DiffBlock::from_lines(lines.iter().copied(), Some("ts"), &TokenHighlighter)
}

fn plain_texts(block: &DiffBlock) -> Vec<String> {
    block.lines.iter().map(|l| l.plain_text()).collect()
}

// =============================================================================
// Heuristic
// =============================================================================

#[test]
fn test_poopstate_marks_single_removed_char() {
    let mut blocks = vec![block(&[
        (LineKind::Remove, "console.log('poopstate')"),
        (LineKind::Add, "console.log('popstate')"),
    ])];

    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(stats.highlighted, 1);
    let lines = &blocks[0].lines;
    assert_eq!(lines[0].marked_text(InlineMark::Removed), vec!["o"]);
    assert!(lines[1].marked_text(InlineMark::Added).is_empty());
    assert!(!lines[1].has_marks());
}

#[test]
fn test_foo_bar_marks_both_sides() {
    let mut blocks = vec![block(&[
        (LineKind::Remove, "const foo = 1"),
        (LineKind::Add, "const bar = 1"),
    ])];

    highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    let lines = &blocks[0].lines;
    assert_eq!(lines[0].marked_text(InlineMark::Removed), vec!["foo"]);
    assert_eq!(lines[1].marked_text(InlineMark::Added), vec!["bar"]);
    // The marked token keeps its highlighter style
    let Fragment::Mark { children, .. } = &lines[1].fragments[2] else {
        panic!("expected mark, got {:?}", lines[1].fragments[2]);
    };
    assert_eq!(children[0].style.as_deref(), Some("word"));
}

#[test]
fn test_unrelated_lines_are_not_marked() {
    let mut blocks = vec![block(&[
        (LineKind::Remove, "import a from 'a'"),
        (LineKind::Add, "export default b"),
    ])];

    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(stats.suppressed, 1);
    assert!(blocks[0].lines.iter().all(|l| !l.has_marks()));
}

// =============================================================================
// Pairing
// =============================================================================

#[test]
fn test_uneven_runs_pair_positionally() {
    let mut blocks = vec![block(&[
        (LineKind::Context, "function f() {"),
        (LineKind::Remove, "  let a = 1"),
        (LineKind::Remove, "  let b = 2"),
        (LineKind::Remove, "  let c = 3"),
        (LineKind::Add, "  let a = 10"),
        (LineKind::Add, "  let b = 20"),
        (LineKind::Context, "}"),
    ])];

    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(stats.pairs, 2);
    let lines = &blocks[0].lines;
    assert_eq!(lines[4].marked_text(InlineMark::Added), vec!["0"]);
    assert_eq!(lines[5].marked_text(InlineMark::Added), vec!["0"]);
    assert!(!lines[3].has_marks());
    assert!(!lines[0].has_marks());
}

#[test]
fn test_context_line_breaks_transition() {
    let mut blocks = vec![block(&[
        (LineKind::Remove, "let a = 1"),
        (LineKind::Context, ""),
        (LineKind::Add, "let a = 2"),
    ])];

    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(stats.pairs, 0);
}

#[test]
fn test_blocks_without_both_kinds_are_ignored() {
    let mut blocks = vec![
        block(&[(LineKind::Add, "let a = 1"), (LineKind::Add, "let a = 2")]),
        block(&[(LineKind::Context, "x")]),
    ];
    let before = blocks.clone();

    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(stats.blocks, 0);
    assert_eq!(blocks, before);
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_round_trip_preserves_text() {
    let cases = [
        ("console.log('poopstate')", "console.log('popstate')"),
        ("const foo = 1", "const bar = 1"),
        ("if (a && b) { run() }", "if (a || b) { run(x) }"),
        ("let naïve = 'café'", "let naive = 'cafe'"),
        ("fn main() {}", "fn main() -> Result<()> {}"),
        ("", "added to empty"),
    ];

    for (removed, added) in cases {
        let mut blocks = vec![block(&[(LineKind::Remove, removed), (LineKind::Add, added)])];
        let before = plain_texts(&blocks[0]);

        highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

        assert_eq!(plain_texts(&blocks[0]), before, "{removed:?} -> {added:?}");
        for line in &blocks[0].lines {
            assert_eq!(line.terminator, "\n");
        }
    }
}

#[test]
fn test_second_pass_is_a_no_op() {
    let mut blocks = vec![block(&[
        (LineKind::Remove, "const foo = 1"),
        (LineKind::Add, "const bar = 1"),
    ])];

    highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());
    let once = blocks.clone();
    let stats = highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(blocks, once);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.highlighted, 0);
}

#[test]
fn test_unified_diff_end_to_end() {
    let diff = "@@ -1,2 +1,2 @@\n-window.addEventListener('poopstate', go)\n+window.addEventListener('popstate', go)\n";
    let mut blocks = vec![DiffBlock::from_unified(diff, Some("js"), &PlainHighlighter)];

    highlight_inline_diffs(&mut blocks, &InlineDiffOptions::default());

    assert_eq!(blocks[0].lines[0].marked_text(InlineMark::Removed), vec!["o"]);
    let json = serde_json::to_string(&blocks[0]).unwrap();
    assert!(json.contains("\"removed-inline\""));
    assert!(json.contains("\"hasAdditions\":true"));
}
