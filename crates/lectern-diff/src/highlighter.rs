//! Syntax highlighting seam and diff-block builders.

use crate::tree::{DiffBlock, LineKind, RenderedLine, StyledText};

/// Turns a line of source into styled fragments.
///
/// Implementations must not alter the text: the fragments of a line
/// concatenate back to exactly the input.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, text: &str, language: Option<&str>) -> Vec<StyledText>;
}

/// Highlighter that applies no styling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, text: &str, _language: Option<&str>) -> Vec<StyledText> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![StyledText::plain(text)]
        }
    }
}

impl DiffBlock {
    /// Build a block from tagged lines.
    pub fn from_lines<I, S>(
        lines: I,
        language: Option<&str>,
        highlighter: &dyn Highlighter,
    ) -> Self
    where
        I: IntoIterator<Item = (LineKind, S)>,
        S: AsRef<str>,
    {
        let lines: Vec<RenderedLine> = lines
            .into_iter()
            .map(|(kind, text)| {
                RenderedLine::new(kind, highlighter.highlight(text.as_ref(), language))
            })
            .collect();

        Self {
            has_additions: lines.iter().any(|l| l.kind == LineKind::Add),
            has_removals: lines.iter().any(|l| l.kind == LineKind::Remove),
            language: language.map(str::to_string),
            lines,
        }
    }

    /// Build a block from unified-diff text.
    ///
    /// When the text has `@@` hunk headers only hunk bodies are read;
    /// otherwise every `+`, `-` or space prefixed line is. File headers and
    /// `\ No newline at end of file` markers are skipped.
    pub fn from_unified(
        diff: &str,
        language: Option<&str>,
        highlighter: &dyn Highlighter,
    ) -> Self {
        let has_hunks = diff.lines().any(|l| l.starts_with("@@"));
        let mut in_hunk = !has_hunks;
        let mut lines = Vec::new();
        let mut source = diff.lines().peekable();

        while let Some(line) = source.next() {
            if line.starts_with("@@") {
                in_hunk = true;
                continue;
            }
            if line.starts_with("diff ") || line.starts_with("index ") {
                in_hunk = !has_hunks;
                continue;
            }
            // A `---`/`+++` pair starts the next file's headers
            if line.starts_with("--- ") && source.peek().is_some_and(|l| l.starts_with("+++ ")) {
                source.next();
                in_hunk = !has_hunks;
                continue;
            }
            if !in_hunk
                || line.starts_with('\\')
                || (!has_hunks && (line.starts_with("+++ ") || line.starts_with("--- ")))
            {
                continue;
            }

            let (kind, text) = match line.chars().next() {
                Some('+') => (LineKind::Add, &line[1..]),
                Some('-') => (LineKind::Remove, &line[1..]),
                Some(' ') => (LineKind::Context, &line[1..]),
                None => (LineKind::Context, ""),
                Some(_) => continue,
            };
            lines.push((kind, text));
        }

        Self::from_lines(lines, language, highlighter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_highlighter() {
        assert_eq!(
            PlainHighlighter.highlight("let x", Some("rust")),
            vec![StyledText::plain("let x")]
        );
        assert!(PlainHighlighter.highlight("", None).is_empty());
    }

    #[test]
    fn test_from_lines_sets_flags() {
        let block = DiffBlock::from_lines(
            [(LineKind::Context, "a"), (LineKind::Add, "b")],
            Some("ts"),
            &PlainHighlighter,
        );
        assert!(block.has_additions);
        assert!(!block.has_removals);
        assert_eq!(block.language.as_deref(), Some("ts"));
        assert_eq!(block.lines[1].plain_text(), "b");
        assert_eq!(block.lines[1].terminator, "\n");
    }

    #[test]
    fn test_from_unified_reads_hunks() {
        let diff = "\
diff --git a/app.ts b/app.ts
index 1234..5678 100644
--- a/app.ts
+++ b/app.ts
@@ -1,3 +1,3 @@
 import x
-const foo = 1
+const bar = 1

\\ No newline at end of file
";
        let block = DiffBlock::from_unified(diff, None, &PlainHighlighter);
        let kinds: Vec<LineKind> = block.lines.iter().map(|l| l.kind).collect();

        assert_eq!(
            kinds,
            vec![
                LineKind::Context,
                LineKind::Remove,
                LineKind::Add,
                LineKind::Context
            ]
        );
        assert_eq!(block.lines[1].plain_text(), "const foo = 1");
        assert!(block.is_mixed());
    }

    #[test]
    fn test_from_unified_skips_later_file_headers() {
        let diff = "\
--- a/one.ts
+++ b/one.ts
@@ -1 +1 @@
-let a = 1
+let a = 2
--- a/two.ts
+++ b/two.ts
@@ -1 +1 @@
-let b = 1
+let b = 2
";
        let block = DiffBlock::from_unified(diff, None, &PlainHighlighter);
        let texts: Vec<String> = block.lines.iter().map(|l| l.plain_text()).collect();

        assert_eq!(texts, vec!["let a = 1", "let a = 2", "let b = 1", "let b = 2"]);
        assert_eq!(block.lines[2].kind, LineKind::Remove);
    }

    #[test]
    fn test_from_unified_without_hunk_headers() {
        let block = DiffBlock::from_unified("-old\n+new\n keep\n", None, &PlainHighlighter);
        assert_eq!(block.lines.len(), 3);
        assert_eq!(block.lines[2].plain_text(), "keep");
    }
}
