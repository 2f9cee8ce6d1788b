//! Inline diff highlighting for Lectern code blocks.
//!
//! Diff blocks arrive already syntax-highlighted: each line is a sequence
//! of styled fragments. [`highlight_inline_diffs`] pairs removed lines with
//! the added lines that replace them and marks the characters that changed,
//! splitting fragments where needed but never altering the text.

pub mod highlighter;
pub mod inline;
pub mod tree;

pub use highlighter::{Highlighter, PlainHighlighter};
pub use inline::{
    ChangedSpans, HighlightStats, InlineDiffOptions, changed_spans, highlight_inline_diffs,
};
pub use tree::{DiffBlock, Fragment, InlineMark, LineKind, RenderedLine, StyledText};
