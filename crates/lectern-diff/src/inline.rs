//! Inline change highlighting.
//!
//! A run of removed lines immediately followed by a run of added lines is a
//! replacement. Lines pair up by position; for each pair the changed span is
//! whatever lies between the longest common prefix and the longest common
//! suffix. Large or sprawling changes are left unmarked, since highlighting
//! most of a line tells the reader nothing.
//!
//! ```text
//! - console.log('poopstate')      prefix "console.log('po"
//! + console.log('popstate')       suffix "pstate')"
//!                  ^ removed-inline "o", nothing added
//! ```

use std::ops::Range;

use crate::tree::{DiffBlock, Fragment, InlineMark, LineKind, RenderedLine, StyledText};

/// Limits beyond which a changed span is not highlighted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InlineDiffOptions {
    /// Largest changed span, in characters
    pub max_changed_chars: usize,
    /// Largest changed span as a fraction of the longer line
    pub max_changed_ratio: f64,
}

impl Default for InlineDiffOptions {
    fn default() -> Self {
        Self {
            max_changed_chars: 120,
            max_changed_ratio: 0.6,
        }
    }
}

/// Counters from one highlighting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightStats {
    /// Blocks with both additions and removals
    pub blocks: usize,
    /// Removed/added line pairs examined
    pub pairs: usize,
    pub highlighted: usize,
    /// Pairs left unmarked by the heuristic
    pub suppressed: usize,
    /// Identical pairs and pairs already carrying markers
    pub skipped: usize,
}

/// Changed character ranges of a removed/added pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedSpans {
    pub removed: Range<usize>,
    pub added: Range<usize>,
}

/// Why a pair got no markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Identical,
    NothingInCommon,
    TooLong,
    TooMuchOfLine,
}

/// Character ranges that changed between two lines, or `None` when the
/// lines are identical or the change is too large to be worth marking.
pub fn changed_spans(
    removed: &str,
    added: &str,
    options: &InlineDiffOptions,
) -> Option<ChangedSpans> {
    compare(removed, added, options).ok()
}

fn compare(
    removed: &str,
    added: &str,
    options: &InlineDiffOptions,
) -> Result<ChangedSpans, Verdict> {
    if removed == added {
        return Err(Verdict::Identical);
    }

    let old: Vec<char> = removed.chars().collect();
    let new: Vec<char> = added.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    if prefix == 0 && suffix == 0 {
        return Err(Verdict::NothingInCommon);
    }

    let spans = ChangedSpans {
        removed: prefix..old.len() - suffix,
        added: prefix..new.len() - suffix,
    };
    let changed = spans.removed.len().max(spans.added.len());
    let longer = old.len().max(new.len());

    if changed > options.max_changed_chars {
        return Err(Verdict::TooLong);
    }
    if changed as f64 > options.max_changed_ratio * longer as f64 {
        return Err(Verdict::TooMuchOfLine);
    }
    Ok(spans)
}

/// Mark changed spans in every mixed diff block.
///
/// Blocks without both additions and removals are left alone, as are
/// context lines and unpaired extras in uneven runs.
pub fn highlight_inline_diffs(
    blocks: &mut [DiffBlock],
    options: &InlineDiffOptions,
) -> HighlightStats {
    let mut stats = HighlightStats::default();
    for block in blocks.iter_mut().filter(|b| b.is_mixed()) {
        stats.blocks += 1;
        highlight_block(block, options, &mut stats);
    }

    tracing::debug!(
        "Inline diff: {} blocks, {} pairs, {} highlighted, {} suppressed",
        stats.blocks,
        stats.pairs,
        stats.highlighted,
        stats.suppressed
    );
    stats
}

fn highlight_block(
    block: &mut DiffBlock,
    options: &InlineDiffOptions,
    stats: &mut HighlightStats,
) {
    let lines = &mut block.lines;
    let mut i = 0;

    while i < lines.len() {
        if lines[i].kind != LineKind::Remove {
            i += 1;
            continue;
        }

        let removed_start = i;
        while i < lines.len() && lines[i].kind == LineKind::Remove {
            i += 1;
        }
        let added_start = i;
        while i < lines.len() && lines[i].kind == LineKind::Add {
            i += 1;
        }

        let pairs = (added_start - removed_start).min(i - added_start);
        for n in 0..pairs {
            let (head, tail) = lines.split_at_mut(added_start);
            highlight_pair(&mut head[removed_start + n], &mut tail[n], options, stats);
        }
    }
}

fn highlight_pair(
    removed: &mut RenderedLine,
    added: &mut RenderedLine,
    options: &InlineDiffOptions,
    stats: &mut HighlightStats,
) {
    stats.pairs += 1;
    if removed.has_marks() || added.has_marks() {
        stats.skipped += 1;
        return;
    }

    match compare(&removed.plain_text(), &added.plain_text(), options) {
        Ok(spans) => {
            wrap(removed, spans.removed, InlineMark::Removed);
            wrap(added, spans.added, InlineMark::Added);
            stats.highlighted += 1;
        }
        Err(Verdict::Identical) => stats.skipped += 1,
        Err(verdict) => {
            tracing::debug!("Inline diff suppressed: {:?}", verdict);
            stats.suppressed += 1;
        }
    }
}

/// Wrap the characters in `range` with a marker, splitting fragments that
/// straddle its edges.
fn wrap(line: &mut RenderedLine, range: Range<usize>, mark: InlineMark) {
    if range.is_empty() {
        return;
    }

    let fragments = std::mem::take(&mut line.fragments);
    let mut out: Vec<Fragment> = Vec::with_capacity(fragments.len() + 2);
    let mut offset = 0;

    for fragment in fragments {
        let text = match fragment {
            Fragment::Text(text) => text,
            other => {
                out.push(other);
                continue;
            }
        };

        let len = text.text.chars().count();
        let start = offset;
        let end = offset + len;
        offset = end;

        if end <= range.start || start >= range.end {
            out.push(Fragment::Text(text));
            continue;
        }

        let cut_start = range.start.max(start) - start;
        let cut_end = range.end.min(end) - start;
        let (before, inside, after) = split_chars(&text.text, cut_start, cut_end);

        if !before.is_empty() {
            out.push(Fragment::Text(text.with_text(before)));
        }
        let piece = text.with_text(inside);
        match out.last_mut() {
            Some(Fragment::Mark { children, .. }) => children.push(piece),
            _ => out.push(Fragment::Mark {
                mark,
                children: vec![piece],
            }),
        }
        if !after.is_empty() {
            out.push(Fragment::Text(text.with_text(after)));
        }
    }

    line.fragments = out;
}

/// Split `s` at two character offsets.
fn split_chars(s: &str, start: usize, end: usize) -> (&str, &str, &str) {
    let byte = |n: usize| s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    let (a, b) = (byte(start), byte(end));
    (&s[..a], &s[a..b], &s[b..])
}
