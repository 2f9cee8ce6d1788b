//! Rendered diff-block tree.

use serde::{Deserialize, Serialize};

/// Text with an optional highlighter style (token class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledText {
    pub text: String,
    pub style: Option<String>,
}

impl StyledText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn styled(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Some(style.into()),
        }
    }

    /// Same style, different text.
    pub(crate) fn with_text(&self, text: &str) -> Self {
        Self {
            text: text.to_string(),
            style: self.style.clone(),
        }
    }
}

/// Inline change marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineMark {
    #[serde(rename = "added-inline")]
    Added,
    #[serde(rename = "removed-inline")]
    Removed,
}

impl InlineMark {
    pub fn class_name(&self) -> &'static str {
        match self {
            InlineMark::Added => "added-inline",
            InlineMark::Removed => "removed-inline",
        }
    }
}

/// One piece of a rendered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Fragment {
    Text(StyledText),
    Mark {
        mark: InlineMark,
        children: Vec<StyledText>,
    },
}

impl Fragment {
    fn push_text(&self, out: &mut String) {
        match self {
            Fragment::Text(t) => out.push_str(&t.text),
            Fragment::Mark { children, .. } => {
                for child in children {
                    out.push_str(&child.text);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Add,
    Remove,
    Context,
}

/// A line of a diff block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedLine {
    pub kind: LineKind,
    pub fragments: Vec<Fragment>,
    /// Line ending, usually `"\n"`
    pub terminator: String,
}

impl RenderedLine {
    pub fn new(kind: LineKind, fragments: Vec<StyledText>) -> Self {
        Self {
            kind,
            fragments: fragments.into_iter().map(Fragment::Text).collect(),
            terminator: "\n".to_string(),
        }
    }

    /// Concatenated fragment text, without the terminator.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            fragment.push_text(&mut out);
        }
        out
    }

    /// Whether inline markers were already applied.
    pub fn has_marks(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f, Fragment::Mark { .. }))
    }

    /// Text covered by markers of the given kind, one entry per marker.
    pub fn marked_text(&self, kind: InlineMark) -> Vec<String> {
        self.fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Mark { mark, children } if *mark == kind => {
                    Some(children.iter().map(|c| c.text.as_str()).collect())
                }
                _ => None,
            })
            .collect()
    }
}

/// A rendered code block showing a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffBlock {
    pub has_additions: bool,
    pub has_removals: bool,
    pub language: Option<String>,
    pub lines: Vec<RenderedLine>,
}

impl DiffBlock {
    /// Both flags set: the only blocks inline highlighting applies to.
    pub fn is_mixed(&self) -> bool {
        self.has_additions && self.has_removals
    }
}
