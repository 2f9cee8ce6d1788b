//! Document tree for enriched markdown.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::embed::{ButtonKind, LineRange};

/// Element names whose `url` attribute references a video.
pub const VIDEO_ELEMENTS: &[&str] = &["VideoEmbed", "EpicVideo"];

/// Inclusive line span in the source document (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub start_line: usize,
    pub end_line: usize,
}

impl Position {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }
}

/// A parsed document: frontmatter plus block-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub frontmatter: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

/// A block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Heading {
        depth: u8,
        text: String,
        position: Position,
    },
    Paragraph {
        text: String,
        position: Position,
    },
    /// Raw HTML block (lowercase tags).
    Html {
        value: String,
        position: Position,
    },
    ThematicBreak {
        position: Position,
    },
    Code(CodeBlock),
    /// Component element such as `<EmbeddedFile ... />`.
    Element(Element),
    /// Compiler-generated error or warning.
    Diagnostic(Diagnostic),
}

/// Fenced code block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub lang: Option<String>,
    pub meta: Option<String>,
    pub value: String,
    pub position: Option<Position>,

    /// Present when the block was spliced in from another file.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub excerpt: Option<ExcerptMeta>,
}

/// Tags attached to a code block produced from an embed directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcerptMeta {
    pub file_name: String,
    /// Line in the source file where the excerpt starts (1-indexed)
    pub start_line: usize,
    /// Highlighted lines, in source-file line numbers
    pub highlight: Vec<LineRange>,
    pub show_line_numbers: bool,
    pub allow_copy: bool,
    pub buttons: Vec<ButtonKind>,
}

impl fmt::Display for ExcerptMeta {
    /// Renders the code-fence meta string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filename=\"{}\" start={}", self.file_name, self.start_line)?;
        if !self.highlight.is_empty() {
            let lines: Vec<String> = self.highlight.iter().map(|r| r.to_string()).collect();
            write!(f, " lines={}", lines.join(","))?;
        }
        if !self.show_line_numbers {
            f.write_str(" nonumber")?;
        }
        if !self.allow_copy {
            f.write_str(" nocopy")?;
        }
        if !self.buttons.is_empty() {
            let buttons: Vec<&str> = self.buttons.iter().map(|b| b.as_str()).collect();
            write!(f, " buttons={}", buttons.join(","))?;
        }
        Ok(())
    }
}

/// Component element with attributes and optional children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub position: Position,
}

impl Element {
    /// First attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// Attribute value as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// `name="text"` or `name='text'`
    String(String),
    /// `name={expression}`; holds the source between the braces
    Expression(String),
    /// `name` with no value
    Bare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic rendered into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub title: String,
    pub messages: Vec<String>,
    /// Document lines surrounding the offending directive.
    pub excerpt: Option<SourceExcerpt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceExcerpt {
    pub start_line: usize,
    pub text: String,
}

impl Document {
    /// Text of the first top-level depth-1 heading.
    pub fn title(&self) -> Option<String> {
        self.children.iter().find_map(|node| match node {
            Node::Heading { depth: 1, text, .. } => Some(text.clone()),
            _ => None,
        })
    }

    /// URLs of video elements in document order.
    pub fn video_embed_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        visit(&self.children, &mut |node| {
            if let Node::Element(element) = node
                && VIDEO_ELEMENTS.contains(&element.name.as_str())
                && let Some(AttributeValue::String(url)) = element.attribute("url")
                && !url.trim().is_empty()
            {
                urls.push(url.trim().to_string());
            }
        });
        urls
    }
}

/// Pre-order walk over nodes and element children.
pub fn visit<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        f(node);
        if let Node::Element(element) = node {
            visit(&element.children, f);
        }
    }
}
