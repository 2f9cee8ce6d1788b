//! Replace `<EmbeddedFile />` directives with source excerpts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lectern_core::ContentHash;
use serde::{Deserialize, Serialize};

use super::dedent::dedent;
use super::drift::{DriftLedger, embed_identity};
use super::language::language_for;
use super::sources::SourceFiles;
use super::spec::{EMBED_ELEMENT, EmbedSpec, resolve};
use crate::document::{
    AttributeValue, CodeBlock, Diagnostic, Document, Element, ExcerptMeta, Node, Position,
    Severity, SourceExcerpt, visit,
};
use crate::error::ValidationError;

/// Lines of document context shown around an invalid directive.
const EXCERPT_CONTEXT_LINES: usize = 2;

/// Which files (and which ranges of them) a document embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedFiles {
    /// `file` attribute as written -> ranges embedded from it
    pub files: BTreeMap<String, Vec<String>>,
    pub invalid: Vec<InvalidEmbed>,
}

/// Marker for a directive that produced a diagnostic instead of code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidEmbed {
    pub line: usize,
    pub file: Option<String>,
    pub messages: Vec<String>,
}

pub struct EmbedContext<'a> {
    pub document_dir: &'a Path,
    /// Full document text, for diagnostic excerpts
    pub document_source: &'a str,
    pub sources: &'a SourceFiles,
    pub drift: &'a DriftLedger,
}

#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub embedded_files: EmbeddedFiles,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Directives replaced by code blocks
    pub embedded: usize,
}

/// Resolved paths of every embed directive's `file` attribute.
pub fn collect_embed_paths(document: &Document, document_dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    visit(&document.children, &mut |node| {
        if let Node::Element(element) = node
            && element.name == EMBED_ELEMENT
            && let Some(AttributeValue::String(file)) = element.attribute("file")
            && !file.trim().is_empty()
        {
            let path = resolve(document_dir, file.trim());
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    });
    paths
}

/// Expand every embed directive in place.
///
/// Valid directives become one code block per range. Invalid ones become
/// an error diagnostic and never stop the compile.
pub fn embed_source_excerpts(document: &mut Document, ctx: &EmbedContext<'_>) -> EmbedOutcome {
    let mut outcome = EmbedOutcome::default();
    let children = std::mem::take(&mut document.children);
    document.children = transform_nodes(children, ctx, &mut outcome);
    outcome
}

fn transform_nodes(
    nodes: Vec<Node>,
    ctx: &EmbedContext<'_>,
    outcome: &mut EmbedOutcome,
) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(element) if element.name == EMBED_ELEMENT => {
                out.extend(expand(&element, ctx, outcome));
            }
            Node::Element(mut element) => {
                let children = std::mem::take(&mut element.children);
                element.children = transform_nodes(children, ctx, outcome);
                out.push(Node::Element(element));
            }
            other => out.push(other),
        }
    }
    out
}

fn expand(element: &Element, ctx: &EmbedContext<'_>, outcome: &mut EmbedOutcome) -> Vec<Node> {
    let spec = match EmbedSpec::parse(element, ctx.document_dir, ctx.sources) {
        Ok(spec) => spec,
        Err(errors) => return vec![invalid(element, &errors, ctx, outcome)],
    };

    let lines = spec.source.lines();
    let ranges = spec.effective_ranges();
    let language = language_for(&spec.path);
    let mut nodes = Vec::new();
    let mut slices = Vec::new();

    for range in ranges.iter() {
        let end = range.end.min(lines.len());
        let start = (range.start - 1).min(end);
        let slice = &lines[start..end];
        slices.push(slice.join("\n"));

        let excerpt = ExcerptMeta {
            file_name: spec.file.clone(),
            start_line: range.start,
            highlight: spec.highlight_within(range),
            show_line_numbers: spec.show_line_numbers,
            allow_copy: spec.allow_copy,
            buttons: spec.buttons.clone(),
        };
        nodes.push(Node::Code(CodeBlock {
            lang: Some(language.clone()),
            meta: Some(excerpt.to_string()),
            value: dedent(slice),
            position: Some(element.position),
            excerpt: Some(excerpt),
        }));
    }

    let identity = embed_identity(&spec.path, &spec.ranges);
    let current = ContentHash::of_parts(
        slices
            .iter()
            .flat_map(|s| [s.as_bytes(), b"\n".as_slice()]),
    );
    if ctx.drift.observe(&identity, &current).should_warn() {
        let message = format!(
            "Content of \"{}\" ({}) changed since the last compile; check that `range` and `highlight` still point at the right lines",
            spec.file,
            if spec.ranges.is_empty() {
                "whole file".to_string()
            } else {
                format!("lines {}", spec.ranges)
            }
        );
        tracing::info!("Line {}: {}", element.position.start_line, message);
        outcome
            .warnings
            .push(format!("line {}: {}", element.position.start_line, message));
        nodes.insert(
            0,
            Node::Diagnostic(Diagnostic {
                severity: Severity::Warning,
                title: "Embedded file changed".to_string(),
                messages: vec![message],
                excerpt: None,
            }),
        );
    }

    outcome
        .embedded_files
        .files
        .entry(spec.file.clone())
        .or_default()
        .extend(ranges.iter().map(|r| r.to_string()));
    outcome.embedded += 1;
    nodes
}

fn invalid(
    element: &Element,
    errors: &[ValidationError],
    ctx: &EmbedContext<'_>,
    outcome: &mut EmbedOutcome,
) -> Node {
    let line = element.position.start_line;
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    let file = match element.attribute("file") {
        Some(AttributeValue::String(file)) => Some(file.clone()),
        _ => None,
    };

    tracing::warn!(
        "Invalid <{}> on line {}: {}",
        EMBED_ELEMENT,
        line,
        messages.join("; ")
    );
    outcome
        .errors
        .extend(messages.iter().map(|m| format!("line {line}: {m}")));
    outcome.embedded_files.invalid.push(InvalidEmbed {
        line,
        file,
        messages: messages.clone(),
    });

    Node::Diagnostic(Diagnostic {
        severity: Severity::Error,
        title: format!("Invalid <{EMBED_ELEMENT}>"),
        messages,
        excerpt: Some(source_excerpt(ctx.document_source, element.position)),
    })
}

/// The directive's lines plus surrounding context.
fn source_excerpt(source: &str, position: Position) -> SourceExcerpt {
    let lines: Vec<&str> = source.lines().collect();
    let first = position
        .start_line
        .saturating_sub(EXCERPT_CONTEXT_LINES)
        .max(1);
    let last = (position.end_line + EXCERPT_CONTEXT_LINES).min(lines.len());

    let text = if first <= last {
        lines[first - 1..last].join("\n")
    } else {
        String::new()
    };
    SourceExcerpt {
        start_line: first,
        text,
    }
}
