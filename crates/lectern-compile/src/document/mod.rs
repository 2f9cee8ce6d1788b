//! Enriched-markdown document model and parser.

pub mod ast;
mod parser;

pub use ast::{
    Attribute, AttributeValue, CodeBlock, Diagnostic, Document, Element, ExcerptMeta, Node,
    Position, Severity, SourceExcerpt, VIDEO_ELEMENTS, visit,
};
pub use parser::parse_document;
