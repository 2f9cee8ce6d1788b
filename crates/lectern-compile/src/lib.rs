//! Lesson document compiler for Lectern.
//!
//! This crate provides:
//! - An enriched-markdown parser (frontmatter, headings, code, component elements)
//! - Source-excerpt embedding via `<EmbeddedFile />` with range validation
//!   and drift warnings
//! - A cached [`DocumentCompiler`] that recompiles when a document or any
//!   file it embeds changes

pub mod compiler;
pub mod config;
pub mod document;
pub mod embed;
pub mod error;

pub use compiler::{CompileOptions, CompiledDocument, DocumentCompiler, compile_document};
pub use config::CompilerConfig;
pub use document::{Document, Node, parse_document};
pub use embed::{DriftLedger, EmbedSpec, LineRange, RangeSet};
pub use error::{Error, ParseError, Result, ValidationError};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
