//! Source-excerpt embedding.
//!
//! ```text
//! <EmbeddedFile file range highlight ...>
//!         │
//!         ▼
//! EmbedSpec::parse ──invalid──► Diagnostic (error) + ledger marker
//!         │ valid
//!         ▼
//! slice ranges ──► dedent ──► code block per range
//!         │
//!         └──► DriftLedger::observe ──drifted──► Diagnostic (warning)
//! ```

mod dedent;
mod drift;
mod language;
mod range;
mod sources;
mod spec;
mod transform;

pub use dedent::dedent;
pub use drift::{DriftLedger, DriftStatus, EmbedDriftRecord, embed_identity};
pub use language::language_for;
pub use range::{LineRange, RangeError, RangeSet};
pub use sources::{SourceFiles, SourceText};
pub use spec::{ButtonKind, EMBED_ELEMENT, EmbedSpec};
pub use transform::{
    EmbedContext, EmbedOutcome, EmbeddedFiles, InvalidEmbed, collect_embed_paths,
    embed_source_excerpts,
};
