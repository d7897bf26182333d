//! Record rendering: clerk templates, familiarity-driven expansion,
//! imperfections, and the three vocabulary layers.
//!
//! Structural choices (token order, separator, casing, abbreviation policy)
//! are frozen in the clerk archetype and never resampled per record; the
//! per-record random stream feeds only imperfections, fatigue, and
//! vocabulary draws.

mod render;
mod vocab;

pub use render::{render_record, RenderRequest};
pub use vocab::{SourceVocabState, VocabInjection, VocabularyInjector};
