//! Ground-truth difficulty: how hard will each soldier be to disambiguate?
//!
//! Operates post-hoc on an extraction-signals table joined with the truth
//! labels and the hierarchy's collision index. The computer is a pure
//! per-soldier function over read-only inputs: running it twice, or over any
//! subset of soldiers, yields identical assessments.
//!
//! The extraction table is an external contract. The computer never assumes
//! a particular pattern schema, only the characterized/uncharacterized
//! distinction plus validity queries against the hierarchy.

mod assess;
mod signals;

pub use assess::{
    Assessment, DifficultyComputer, DifficultyTier, LevelConfidence, COMPLEMENTARITY_DEPTH_CAP,
    HARD_THRESHOLD, MODERATE_THRESHOLD,
};
pub use signals::{ExtractionProvider, ExtractionRow, ExtractionTable, RecordKey};
