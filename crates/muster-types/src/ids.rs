//! Opaque identifiers.
//!
//! Entities are stored as flat tables keyed by these ids; relations between
//! them (state anchors, record joins) are separate tables rather than object
//! references.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $inner:ty, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{:06}"), self.0)
            }
        }
    };
}

id_type!(
    /// Stable soldier identity; survives rebalancer regeneration.
    SoldierId,
    u32,
    "sld"
);
id_type!(
    /// Globally unique state identifier (not per-soldier ordinals).
    StateId,
    u32,
    "st"
);
id_type!(
    /// Document-like source container identifier.
    SourceId,
    u32,
    "src"
);
id_type!(
    /// Clerk instance identifier; one clerk produces many sources.
    ClerkId,
    u16,
    "clk"
);
