//! Pure text helpers: player-name canonicalization and string similarity.

pub mod name;
pub mod similarity;

pub use name::{normalize, NameVariations};
pub use similarity::{score, ConfidenceTier};
