//! Canonicalization applied to every FDE's rows before comparison.

pub mod compact;
pub mod pyramid;

pub use compact::compact;
pub use pyramid::flat_to_pyramid;

use crate::frame::Row;

/// Pyramid repair first, while the saved register columns are still there,
/// then compaction.
pub fn normalize(mut rows: Vec<Row>) -> Vec<Row> {
    flat_to_pyramid(&mut rows);
    compact(rows)
}
