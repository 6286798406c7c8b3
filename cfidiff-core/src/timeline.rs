use crate::frame::{Fde, Row, RuleSnapshot};
use crate::matcher::Side;
use serde::Serialize;
use std::fmt;

/// Both tables disagree from `address` on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub address: u64,
    pub reference: RuleSnapshot,
    pub candidate: RuleSnapshot,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mismatch {:#x}: {} ; {}",
            self.address, self.reference, self.candidate
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdeComparison {
    pub mismatches: usize,
    pub matches: usize,
    pub details: Vec<Mismatch>,
}

impl FdeComparison {
    pub fn is_match(&self) -> bool {
        self.mismatches == 0
    }
}

/// Walks both row sequences in address order and compares the rules in
/// effect after every address at which either side changes.
///
/// Changes from both sides at the same address are applied together before
/// comparing.
pub fn compare_rows(reference: &[Row], candidate: &[Row]) -> FdeComparison {
    let mut comparison = FdeComparison::default();
    let (Some(first_ref), Some(first_cand)) = (reference.first(), candidate.first()) else {
        return comparison;
    };

    let mut events: Vec<(Side, &Row)> = reference
        .iter()
        .map(|row| (Side::Reference, row))
        .chain(candidate.iter().map(|row| (Side::Candidate, row)))
        .collect();
    events.sort_by_key(|(_, row)| row.loc);

    let mut current_ref = first_ref.snapshot();
    let mut current_cand = first_cand.snapshot();
    for group in events.chunk_by(|(_, a), (_, b)| a.loc == b.loc) {
        for (side, row) in group {
            match side {
                Side::Reference => current_ref = row.snapshot(),
                Side::Candidate => current_cand = row.snapshot(),
            }
        }

        if current_ref == current_cand {
            comparison.matches += 1;
        } else {
            comparison.mismatches += 1;
            comparison.details.push(Mismatch {
                address: group[0].1.loc,
                reference: current_ref.clone(),
                candidate: current_cand.clone(),
            });
        }
    }
    comparison
}

pub fn compare_fdes(reference: &Fde, candidate: &Fde) -> FdeComparison {
    let comparison = compare_rows(&reference.rows, &candidate.rows);
    if !comparison.is_match() {
        log::debug!(
            "{} ({}): {} mismatches",
            reference.range(),
            reference.function_identifier(),
            comparison.mismatches
        );
    }
    comparison
}

pub fn fde_matches(reference: &Fde, candidate: &Fde) -> bool {
    compare_rows(&reference.rows, &candidate.rows).is_match()
}
