use crate::frame::{Fde, FdeRange};
use serde::Serialize;
use std::fmt;

/// Which dump an FDE came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Reference,
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Reference => "orig",
            Side::Candidate => "synth",
        };
        write!(f, "{}", name)
    }
}

/// An FDE that a second FDE tried to claim. Reported, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    pub side: Side,
    pub range: FdeRange,
}

impl fmt::Display for AmbiguousMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple matches ({}) {}", self.side, self.range)
    }
}

#[derive(Debug, Default)]
pub struct SegmentMatch<'a> {
    pub pairs: Vec<(&'a Fde, &'a Fde)>,
    pub unmatched_reference: Vec<&'a Fde>,
    pub unmatched_candidate: Vec<&'a Fde>,
    pub ambiguous: Vec<AmbiguousMatch>,
}

/// Pairs FDEs of both dumps by start address.
///
/// A PLT FDE on the reference side swallows every candidate FDE that starts
/// with it or lies inside it, without comparing anything. Both lists must
/// be sorted by `begin`.
pub fn match_segments<'a>(reference: &'a [Fde], candidate: &'a [Fde]) -> SegmentMatch<'a> {
    let mut result = SegmentMatch::default();
    let mut reference_matched = vec![false; reference.len()];
    let mut candidate_matched = vec![false; candidate.len()];
    // Fake PLT matches do not count as claims.
    let mut candidate_claimed = vec![false; candidate.len()];

    for (ref_id, ref_fde) in reference.iter().enumerate() {
        let from = candidate.partition_point(|fde| fde.begin < ref_fde.begin);

        if ref_fde.is_plt() {
            let inside = candidate[from..]
                .iter()
                .take_while(|fde| fde.begin < ref_fde.end || fde.begin == ref_fde.begin)
                .enumerate()
                .filter(|(_, fde)| fde.begin == ref_fde.begin || ref_fde.contains(fde));
            for (offset, fde) in inside {
                log::debug!("{} lies in PLT {}", fde.range(), ref_fde.range());
                candidate_matched[from + offset] = true;
            }
            reference_matched[ref_id] = true;
            continue;
        }

        let same_start = candidate[from..]
            .iter()
            .take_while(|fde| fde.begin == ref_fde.begin)
            .enumerate();
        for (offset, cand_fde) in same_start {
            let cand_id = from + offset;
            if candidate_claimed[cand_id] {
                log::warn!("Candidate FDE {} matched twice", cand_fde.range());
                result.ambiguous.push(AmbiguousMatch {
                    side: Side::Candidate,
                    range: cand_fde.range(),
                });
            } else if reference_matched[ref_id] {
                log::warn!("Reference FDE {} matched twice", ref_fde.range());
                result.ambiguous.push(AmbiguousMatch {
                    side: Side::Reference,
                    range: ref_fde.range(),
                });
            } else {
                reference_matched[ref_id] = true;
                candidate_matched[cand_id] = true;
                candidate_claimed[cand_id] = true;
                result.pairs.push((ref_fde, cand_fde));
            }
        }
    }

    result.unmatched_reference = unmatched(reference, &reference_matched);
    result.unmatched_candidate = unmatched(candidate, &candidate_matched);
    result
}

fn unmatched<'a>(fdes: &'a [Fde], matched: &[bool]) -> Vec<&'a Fde> {
    fdes.iter()
        .zip(matched)
        .filter(|(_, matched)| !**matched)
        .map(|(fde, _)| fde)
        .collect()
}
