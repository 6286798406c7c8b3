use crate::frame::{Fde, FdeRange};
use crate::matcher::{AmbiguousMatch, SegmentMatch};
use crate::timeline::{compare_fdes, Mismatch};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedFde {
    pub range: FdeRange,
    pub symbol: Option<String>,
    pub rows: usize,
    /// Nothing happens past the initial state.
    pub trivial: bool,
}

impl From<&Fde> for UnmatchedFde {
    fn from(fde: &Fde) -> Self {
        Self {
            range: fde.range(),
            symbol: fde.symbol.clone(),
            rows: fde.rows.len(),
            trivial: fde.is_trivial(),
        }
    }
}

/// Outcome of comparing two dumps of one test case.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub test_name: String,
    /// Addresses at which matched FDEs disagree.
    pub mismatches: usize,
    /// Addresses at which matched FDEs agree.
    pub well_matched: usize,
    /// Number of matched FDE pairs.
    pub matched: usize,
    pub unmatched_reference: Vec<UnmatchedFde>,
    pub unmatched_candidate: Vec<UnmatchedFde>,
    pub details: Vec<Mismatch>,
    pub ambiguous: Vec<AmbiguousMatch>,
}

impl Report {
    pub fn new(test_name: impl Into<String>, segments: &SegmentMatch<'_>) -> Self {
        let mut report = Report {
            test_name: test_name.into(),
            matched: segments.pairs.len(),
            ambiguous: segments.ambiguous.clone(),
            ..Default::default()
        };
        for (reference, candidate) in &segments.pairs {
            let comparison = compare_fdes(reference, candidate);
            report.mismatches += comparison.mismatches;
            report.well_matched += comparison.matches;
            report.details.extend(comparison.details);
        }
        report.unmatched_reference = segments
            .unmatched_reference
            .iter()
            .map(|&fde| fde.into())
            .collect();
        report.unmatched_candidate = segments
            .unmatched_candidate
            .iter()
            .map(|&fde| fde.into())
            .collect();
        report
    }

    /// Missing reference FDEs only matter once one of them has unwind rules
    /// beyond the initial state.
    pub fn reference_worth_reporting(&self) -> bool {
        self.unmatched_reference.iter().any(|fde| !fde.trivial)
    }

    /// The individual findings, in summary order.
    pub fn findings(&self) -> Vec<String> {
        let mut findings = Vec::new();
        if self.mismatches > 0 {
            findings.push(format!(
                "{} mismatches - {} well matched",
                self.mismatches, self.well_matched
            ));
        }
        if self.reference_worth_reporting() {
            findings.push(format!(
                "{} unmatched (orig): {}",
                self.unmatched_reference.len(),
                ranges(&self.unmatched_reference)
            ));
        }
        if !self.unmatched_candidate.is_empty() {
            findings.push(format!(
                "{} unmatched (synth): {}",
                self.unmatched_candidate.len(),
                ranges(&self.unmatched_candidate)
            ));
        }
        if !findings.is_empty() {
            findings.push(format!("{} matched", self.matched));
        }
        findings
    }

    pub fn is_failure(&self) -> bool {
        !self.findings().is_empty()
    }

    /// `None` when there is nothing to report.
    pub fn summary(&self) -> Option<String> {
        let findings = self.findings();
        if findings.is_empty() {
            None
        } else {
            Some(format!("{}: {}", self.test_name, findings.join("; ")))
        }
    }
}

fn ranges(fdes: &[UnmatchedFde]) -> String {
    fdes.iter()
        .map(|fde| fde.range.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{RegRule, Row, INITIAL_ROW};
    use crate::matcher::match_segments;

    fn fde(begin: u64, end: u64, rows: Vec<Row>) -> Fde {
        Fde {
            begin,
            end,
            symbol: None,
            rows,
        }
    }

    #[test]
    fn clean_comparison_is_silent() {
        let fdes = vec![fde(0x1000, 0x1010, vec![INITIAL_ROW])];
        let report = Report::new("t/01", &match_segments(&fdes, &fdes));
        assert_eq!(report.summary(), None);
        assert!(!report.is_failure());
        assert_eq!((report.mismatches, report.well_matched), (0, 1));
    }

    #[test]
    fn mismatch_summary() {
        let mut bad = INITIAL_ROW;
        bad.ra = RegRule::CfaOffset(-16);
        let reference = vec![fde(0x1000, 0x1010, vec![INITIAL_ROW])];
        let candidate = vec![fde(0x1000, 0x1010, vec![bad])];
        let report = Report::new("t/02", &match_segments(&reference, &candidate));
        assert_eq!(
            report.summary().as_deref(),
            Some("t/02: 1 mismatches - 0 well matched; 1 matched")
        );
        assert_eq!(report.details.len(), 1);
    }

    #[test]
    fn trivial_unmatched_reference_is_counted_but_not_reported() {
        let reference = vec![fde(0x1000, 0x1010, vec![INITIAL_ROW])];
        let report = Report::new("t/03", &match_segments(&reference, &[]));
        assert_eq!(report.unmatched_reference.len(), 1);
        assert_eq!(report.summary(), None);
    }

    #[test]
    fn unmatched_lists_every_range() {
        let mut moved = INITIAL_ROW;
        moved.loc = 0x1004;
        moved.rbp = RegRule::CfaOffset(-16);
        let reference = vec![
            fde(0x1000, 0x1010, vec![INITIAL_ROW, moved]),
            fde(0x1020, 0x1030, vec![INITIAL_ROW]),
        ];
        let candidate = vec![fde(0x1040, 0x1050, vec![INITIAL_ROW])];
        let report = Report::new("t/04", &match_segments(&reference, &candidate));
        assert_eq!(
            report.summary().as_deref(),
            Some(
                "t/04: 2 unmatched (orig): 0x1000--0x1010, 0x1020--0x1030; \
                 1 unmatched (synth): 0x1040--0x1050; 0 matched"
            )
        );
    }

    #[test]
    fn unmatched_leaf_function_is_reported() {
        let mut entry = INITIAL_ROW;
        entry.loc = 0x2000;
        let foo = fde(0x1000, 0x1010, vec![INITIAL_ROW]);
        let leaf = fde(0x2000, 0x2010, vec![INITIAL_ROW, entry]);
        let reference = vec![foo.clone(), leaf];
        let report = Report::new("t/05", &match_segments(&reference, &[foo]));
        assert!(!report.unmatched_reference[0].trivial);
        assert_eq!(
            report.summary().as_deref(),
            Some("t/05: 1 unmatched (orig): 0x2000--0x2010; 1 matched")
        );
    }
}
