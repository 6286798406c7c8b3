pub mod config;
pub mod eh_frame;
pub mod error;
pub mod frame;
pub mod input;
pub mod matcher;
pub mod normalize;
pub mod report;
pub mod symbols;
pub mod timeline;

pub use config::CompareOptions;
pub use eh_frame::parse_eh_frame;
pub use error::ParseError;
pub use frame::{CfaRule, Fde, FdeRange, RegRule, Register, Row, RuleSnapshot, INITIAL_ROW};
pub use input::{InputSections, Section};
pub use matcher::{match_segments, AmbiguousMatch, SegmentMatch, Side};
pub use report::{Report, UnmatchedFde};
pub use symbols::{Symbol, SymbolTable};
pub use timeline::{compare_fdes, compare_rows, fde_matches, FdeComparison, Mismatch};

use anyhow::{Context, Result};

/// Parses both dumps of `input` and compares them.
pub fn compare_dumps(
    test_name: &str,
    input: &InputSections,
    symbols: &SymbolTable,
    options: &CompareOptions,
) -> Result<Report> {
    if symbols.is_empty() {
        log::warn!("{test_name}: no symbols, startup functions cannot be filtered");
    }
    let reference = parse_eh_frame(&input.reference, symbols, options)
        .context("parsing the reference dump")?;
    let candidate = parse_eh_frame(&input.candidate, symbols, options)
        .context("parsing the candidate dump")?;

    let segments = match_segments(&reference, &candidate);
    log::info!(
        "{} matched, {} unmatched reference, {} unmatched candidate FDEs",
        segments.pairs.len(),
        segments.unmatched_reference.len(),
        segments.unmatched_candidate.len()
    );
    Ok(Report::new(test_name, &segments))
}
