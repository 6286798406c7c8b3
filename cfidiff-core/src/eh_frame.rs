//! Parser for the textual unwind tables printed by `readelf -wF`.
//!
//! A dump is a sequence of blank-line separated blocks:
//!
//! ```text
//! 00000018 000000000000001c 0000001c FDE cie=00000000 pc=0000000000001139..000000000000114f
//!    LOC           CFA      rbp   ra
//! 0000000000001139 rsp+8    u     c-8
//! 000000000000113a rsp+16   c-16  c-8
//! ```
//!
//! CIEs and the zero terminator use the same framing and are skipped.

use crate::config::CompareOptions;
use crate::error::ParseError;
use crate::frame::{CfaRule, Fde, Register, RegRule, Row, INITIAL_ROW};
use crate::input::Section;
use crate::normalize::normalize;
use crate::symbols::SymbolTable;
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Parses one dump into its FDEs, sorted by start address.
///
/// FDEs of the ignored startup functions are dropped.
pub fn parse_eh_frame(
    section: &Section,
    symbols: &SymbolTable,
    options: &CompareOptions,
) -> Result<Vec<Fde>> {
    let mut fdes = Vec::new();
    for block in section.blocks() {
        let Some(mut fde) = parse_fde(block)
            .with_context(|| format!("in block `{}`", block[0]))?
        else {
            continue;
        };

        fde.symbol = symbols.name_at(fde.begin).map(str::to_string);
        if options.is_ignored(fde.symbol.as_deref()) {
            log::debug!(
                "Dropping FDE {} of {}",
                fde.range(),
                fde.function_identifier()
            );
            continue;
        }
        fdes.push(fde);
    }

    fdes.sort_by_key(|fde| fde.begin);
    log::info!("Parsed {} FDEs", fdes.len());
    Ok(fdes)
}

/// Parses one block. `Ok(None)` for blocks that are not FDEs.
pub fn parse_fde<S: AsRef<str>>(block: &[S]) -> Result<Option<Fde>, ParseError> {
    let Some(header) = block.first() else {
        return Ok(None);
    };
    let Some((begin, end)) = parse_fde_header(header.as_ref())? else {
        return Ok(None);
    };

    let mut rows = vec![INITIAL_ROW];
    if let Some((column_line, data)) = block[1..].split_first() {
        let columns = Columns::parse(column_line.as_ref());
        if !data.is_empty() && columns.ra.is_none() {
            return Err(ParseError::MissingReturnAddress(
                column_line.as_ref().to_string(),
            ));
        }
        for line in data {
            rows.push(columns.parse_row(line.as_ref())?);
        }
    }

    Ok(Some(Fde {
        begin,
        end,
        symbol: None,
        rows: normalize(rows),
    }))
}

/// `(begin, end)` of an FDE header, `None` for CIEs and terminators.
pub fn parse_fde_header(line: &str) -> Result<Option<(u64, u64)>, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.get(1) == Some(&"ZERO") || fields.get(3) != Some(&"FDE") {
        return Ok(None);
    }
    if fields.len() != 6 {
        return Err(ParseError::BadHeader(line.to_string()));
    }

    let range = fields[5]
        .strip_prefix("pc=")
        .and_then(|range| range.split_once(".."))
        .ok_or_else(|| ParseError::BadHeader(line.to_string()))?;
    let begin = parse_hex("FDE start", range.0)?;
    let end = parse_hex("FDE end", range.1)?;
    Ok(Some((begin, end)))
}

fn parse_hex(what: &'static str, value: &str) -> Result<u64, ParseError> {
    u64::from_str_radix(value, 16).map_err(|_| ParseError::BadNumber {
        what,
        value: value.to_string(),
    })
}

/// Register columns declared by a block's `LOC CFA ...` line.
#[derive(Debug, Default)]
struct Columns {
    width: usize,
    ra: Option<usize>,
    rbp: Option<usize>,
    saved: Vec<(usize, Register)>,
}

impl Columns {
    fn parse(line: &str) -> Self {
        let mut columns = Columns::default();
        for (pos, name) in line.split_whitespace().enumerate() {
            columns.width = pos + 1;
            match Register::from_name(name) {
                _ if name == "LOC" || name == "CFA" => {}
                Register::Ra => columns.ra = Some(pos),
                Register::Rbp => columns.rbp = Some(pos),
                reg => columns.saved.push((pos, reg)),
            }
        }
        columns
    }

    fn parse_row(&self, line: &str) -> Result<Row, ParseError> {
        let values: Vec<&str> = line.split_whitespace().collect();
        let expected = self.width.max(2);
        if values.len() < expected {
            return Err(ParseError::ShortRow {
                line: line.to_string(),
                found: values.len(),
                expected,
            });
        }

        let rule_at = |pos: Option<usize>| pos.map_or(RegRule::Undefined, |pos| RegRule::parse(values[pos]));
        Ok(Row {
            loc: parse_hex("LOC", values[0])?,
            cfa: CfaRule::parse(values[1]),
            ra: rule_at(self.ra),
            rbp: rule_at(self.rbp),
            saved: self
                .saved
                .iter()
                .map(|(pos, reg)| (reg.clone(), RegRule::parse(values[*pos])))
                .collect::<BTreeMap<_, _>>(),
        })
    }
}
