use crate::frame::Row;

/// Drops the columns the comparison ignores and folds away duplicate rows.
///
/// Only rows at the same address fold: the later one supersedes the earlier,
/// which also removes exact duplicates. A row that repeats its predecessor's
/// rules at a new address stays, so a leaf function's row at its entry
/// point survives. Compacting compacted rows returns them unchanged.
pub fn compact(rows: Vec<Row>) -> Vec<Row> {
    let mut out: Vec<Row> = Vec::with_capacity(rows.len());
    for mut row in rows {
        row.saved.clear();
        match out.last_mut() {
            Some(last) if last.loc == row.loc => *last = row,
            _ => out.push(row),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CfaRule, RegRule, Register, INITIAL_ROW};
    use std::collections::BTreeMap;

    fn row(loc: u64, cfa: &str, rbp: &str, rbx: &str) -> Row {
        let mut saved = BTreeMap::new();
        saved.insert(Register::Rbx, RegRule::parse(rbx));
        Row {
            loc,
            cfa: CfaRule::parse(cfa),
            ra: RegRule::parse("c-8"),
            rbp: RegRule::parse(rbp),
            saved,
        }
    }

    fn sample() -> Vec<Row> {
        vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", "u", "u"),
            row(0x1001, "rsp+16", "u", "u"),
            row(0x1001, "rsp+16", "u", "u"),
            row(0x1003, "rsp+24", "c-24", "c-16"),
            row(0x1010, "rsp+24", "c-24", "c-16"),
        ]
    }

    #[test]
    fn folds_duplicates_and_drops_columns() {
        let rows = compact(sample());
        let locs: Vec<u64> = rows.iter().map(|row| row.loc).collect();
        assert_eq!(locs, vec![0, 0x1000, 0x1001, 0x1003, 0x1010]);
        assert!(rows.iter().all(|row| row.saved.is_empty()));
    }

    #[test]
    fn entry_row_of_leaf_function_survives() {
        let mut entry = INITIAL_ROW;
        entry.loc = 0x2000;
        let rows = compact(vec![INITIAL_ROW, entry.clone()]);
        assert_eq!(rows, vec![INITIAL_ROW, entry]);
    }

    #[test]
    fn idempotent() {
        let once = compact(sample());
        let twice = compact(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn later_row_at_same_address_wins() {
        let mut first = INITIAL_ROW;
        first.loc = 0x10;
        let mut second = first.clone();
        second.cfa = CfaRule::parse("rsp+16");
        let rows = compact(vec![INITIAL_ROW, first, second.clone()]);
        assert_eq!(rows, vec![INITIAL_ROW, second]);
    }

    #[test]
    fn empty_stays_empty() {
        assert!(compact(Vec::new()).is_empty());
    }
}
