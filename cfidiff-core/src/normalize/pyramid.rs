//! Rewrites flat callee-saved register saving into the staircase shape.
//!
//! Clang describes a run of `push` instructions by moving only the CFA, and
//! lists every saved register in the row after the run:
//!
//! ```text
//!    LOC           CFA      rbx   rbp   ra
//! 0000000000007180 rsp+8    u     u     c-8
//! 0000000000007181 rsp+16   u     u     c-8
//! 0000000000007182 rsp+24   u     u     c-8
//! 0000000000007189 rsp+7632 c-24  c-16  c-8
//! ```
//!
//! GCC introduces each register at the push that saves it:
//!
//! ```text
//!    LOC           CFA      rbx   rbp   ra
//! 0000000000007180 rsp+8    u     u     c-8
//! 0000000000007181 rsp+16   u     c-16  c-8
//! 0000000000007182 rsp+24   c-24  c-16  c-8
//! 0000000000007189 rsp+7632 c-24  c-16  c-8
//! ```
//!
//! Both describe the same frames; the first shape is rewritten into the
//! second so the comparison does not trip over it.

use crate::frame::{Register, RegRule, Row};

/// Size of a pushed register.
const SLOT: i64 = 8;
/// Longest `push` encoding (`push %r12` and up).
const MAX_PUSH_LEN: u64 = 2;

type Strategy = fn(&mut [Row]) -> bool;

/// Tried in order; the first one that applies wins.
const STRATEGIES: [Strategy; 2] = [from_first_row, after_leading_instruction];

/// Returns whether the rows were rewritten. Rows that do not have the flat
/// shape are left alone.
pub fn flat_to_pyramid(rows: &mut [Row]) -> bool {
    STRATEGIES.iter().any(|strategy| strategy(rows))
}

fn from_first_row(rows: &mut [Row]) -> bool {
    rewrite_run(rows, 1)
}

fn after_leading_instruction(rows: &mut [Row]) -> bool {
    rewrite_run(rows, 2)
}

/// Row 0 is always the implicit initial state, so runs start at `start >= 1`.
fn rewrite_run(rows: &mut [Row], start: usize) -> bool {
    let Some(first) = rows.get(start) else {
        return false;
    };
    let Some((base, first_cfa)) = first.cfa.reg_offset() else {
        return false;
    };
    let base = base.clone();

    let mut prev_cfa = first_cfa;
    let mut prev_loc = first.loc;
    let mut flatness = start + 1;
    for row in &rows[start + 1..] {
        // The step into the run is not length checked: an `endbr64` or
        // similar may sit ahead of the first push.
        let check_loc = flatness > start + 1;
        let Some(cfa) = flat_step(row, &base, prev_cfa, prev_loc, check_loc) else {
            break;
        };
        prev_cfa = cfa;
        prev_loc = row.loc;
        flatness += 1;
    }

    if flatness - start <= 1 || flatness >= rows.len() {
        return false;
    }

    let Some(changes) = staircase_steps(&rows[flatness], start, first_cfa) else {
        return false;
    };
    log::debug!(
        "Flat register saving over rows {start}..{flatness}, spreading {} rules",
        changes.len()
    );
    for (reg, origin, rule) in changes {
        if let Some(run) = rows.get_mut(origin..flatness) {
            for row in run {
                row.set_rule(reg.clone(), rule.clone());
            }
        }
    }
    true
}

/// The CFA offset of `row` when it continues the flat run, one slot deeper
/// than the previous row.
fn flat_step(
    row: &Row,
    base: &Register,
    prev_cfa: i64,
    prev_loc: u64,
    check_loc: bool,
) -> Option<i64> {
    if !row.rbp.is_undefined() || !row.saved.values().all(RegRule::is_undefined) {
        return None;
    }
    let expected = prev_cfa.checked_add(SLOT)?;
    match row.cfa.reg_offset() {
        Some((reg, offset)) if reg == base && offset == expected => {}
        _ => return None,
    }
    if check_loc && !prev_loc.checked_add(MAX_PUSH_LEN).is_some_and(|limit| row.loc <= limit) {
        return None;
    }
    Some(expected)
}

/// For every register the flatness row saves, the row of the push that
/// saved it. `None` when some register is not saved relative to the CFA in
/// a slot of the run.
fn staircase_steps(
    flatness_row: &Row,
    start: usize,
    first_cfa: i64,
) -> Option<Vec<(Register, usize, RegRule)>> {
    let rbp = Register::Rbp;
    let registers = std::iter::once((&rbp, &flatness_row.rbp)).chain(&flatness_row.saved);

    let mut changes = Vec::new();
    for (reg, rule) in registers {
        let depth = rule.saved_below_cfa()?.checked_sub(first_cfa)?;
        if depth < 0 || depth % SLOT != 0 {
            return None;
        }
        let origin = start.checked_add(usize::try_from(depth / SLOT).ok()?)?;
        changes.push((reg.clone(), origin, rule.clone()));
    }
    Some(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CfaRule, INITIAL_ROW};
    use std::collections::BTreeMap;

    fn row(loc: u64, cfa: &str, regs: &[(&str, &str)]) -> Row {
        let mut row = Row {
            loc,
            cfa: CfaRule::parse(cfa),
            ra: RegRule::parse("c-8"),
            rbp: RegRule::Undefined,
            saved: BTreeMap::new(),
        };
        for (name, rule) in regs {
            row.set_rule(Register::from_name(name), RegRule::parse(rule));
        }
        row
    }

    fn clang_prologue() -> Vec<Row> {
        vec![
            INITIAL_ROW,
            row(0x7180, "rsp+8", &[("rbx", "u"), ("rbp", "u")]),
            row(0x7181, "rsp+16", &[("rbx", "u"), ("rbp", "u")]),
            row(0x7182, "rsp+24", &[("rbx", "u"), ("rbp", "u")]),
            row(0x7189, "rsp+7632", &[("rbx", "c-24"), ("rbp", "c-16")]),
        ]
    }

    #[test]
    fn flat_run_becomes_staircase() {
        let mut rows = clang_prologue();
        assert!(flat_to_pyramid(&mut rows));

        let expected = vec![
            INITIAL_ROW,
            row(0x7180, "rsp+8", &[("rbx", "u"), ("rbp", "u")]),
            row(0x7181, "rsp+16", &[("rbx", "u"), ("rbp", "c-16")]),
            row(0x7182, "rsp+24", &[("rbx", "c-24"), ("rbp", "c-16")]),
            row(0x7189, "rsp+7632", &[("rbx", "c-24"), ("rbp", "c-16")]),
        ];
        assert_eq!(rows, expected);
    }

    #[test]
    fn run_may_start_after_a_longer_instruction() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", &[("rbp", "u")]),
            row(0x1005, "rsp+16", &[("rbp", "u")]),
            row(0x1010, "rsp+32", &[("rbp", "c-16")]),
        ];
        assert!(flat_to_pyramid(&mut rows));
        assert_eq!(rows[2].rbp, RegRule::CfaOffset(-16));
        assert_eq!(rows[1].rbp, RegRule::Undefined);
    }

    #[test]
    fn second_offset_takes_over_when_first_run_breaks() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", &[("rbp", "u")]),
            row(0x1001, "rsp+16", &[("rbp", "u")]),
            row(0x1009, "rsp+24", &[("rbp", "u")]),
            row(0x100a, "rsp+32", &[("rbp", "c-16")]),
        ];
        // From row 1 the gap before 0x1009 ends the run on a row that saves
        // nothing; from row 2 the run is 0x1001..0x100a.
        assert!(flat_to_pyramid(&mut rows));
        assert_eq!(rows[1].rbp, RegRule::Undefined);
        assert_eq!(rows[2].rbp, RegRule::CfaOffset(-16));
        assert_eq!(rows[3].rbp, RegRule::CfaOffset(-16));
        assert_eq!(rows[4].cfa.to_string(), "rsp+32");
    }

    #[test]
    fn no_rewrite_without_flat_run() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", &[("rbp", "u")]),
            row(0x1001, "rsp+16", &[("rbp", "c-16")]),
            row(0x1004, "rbp+16", &[("rbp", "c-16")]),
        ];
        let before = rows.clone();
        assert!(!flat_to_pyramid(&mut rows));
        assert_eq!(rows, before);
    }

    #[test]
    fn no_rewrite_when_flatness_row_is_not_all_saved() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", &[("rbx", "u"), ("rbp", "u")]),
            row(0x1001, "rsp+16", &[("rbx", "u"), ("rbp", "u")]),
            row(0x1008, "rsp+48", &[("rbx", "c-16"), ("rbp", "u")]),
        ];
        let before = rows.clone();
        assert!(!flat_to_pyramid(&mut rows));
        assert_eq!(rows, before);
    }

    #[test]
    fn no_rewrite_for_misaligned_slots() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+8", &[("rbp", "u")]),
            row(0x1001, "rsp+16", &[("rbp", "u")]),
            row(0x1008, "rsp+32", &[("rbp", "c-12")]),
        ];
        let before = rows.clone();
        assert!(!flat_to_pyramid(&mut rows));
        assert_eq!(rows, before);
    }

    #[test]
    fn extreme_offsets_end_the_run() {
        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp+9223372036854775807", &[("rbp", "u")]),
            row(0x1001, "rsp+16", &[("rbp", "u")]),
            row(0x1002, "rsp+24", &[("rbp", "c-16")]),
        ];
        let before = rows.clone();
        assert!(!flat_to_pyramid(&mut rows));
        assert_eq!(rows, before);

        let mut rows = vec![
            INITIAL_ROW,
            row(u64::MAX - 3, "rsp+8", &[("rbp", "u")]),
            row(u64::MAX - 1, "rsp+16", &[("rbp", "u")]),
            row(u64::MAX, "rsp+24", &[("rbp", "u")]),
        ];
        assert!(!flat_to_pyramid(&mut rows));

        let mut rows = vec![
            INITIAL_ROW,
            row(0x1000, "rsp-9223372036854775807", &[("rbp", "u")]),
            row(0x1001, "rsp-9223372036854775799", &[("rbp", "u")]),
            row(0x1002, "rsp+8", &[("rbp", "c-16")]),
        ];
        assert!(!flat_to_pyramid(&mut rows));
    }

    #[test]
    fn too_short_for_either_offset() {
        let mut rows = vec![INITIAL_ROW];
        assert!(!flat_to_pyramid(&mut rows));
        let mut rows = vec![INITIAL_ROW, row(0x1000, "rsp+8", &[])];
        assert!(!flat_to_pyramid(&mut rows));
        assert_eq!(rows.len(), 2);
    }
}
