pub mod register;
pub mod rule;

pub use register::Register;
pub use rule::{CfaRule, RegRule};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One line of an FDE's unwind table: the rules in effect from `loc` until
/// the next row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub loc: u64,
    pub cfa: CfaRule,
    pub ra: RegRule,
    pub rbp: RegRule,
    /// Every other tracked column. Empty once the rows are compacted.
    pub saved: BTreeMap<Register, RegRule>,
}

/// State every FDE starts from before its first instruction, as set up by
/// the CIE on x86-64: the call just pushed the return address.
pub const INITIAL_ROW: Row = Row {
    loc: 0,
    cfa: CfaRule::RegOffset {
        reg: Register::Rsp,
        offset: 8,
    },
    ra: RegRule::CfaOffset(-8),
    rbp: RegRule::Undefined,
    saved: BTreeMap::new(),
};

impl Row {
    pub fn snapshot(&self) -> RuleSnapshot {
        RuleSnapshot {
            cfa: self.cfa.clone(),
            ra: self.ra.clone(),
            rbp: self.rbp.clone(),
        }
    }

    pub fn set_rule(&mut self, reg: Register, rule: RegRule) {
        match reg {
            Register::Rbp => self.rbp = rule,
            Register::Ra => self.ra = rule,
            _ => {
                self.saved.insert(reg, rule);
            }
        }
    }
}

/// The rules two tables must agree on at every address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSnapshot {
    pub cfa: CfaRule,
    pub ra: RegRule,
    pub rbp: RegRule,
}

impl fmt::Display for RuleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{CFA: {}, ra: {}, rbp: {}}}", self.cfa, self.ra, self.rbp)
    }
}

/// Unwind metadata of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fde {
    pub begin: u64,
    pub end: u64,
    /// Symbol starting at `begin`, when the symbol table has one.
    pub symbol: Option<String>,
    pub rows: Vec<Row>,
}

impl Fde {
    /// PLT stubs compute their CFA with an expression.
    pub fn is_plt(&self) -> bool {
        self.rows.iter().any(|row| row.cfa == CfaRule::Expression)
    }

    /// Nothing happens past the initial state.
    pub fn is_trivial(&self) -> bool {
        self.rows.len() <= 1
    }

    pub fn contains(&self, other: &Fde) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    pub fn range(&self) -> FdeRange {
        FdeRange {
            begin: self.begin,
            end: self.end,
        }
    }

    pub fn function_identifier(&self) -> String {
        match &self.symbol {
            Some(name) => name.clone(),
            None => format!("FUNC_{:#x}", self.begin),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FdeRange {
    pub begin: u64,
    pub end: u64,
}

impl fmt::Display for FdeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}--{:#x}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(loc: u64, cfa: &str, rbp: &str, ra: &str) -> Row {
        Row {
            loc,
            cfa: CfaRule::parse(cfa),
            ra: RegRule::parse(ra),
            rbp: RegRule::parse(rbp),
            saved: BTreeMap::new(),
        }
    }

    #[test]
    fn initial_row_shape() {
        assert_eq!(INITIAL_ROW, row(0, "rsp+8", "u", "c-8"));
        assert_eq!(
            INITIAL_ROW.snapshot().to_string(),
            "{CFA: rsp+8, ra: c-8, rbp: u}"
        );
    }

    #[test]
    fn plt_detection_and_containment() {
        let plt = Fde {
            begin: 0x1000,
            end: 0x1040,
            symbol: None,
            rows: vec![
                INITIAL_ROW,
                row(0x1006, "rsp+16", "u", "c-8"),
                row(0x1010, "exp", "u", "c-8"),
            ],
        };
        let stub = Fde {
            begin: 0x1010,
            end: 0x1020,
            symbol: None,
            rows: vec![INITIAL_ROW],
        };
        assert!(plt.is_plt());
        assert!(!stub.is_plt());
        assert!(stub.is_trivial());
        assert!(plt.contains(&stub));
        assert!(!stub.contains(&plt));
        assert_eq!(plt.range().to_string(), "0x1000--0x1040");
        assert_eq!(stub.function_identifier(), "FUNC_0x1010");
    }
}
