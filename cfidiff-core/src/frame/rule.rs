use std::fmt;

use serde::{Serialize, Serializer};

use super::Register;

/// How the canonical frame address is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfaRule {
    /// `reg+N` or `reg-N`.
    RegOffset { reg: Register, offset: i64 },
    /// `exp`, a DWARF expression. Only PLT stubs use these.
    Expression,
    /// Anything else, compared literally.
    Other(String),
}

impl CfaRule {
    pub fn parse(token: &str) -> Self {
        if token == "exp" {
            return CfaRule::Expression;
        }
        let Some(split) = token.find(['+', '-']) else {
            return CfaRule::Other(token.to_string());
        };
        let (reg, offset) = token.split_at(split);
        match offset.parse::<i64>() {
            Ok(offset) if !reg.is_empty() => {
                let rule = CfaRule::RegOffset {
                    reg: Register::from_name(reg),
                    offset,
                };
                // Only canonical spellings are typed, so rendering never
                // changes what gets compared.
                if rule.to_string() == token {
                    rule
                } else {
                    CfaRule::Other(token.to_string())
                }
            }
            _ => CfaRule::Other(token.to_string()),
        }
    }

    pub fn reg_offset(&self) -> Option<(&Register, i64)> {
        match self {
            CfaRule::RegOffset { reg, offset } => Some((reg, *offset)),
            _ => None,
        }
    }
}

impl fmt::Display for CfaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfaRule::RegOffset { reg, offset } => write!(f, "{reg}{offset:+}"),
            CfaRule::Expression => f.write_str("exp"),
            CfaRule::Other(text) => f.write_str(text),
        }
    }
}

impl Serialize for CfaRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a register's caller value is recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegRule {
    /// `u`
    Undefined,
    /// `c-N`: saved at CFA minus N (stored as the signed offset).
    CfaOffset(i64),
    Other(String),
}

impl RegRule {
    pub fn parse(token: &str) -> Self {
        if token == "u" {
            return RegRule::Undefined;
        }
        if let Some(offset) = token.strip_prefix('c') {
            if offset.starts_with(['+', '-']) {
                if let Ok(offset) = offset.parse::<i64>() {
                    let rule = RegRule::CfaOffset(offset);
                    if rule.to_string() == token {
                        return rule;
                    }
                }
            }
        }
        RegRule::Other(token.to_string())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, RegRule::Undefined)
    }

    /// The `N` of a `c-N` rule.
    pub fn saved_below_cfa(&self) -> Option<i64> {
        match self {
            RegRule::CfaOffset(offset) if *offset < 0 => offset.checked_neg(),
            _ => None,
        }
    }
}

impl fmt::Display for RegRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegRule::Undefined => f.write_str("u"),
            RegRule::CfaOffset(offset) => write!(f, "c{offset:+}"),
            RegRule::Other(text) => f.write_str(text),
        }
    }
}

impl Serialize for RegRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
