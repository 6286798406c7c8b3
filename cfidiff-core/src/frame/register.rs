use std::fmt;

/// A register column as `readelf -wF` names it on x86-64.
///
/// Columns outside the general purpose set (vector registers, segment
/// registers, numbered fallbacks) are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Rax,
    Rdx,
    Rcx,
    Rbx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
    /// Return address column.
    Ra,
    Other(String),
}

impl Register {
    pub fn from_name(name: &str) -> Self {
        match name {
            "rax" => Register::Rax,
            "rdx" => Register::Rdx,
            "rcx" => Register::Rcx,
            "rbx" => Register::Rbx,
            "rsi" => Register::Rsi,
            "rdi" => Register::Rdi,
            "rbp" => Register::Rbp,
            "rsp" => Register::Rsp,
            "r8" => Register::R8,
            "r9" => Register::R9,
            "r10" => Register::R10,
            "r11" => Register::R11,
            "r12" => Register::R12,
            "r13" => Register::R13,
            "r14" => Register::R14,
            "r15" => Register::R15,
            "rip" => Register::Rip,
            "ra" => Register::Ra,
            other => Register::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Register::Rax => "rax",
            Register::Rdx => "rdx",
            Register::Rcx => "rcx",
            Register::Rbx => "rbx",
            Register::Rsi => "rsi",
            Register::Rdi => "rdi",
            Register::Rbp => "rbp",
            Register::Rsp => "rsp",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
            Register::Rip => "rip",
            Register::Ra => "ra",
            Register::Other(name) => name,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
