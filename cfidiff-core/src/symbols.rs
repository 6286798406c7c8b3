pub mod elf;

use crate::error::ParseError;
use crate::input::Section;
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

/// Symbols keyed by name, remembering the order they were first seen in.
///
/// Re-inserting a name replaces its address and size but keeps its
/// position, so address lookups resolve to the first listed name.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u64, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `readelf -s`-like lines: field 2 is the hex address, field 3
    /// the decimal (or `0x` hex) size and field 8 the name.
    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for line in lines {
            if let Some(symbol) = parse_symbol_line(line.as_ref())? {
                table.insert(symbol);
            }
        }
        log::info!("Loaded {} symbols", table.len());
        Ok(table)
    }

    pub fn from_section(section: &Section) -> Result<Self> {
        Self::from_lines(&section.lines)
    }

    pub fn insert(&mut self, symbol: Symbol) {
        match self.by_name.get(&symbol.name) {
            Some(&index) => {
                self.symbols[index] = symbol;
                self.reindex_addresses();
            }
            None => {
                let index = self.symbols.len();
                self.by_name.insert(symbol.name.clone(), index);
                self.by_address.entry(symbol.address).or_insert(index);
                self.symbols.push(symbol);
            }
        }
    }

    fn reindex_addresses(&mut self) {
        self.by_address.clear();
        for (index, symbol) in self.symbols.iter().enumerate() {
            self.by_address.entry(symbol.address).or_insert(index);
        }
    }

    /// First symbol, in listing order, that starts at `address`.
    pub fn name_at(&self, address: u64) -> Option<&str> {
        self.by_address
            .get(&address)
            .map(|&index| self.symbols[index].name.as_str())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
impl SymbolTable {
    fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&index| &self.symbols[index])
    }

    fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

fn parse_symbol_line(line: &str) -> Result<Option<Symbol>, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return Ok(None);
    }
    if fields.len() < 8 {
        // Unnamed entries (the null symbol, section symbols) end early.
        log::debug!("Skipping unnamed symbol line `{line}`");
        return Ok(None);
    }

    let address = u64::from_str_radix(fields[1], 16)
        .map_err(|_| ParseError::BadSymbol(line.to_string()))?;
    let size = read_size(fields[2]).ok_or_else(|| ParseError::BadSymbol(line.to_string()))?;

    Ok(Some(Symbol {
        name: fields[7].to_string(),
        address,
        size,
    }))
}

fn read_size(value: &str) -> Option<u64> {
    match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
