use super::{Symbol, SymbolTable};
use anyhow::{bail, Context, Result};
use goblin::elf::section_header::SHN_UNDEF;
use goblin::elf::Elf;
use goblin::Object;
use std::path::Path;

impl SymbolTable {
    /// Reads the symbols straight out of an ELF binary instead of a
    /// `readelf -s` listing. Falls back to `.dynsym` for stripped binaries.
    pub fn from_elf<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        match Object::parse(&buf).with_context(|| format!("parsing {}", path.display()))? {
            Object::Elf(elf) => Ok(Self::from_goblin(&elf)),
            _ => bail!("{} is not an ELF binary", path.display()),
        }
    }

    pub fn from_goblin(elf: &Elf) -> Self {
        let (syms, strtab) = if elf.syms.is_empty() {
            log::warn!("No .symtab (stripped binary); using .dynsym");
            (&elf.dynsyms, &elf.dynstrtab)
        } else {
            (&elf.syms, &elf.strtab)
        };

        let mut table = Self::new();
        for sym in syms.iter() {
            if sym.st_shndx == SHN_UNDEF as usize || sym.st_value == 0 {
                continue;
            }
            let name = match strtab.get_at(sym.st_name) {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            table.insert(Symbol {
                name: name.to_string(),
                address: sym.st_value,
                size: sym.st_size,
            });
        }
        log::info!("Loaded {} symbols from ELF", table.len());
        table
    }
}
