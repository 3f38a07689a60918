//! Relocation collection, classification, and ordering.

use elf2rel_elf::{ElfFile, R_PPC_NONE};

use tracing::warn;

use crate::sections::PackedSections;
use crate::symbol_map::SymbolMap;
use crate::{EmitError, Result};

/// A relocation resolved against the symbol tables, ready for encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Module the target symbol lives in; 0 is the dol.
    pub module_id: u32,
    /// ELF index of the section the relocation applies to.
    pub source_section: u32,
    /// Offset within the source section.
    pub source_offset: u32,
    /// PowerPC relocation type.
    pub rel_type: u8,
    /// Section index of the target within its module.
    pub target_section: u8,
    /// Final addend with the symbol value or external address folded in.
    pub addend: u32,
}

/// Relocations against the dol and this module are ordered last so
/// OSLinkFixed can apply and then trim them.
pub fn module_delay(module_id: u32, this_module: u32) -> u32 {
    u32::from(module_id == 0 || module_id == this_module)
}

/// Resolve every RELA entry targeting a written section.
///
/// Entries against symbols defined in this object become self relocations;
/// undefined symbols are looked up in the external map. Unresolved externals
/// are reported and dropped. A symbol index the ELF symbol table cannot
/// resolve is fatal.
pub fn collect_relocations(
    elf: &ElfFile,
    symbol_map: &SymbolMap,
    packed: &PackedSections,
    this_module: u32,
) -> Result<Vec<Relocation>> {
    let mut relocations = Vec::new();

    for rela in &elf.relocations {
        if !packed.is_written(rela.target_section) {
            continue;
        }
        let source_name = &elf.sections[rela.target_section as usize].name;

        for entry in &rela.entries {
            if entry.rel_type == R_PPC_NONE {
                continue;
            }

            let symbol = elf
                .symbol(entry.symbol)
                .ok_or(EmitError::SymbolLookup {
                    index: entry.symbol,
                })?;

            let relocation = if symbol.shndx != 0 {
                // Defined in this object.
                let target = symbol.shndx as u32;
                match elf.sections.get(target as usize) {
                    Some(section) if packed.is_written(target) || section.is_nobits() => {}
                    Some(section) => warn!(
                        source = %source_name,
                        offset = entry.offset,
                        symbol = %symbol.name,
                        target = %section.name,
                        "relocation against unwritten section"
                    ),
                    None => warn!(
                        source = %source_name,
                        offset = entry.offset,
                        symbol = %symbol.name,
                        "relocation against out-of-range section index"
                    ),
                }

                Relocation {
                    module_id: this_module,
                    source_section: rela.target_section,
                    source_offset: entry.offset,
                    rel_type: entry.rel_type,
                    target_section: symbol.shndx as u8,
                    addend: (entry.addend + symbol.value as i64) as u32,
                }
            } else {
                // Undefined here; known external?
                let Some(location) = symbol_map.get(&symbol.name) else {
                    warn!(symbol = %symbol.name, "unresolved external symbol");
                    continue;
                };
                Relocation {
                    module_id: location.module_id,
                    source_section: rela.target_section,
                    source_offset: entry.offset,
                    rel_type: entry.rel_type,
                    target_section: location.target_section as u8,
                    addend: (entry.addend + location.addr as i64) as u32,
                }
            };

            relocations.push(relocation);
        }
    }

    Ok(relocations)
}

/// Order relocations for the command stream: trimmable modules last, then by
/// module, source section, and offset.
pub fn sort_relocations(relocations: &mut [Relocation], this_module: u32) {
    relocations.sort_by_key(|r| {
        (
            module_delay(r.module_id, this_module),
            r.module_id,
            r.source_section,
            r.source_offset,
        )
    });
}
