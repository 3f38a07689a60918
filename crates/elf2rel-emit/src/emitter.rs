//! REL image construction pipeline.

use elf2rel_elf::ElfFile;
use tracing::debug;

use crate::buffer::RelBuffer;
use crate::header::ModuleHeader;
use crate::relocation::{collect_relocations, sort_relocations};
use crate::sections::pack_sections;
use crate::stream::write_relocations;
use crate::symbol_map::SymbolMap;
use crate::{EmitError, Result};

/// Builds a REL image from a parsed ELF object and an external symbol map.
pub struct RelWriter<'a> {
    elf: &'a ElfFile,
    symbol_map: &'a SymbolMap,
    module_id: u32,
    version: u32,
}

impl<'a> RelWriter<'a> {
    pub fn new(
        elf: &'a ElfFile,
        symbol_map: &'a SymbolMap,
        module_id: u32,
        version: u32,
    ) -> Result<Self> {
        if !(1..=3).contains(&version) {
            return Err(EmitError::UnsupportedVersion(version));
        }
        Ok(Self {
            elf,
            symbol_map,
            module_id,
            version,
        })
    }

    /// Build the complete REL image.
    ///
    /// The header region is reserved first and patched last, once section
    /// packing and stream emission have produced every offset it records.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut buffer = RelBuffer::new();
        buffer.write_zeros(ModuleHeader::size(self.version));

        let packed = pack_sections(self.elf, &mut buffer);
        debug!(
            bss_size = packed.total_bss_size,
            max_align = packed.max_align,
            "sections packed"
        );

        let mut relocations =
            collect_relocations(self.elf, self.symbol_map, &packed, self.module_id)?;
        sort_relocations(&mut relocations, self.module_id);
        debug!(count = relocations.len(), "relocations collected");

        let layout = write_relocations(&mut buffer, &relocations, &packed, self.module_id)?;

        let (prolog_section, prolog_offset) = self.entry_symbol("_prolog");
        let (epilog_section, epilog_offset) = self.entry_symbol("_epilog");
        let (unresolved_section, unresolved_offset) = self.entry_symbol("_unresolved");

        let header = ModuleHeader {
            id: self.module_id,
            version: self.version,
            section_count: self.elf.sections.len() as u32,
            section_info_offset: packed.section_info_offset,
            total_bss_size: packed.total_bss_size,
            relocation_offset: layout.relocation_offset,
            import_info_offset: layout.import_info_offset,
            import_info_size: layout.import_info_size,
            prolog_section,
            epilog_section,
            unresolved_section,
            prolog_offset,
            epilog_offset,
            unresolved_offset,
            max_align: packed.max_align,
            max_bss_align: packed.max_bss_align,
            fixed_data_size: layout.relocation_offset + layout.fixed_relocations_size,
        };

        let mut header_bytes = RelBuffer::new();
        header.write(&mut header_bytes);
        buffer.patch(0, header_bytes.as_bytes());

        Ok(buffer.into_bytes())
    }

    /// Section and offset of a module entry point symbol, zero if absent.
    fn entry_symbol(&self, name: &str) -> (u8, u32) {
        match self.elf.lookup_symbol(name) {
            Some(symbol) => (symbol.shndx as u8, symbol.value),
            None => (0, 0),
        }
    }
}
