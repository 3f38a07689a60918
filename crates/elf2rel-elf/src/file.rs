//! ELF file parser.

use crate::constants::*;
use crate::header::*;
use crate::{ElfError, Result};

/// Read big-endian u16 from bytes.
#[inline]
fn read_be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Read big-endian u32 from bytes.
#[inline]
fn read_be32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Read big-endian u64 from bytes.
#[inline]
fn read_be64(data: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ])
}

/// Parsed ELF file.
///
/// Sections are held in header-table order, index 0 included, so section
/// indices from the symbol table and RELA headers index directly into
/// `sections`.
#[derive(Clone, Debug)]
pub struct ElfFile {
    pub class: u8,
    pub machine: u16,
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<RelaSection>,
}

impl ElfFile {
    /// Parse ELF file from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Self::parse_header(data)?;
        let raw_sections = Self::parse_all_sections(data, &header)?;
        let sections = Self::resolve_sections(data, &raw_sections, &header)?;
        let symbols = Self::parse_symbols(data, &raw_sections, header.class)?;
        let relocations = Self::parse_relocations(&raw_sections, &sections, header.class)?;

        Ok(Self {
            class: header.class,
            machine: header.machine,
            sections,
            symbols,
            relocations,
        })
    }

    /// Look up a symbol by index.
    pub fn symbol(&self, index: u32) -> Option<&Symbol> {
        self.symbols.get(index as usize)
    }

    /// Look up a symbol by name (first match in table order).
    pub fn lookup_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    fn parse_header(data: &[u8]) -> Result<ElfHeader> {
        if data.len() < 52 {
            return Err(ElfError::TooSmall);
        }

        if data[0..4] != ELF_MAGIC {
            return Err(ElfError::InvalidMagic);
        }

        let class = data[4];
        if class != ELF_CLASS_32 && class != ELF_CLASS_64 {
            return Err(ElfError::UnsupportedClass(class));
        }
        if data[5] != ELF_DATA_MSB {
            return Err(ElfError::NotBigEndian);
        }

        if class == ELF_CLASS_64 {
            if data.len() < 64 {
                return Err(ElfError::TooSmall);
            }
            Ok(ElfHeader {
                class,
                machine: read_be16(data, 18),
                shoff: read_be64(data, 40),
                shentsize: read_be16(data, 58),
                shnum: read_be16(data, 60),
                shstrndx: read_be16(data, 62),
            })
        } else {
            Ok(ElfHeader {
                class,
                machine: read_be16(data, 18),
                shoff: read_be32(data, 32) as u64,
                shentsize: read_be16(data, 46),
                shnum: read_be16(data, 48),
                shstrndx: read_be16(data, 50),
            })
        }
    }

    fn parse_all_sections(data: &[u8], header: &ElfHeader) -> Result<Vec<SectionHeader>> {
        let mut sections = Vec::with_capacity(header.shnum as usize);

        for i in 0..header.shnum {
            let offset = header.shoff as usize + (i as usize) * (header.shentsize as usize);
            let sh = Self::parse_section_header(data, offset, header.class)?;
            sections.push(sh);
        }

        Ok(sections)
    }

    fn parse_section_header(data: &[u8], offset: usize, class: u8) -> Result<SectionHeader> {
        if class == ELF_CLASS_64 {
            if offset + 64 > data.len() {
                return Err(ElfError::SectionOutOfBounds);
            }
            Ok(SectionHeader {
                name: read_be32(data, offset),
                sh_type: read_be32(data, offset + 4),
                flags: read_be64(data, offset + 8),
                addr: read_be64(data, offset + 16),
                offset: read_be64(data, offset + 24),
                size: read_be64(data, offset + 32),
                link: read_be32(data, offset + 40),
                info: read_be32(data, offset + 44),
                addralign: read_be64(data, offset + 48),
                entsize: read_be64(data, offset + 56),
            })
        } else {
            if offset + 40 > data.len() {
                return Err(ElfError::SectionOutOfBounds);
            }
            Ok(SectionHeader {
                name: read_be32(data, offset),
                sh_type: read_be32(data, offset + 4),
                flags: read_be32(data, offset + 8) as u64,
                addr: read_be32(data, offset + 12) as u64,
                offset: read_be32(data, offset + 16) as u64,
                size: read_be32(data, offset + 20) as u64,
                link: read_be32(data, offset + 24),
                info: read_be32(data, offset + 28),
                addralign: read_be32(data, offset + 32) as u64,
                entsize: read_be32(data, offset + 36) as u64,
            })
        }
    }

    fn resolve_sections(
        data: &[u8],
        raw: &[SectionHeader],
        header: &ElfHeader,
    ) -> Result<Vec<Section>> {
        let strtab = raw.get(header.shstrndx as usize);

        let mut sections = Vec::with_capacity(raw.len());
        for sh in raw {
            let name = match strtab {
                Some(tab) => {
                    Self::extract_string(data, tab.offset as usize, sh.name as usize)
                }
                None => String::new(),
            };
            let section_data = Self::load_section_data(data, sh)?;

            sections.push(Section {
                name,
                sh_type: sh.sh_type,
                flags: sh.flags,
                size: sh.size as u32,
                addralign: sh.addralign as u32,
                link: sh.link,
                info: sh.info,
                data: section_data,
            });
        }

        Ok(sections)
    }

    fn load_section_data(data: &[u8], sh: &SectionHeader) -> Result<Vec<u8>> {
        if sh.sh_type == SHT_NULL || sh.sh_type == SHT_NOBITS {
            return Ok(Vec::new());
        }

        let offset = sh.offset as usize;
        let size = sh.size as usize;
        if offset + size > data.len() {
            return Err(ElfError::SectionBeyondFile);
        }
        Ok(data[offset..offset + size].to_vec())
    }

    fn parse_symbols(data: &[u8], raw: &[SectionHeader], class: u8) -> Result<Vec<Symbol>> {
        let Some(symtab) = raw.iter().find(|sh| sh.sh_type == SHT_SYMTAB) else {
            return Ok(Vec::new());
        };

        let strtab_offset = raw
            .get(symtab.link as usize)
            .map(|sh| sh.offset as usize)
            .unwrap_or(0);

        let entsize = if class == ELF_CLASS_64 { 24 } else { 16 };
        let count = (symtab.size as usize) / entsize;
        let base = symtab.offset as usize;

        let mut symbols = Vec::with_capacity(count);
        for i in 0..count {
            let offset = base + i * entsize;
            if offset + entsize > data.len() {
                return Err(ElfError::SymbolOutOfBounds);
            }

            let (name_offset, value, size, info, shndx) = if class == ELF_CLASS_64 {
                (
                    read_be32(data, offset),
                    read_be64(data, offset + 8) as u32,
                    read_be64(data, offset + 16) as u32,
                    data[offset + 4],
                    read_be16(data, offset + 6),
                )
            } else {
                (
                    read_be32(data, offset),
                    read_be32(data, offset + 4),
                    read_be32(data, offset + 8),
                    data[offset + 12],
                    read_be16(data, offset + 14),
                )
            };

            symbols.push(Symbol {
                name: Self::extract_string(data, strtab_offset, name_offset as usize),
                value,
                size,
                sym_type: info & 0xF,
                binding: info >> 4,
                shndx,
            });
        }

        Ok(symbols)
    }

    fn parse_relocations(
        raw: &[SectionHeader],
        sections: &[Section],
        class: u8,
    ) -> Result<Vec<RelaSection>> {
        let entsize = if class == ELF_CLASS_64 { 24 } else { 12 };

        let mut relocations = Vec::new();
        for (i, sh) in raw.iter().enumerate() {
            if sh.sh_type != SHT_RELA {
                continue;
            }

            let data = &sections[i].data;
            let count = data.len() / entsize;
            let mut entries = Vec::with_capacity(count);
            for j in 0..count {
                let offset = j * entsize;
                if offset + entsize > data.len() {
                    return Err(ElfError::RelocationOutOfBounds);
                }

                let entry = if class == ELF_CLASS_64 {
                    let info = read_be64(data, offset + 8);
                    RelaEntry {
                        offset: read_be64(data, offset) as u32,
                        symbol: (info >> 32) as u32,
                        rel_type: (info & 0xFF) as u8,
                        addend: read_be64(data, offset + 16) as i64,
                    }
                } else {
                    let info = read_be32(data, offset + 4);
                    RelaEntry {
                        offset: read_be32(data, offset),
                        symbol: info >> 8,
                        rel_type: (info & 0xFF) as u8,
                        addend: read_be32(data, offset + 8) as i32 as i64,
                    }
                };
                entries.push(entry);
            }

            relocations.push(RelaSection {
                target_section: sh.info,
                entries,
            });
        }

        Ok(relocations)
    }

    fn extract_string(data: &[u8], strtab_offset: usize, string_offset: usize) -> String {
        let start = strtab_offset + string_offset;
        let mut result = String::new();

        for i in start..data.len() {
            if data[i] == 0 {
                break;
            }
            result.push(data[i] as char);
        }

        result
    }
}
