//! Shared helpers: in-memory big-endian PowerPC ELF objects and REL readers.

#![allow(dead_code)]

use elf2rel_elf::{EM_PPC, SHT_NOBITS, SHT_NULL, SHT_RELA, SHT_STRTAB, SHT_SYMTAB};

pub fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub fn be32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Symbol table entry for the builder.
pub struct Sym {
    pub name: &'static str,
    pub value: u32,
    pub shndx: u16,
}

#[derive(Clone)]
struct RawSection {
    name: String,
    sh_type: u32,
    flags: u32,
    link: u32,
    info: u32,
    addralign: u32,
    entsize: u32,
    size: u32,
    data: Vec<u8>,
}

impl RawSection {
    fn null() -> Self {
        Self {
            name: String::new(),
            sh_type: SHT_NULL,
            flags: 0,
            link: 0,
            info: 0,
            addralign: 0,
            entsize: 0,
            size: 0,
            data: Vec::new(),
        }
    }
}

/// Builds a 32-bit big-endian relocatable ELF in memory.
pub struct ElfBuilder {
    sections: Vec<RawSection>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            sections: vec![RawSection::null()],
        }
    }

    pub fn add_progbits(&mut self, name: &str, data: Vec<u8>, flags: u64, align: u32) -> u16 {
        let index = self.sections.len() as u16;
        let size = data.len() as u32;
        self.sections.push(RawSection {
            name: name.to_string(),
            sh_type: elf2rel_elf::SHT_PROGBITS,
            flags: flags as u32,
            link: 0,
            info: 0,
            addralign: align,
            entsize: 0,
            size,
            data,
        });
        index
    }

    pub fn add_nobits(&mut self, name: &str, size: u32, align: u32) -> u16 {
        let index = self.sections.len() as u16;
        self.sections.push(RawSection {
            name: name.to_string(),
            sh_type: SHT_NOBITS,
            flags: elf2rel_elf::SHF_ALLOC as u32,
            link: 0,
            info: 0,
            addralign: align,
            entsize: 0,
            size,
            data: Vec::new(),
        });
        index
    }

    /// Add `.symtab` and its `.strtab`; symbol indices start at 1 after the
    /// reserved null entry.
    pub fn add_symtab(&mut self, symbols: &[Sym]) -> u16 {
        let symtab_index = self.sections.len() as u16;
        let strtab_index = symtab_index + 1;

        let mut strtab = vec![0u8];
        let mut symdata = vec![0u8; 16];
        for symbol in symbols {
            let name_offset = strtab.len() as u32;
            strtab.extend_from_slice(symbol.name.as_bytes());
            strtab.push(0);

            symdata.extend_from_slice(&name_offset.to_be_bytes());
            symdata.extend_from_slice(&symbol.value.to_be_bytes());
            symdata.extend_from_slice(&0u32.to_be_bytes());
            symdata.push(0x10); // STB_GLOBAL, STT_NOTYPE
            symdata.push(0);
            symdata.extend_from_slice(&symbol.shndx.to_be_bytes());
        }

        let size = symdata.len() as u32;
        self.sections.push(RawSection {
            name: ".symtab".to_string(),
            sh_type: SHT_SYMTAB,
            flags: 0,
            link: strtab_index as u32,
            info: 1,
            addralign: 4,
            entsize: 16,
            size,
            data: symdata,
        });
        let size = strtab.len() as u32;
        self.sections.push(RawSection {
            name: ".strtab".to_string(),
            sh_type: SHT_STRTAB,
            flags: 0,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            size,
            data: strtab,
        });

        symtab_index
    }

    /// Add a RELA section against `target`; entries are
    /// `(offset, symbol index, type, addend)`.
    pub fn add_rela(
        &mut self,
        symtab: u16,
        target: u16,
        entries: &[(u32, u32, u8, i32)],
    ) -> u16 {
        let index = self.sections.len() as u16;
        let mut data = Vec::with_capacity(entries.len() * 12);
        for &(offset, symbol, rel_type, addend) in entries {
            data.extend_from_slice(&offset.to_be_bytes());
            data.extend_from_slice(&((symbol << 8) | rel_type as u32).to_be_bytes());
            data.extend_from_slice(&addend.to_be_bytes());
        }

        let target_name = self.sections[target as usize].name.clone();
        let size = data.len() as u32;
        self.sections.push(RawSection {
            name: format!(".rela{}", target_name),
            sh_type: SHT_RELA,
            flags: 0,
            link: symtab as u32,
            info: target as u32,
            addralign: 4,
            entsize: 12,
            size,
            data,
        });
        index
    }

    pub fn build(&self) -> Vec<u8> {
        let mut sections = self.sections.clone();

        // .shstrtab holds every section name including its own.
        let shstrndx = sections.len() as u16;
        sections.push(RawSection {
            name: ".shstrtab".to_string(),
            sh_type: SHT_STRTAB,
            flags: 0,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            size: 0,
            data: Vec::new(),
        });

        let mut names = vec![0u8];
        let mut name_offsets = Vec::with_capacity(sections.len());
        for section in &sections {
            if section.name.is_empty() {
                name_offsets.push(0);
            } else {
                name_offsets.push(names.len() as u32);
                names.extend_from_slice(section.name.as_bytes());
                names.push(0);
            }
        }
        let last = sections.last_mut().unwrap();
        last.size = names.len() as u32;
        last.data = names;

        let mut out = vec![0u8; 52];
        out[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        out[4] = 1; // ELFCLASS32
        out[5] = 2; // ELFDATA2MSB
        out[6] = 1;
        put_u16(&mut out, 16, 1); // ET_REL
        put_u16(&mut out, 18, EM_PPC);
        put_u32(&mut out, 20, 1);
        put_u16(&mut out, 40, 52);
        put_u16(&mut out, 46, 40);
        put_u16(&mut out, 48, sections.len() as u16);
        put_u16(&mut out, 50, shstrndx);

        let mut offsets = Vec::with_capacity(sections.len());
        for section in &sections {
            if section.data.is_empty() {
                offsets.push(0);
            } else {
                offsets.push(out.len() as u32);
                out.extend_from_slice(&section.data);
            }
        }

        let shoff = out.len() as u32;
        put_u32(&mut out, 32, shoff);
        for (i, section) in sections.iter().enumerate() {
            let mut record = vec![0u8; 40];
            put_u32(&mut record, 0, name_offsets[i]);
            put_u32(&mut record, 4, section.sh_type);
            put_u32(&mut record, 8, section.flags);
            put_u32(&mut record, 16, offsets[i]);
            put_u32(&mut record, 20, section.size);
            put_u32(&mut record, 24, section.link);
            put_u32(&mut record, 28, section.info);
            put_u32(&mut record, 32, section.addralign);
            put_u32(&mut record, 36, section.entsize);
            out.extend_from_slice(&record);
        }

        out
    }
}

/// Parsed REL header; version 2/3 trailing fields are zero when absent.
pub struct RelHeader {
    pub id: u32,
    pub section_count: u32,
    pub section_info_offset: u32,
    pub version: u32,
    pub total_bss_size: u32,
    pub relocation_offset: u32,
    pub import_info_offset: u32,
    pub import_info_size: u32,
    pub prolog_section: u8,
    pub epilog_section: u8,
    pub unresolved_section: u8,
    pub prolog_offset: u32,
    pub epilog_offset: u32,
    pub unresolved_offset: u32,
    pub max_align: u32,
    pub max_bss_align: u32,
    pub fixed_data_size: u32,
}

pub fn read_header(data: &[u8]) -> RelHeader {
    let version = be32(data, 0x1C);
    RelHeader {
        id: be32(data, 0x00),
        section_count: be32(data, 0x0C),
        section_info_offset: be32(data, 0x10),
        version,
        total_bss_size: be32(data, 0x20),
        relocation_offset: be32(data, 0x24),
        import_info_offset: be32(data, 0x28),
        import_info_size: be32(data, 0x2C),
        prolog_section: data[0x30],
        epilog_section: data[0x31],
        unresolved_section: data[0x32],
        prolog_offset: be32(data, 0x34),
        epilog_offset: be32(data, 0x38),
        unresolved_offset: be32(data, 0x3C),
        max_align: if version >= 2 { be32(data, 0x40) } else { 0 },
        max_bss_align: if version >= 2 { be32(data, 0x44) } else { 0 },
        fixed_data_size: if version >= 3 { be32(data, 0x48) } else { 0 },
    }
}

/// One section-info record `(offset, size)`.
pub fn read_section_info(data: &[u8], header: &RelHeader, section: u32) -> (u32, u32) {
    let at = (header.section_info_offset + section * 8) as usize;
    (be32(data, at), be32(data, at + 4))
}

/// Import-info entries `(module id, relocations offset)`.
pub fn read_imports(data: &[u8], header: &RelHeader) -> Vec<(u32, u32)> {
    let mut imports = Vec::new();
    let mut at = header.import_info_offset as usize;
    let end = at + header.import_info_size as usize;
    while at < end {
        imports.push((be32(data, at), be32(data, at + 4)));
        at += 8;
    }
    imports
}

/// One relocation command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub offset: u16,
    pub rel_type: u8,
    pub section: u8,
    pub addend: u32,
}

/// Read the command stream from `relocation_offset` to the end of the image.
pub fn read_commands(data: &[u8], header: &RelHeader) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut at = header.relocation_offset as usize;
    while at + 8 <= data.len() {
        commands.push(Command {
            offset: be16(data, at),
            rel_type: data[at + 2],
            section: data[at + 3],
            addend: be32(data, at + 4),
        });
        at += 8;
    }
    commands
}
