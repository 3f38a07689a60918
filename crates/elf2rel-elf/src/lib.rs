//! ELF parser for PowerPC relocatable objects.

mod constants;
mod file;
mod header;

pub use constants::*;
pub use file::*;
pub use header::*;

use thiserror::Error;

/// ELF parsing errors.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("ELF data too small")]
    TooSmall,
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("Only big-endian ELF supported")]
    NotBigEndian,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Section header out of bounds")]
    SectionOutOfBounds,
    #[error("Section data extends beyond file")]
    SectionBeyondFile,
    #[error("Symbol table entry out of bounds")]
    SymbolOutOfBounds,
    #[error("Relocation entry out of bounds")]
    RelocationOutOfBounds,
}

pub type Result<T> = std::result::Result<T, ElfError>;
