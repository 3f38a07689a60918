//! elf2rel - PowerPC ELF to REL converter
//!
//! Converts relocatable ELF objects built for the GameCube/Wii into REL
//! runtime-linkable modules consumed by the OSLink loader.
//!
//! # Example
//!
//! ```ignore
//! use elf2rel::ConvertOptions;
//!
//! let options = ConvertOptions::new("module.elf")
//!     .with_symbol_file("main.map")
//!     .with_module_id(0x100);
//! let rel_path = elf2rel::convert(&options)?;
//! ```

// Re-export from sub-crates
pub use elf2rel_elf::{ElfError, ElfFile};
pub use elf2rel_emit::{
    EmitError, ModuleHeader, RelWriter, Relocation, SymbolLocation, SymbolMap,
};

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

/// Converter errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("ELF error: {0}")]
    Elf(#[from] ElfError),
    #[error("REL emission error: {0}")]
    Emit(#[from] EmitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Conversion options.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    input: PathBuf,
    symbol_files: Vec<PathBuf>,
    output: Option<PathBuf>,
    module_id: u32,
    version: u32,
}

impl ConvertOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            symbol_files: Vec::new(),
            output: None,
            module_id: 0x1000,
            version: 3,
        }
    }

    pub fn with_symbol_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.symbol_files.push(path.into());
        self
    }

    /// Output path; defaults to the input with a `.rel` extension.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_module_id(mut self, module_id: u32) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// The REL path the conversion will write to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("rel"))
    }
}

/// Convert an ELF object to a REL module, returning the output path.
pub fn convert(options: &ConvertOptions) -> Result<PathBuf> {
    let data = std::fs::read(&options.input)?;
    let elf = ElfFile::parse(&data)?;
    if elf.machine != elf2rel_elf::EM_PPC {
        warn!(machine = elf.machine, "input is not a PowerPC object");
    }

    let symbol_map = SymbolMap::load_files(&options.symbol_files)?;
    debug!(symbols = symbol_map.len(), "external symbol map loaded");

    let writer = RelWriter::new(&elf, &symbol_map, options.module_id, options.version)?;
    let image = writer.write()?;

    let output = options.output_path();
    std::fs::write(&output, &image)?;

    Ok(output)
}
