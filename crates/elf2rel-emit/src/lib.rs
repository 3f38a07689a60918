//! REL module emission.
//!
//! Builds the runtime-linkable module image consumed by the OSLink loader:
//! packed sections, import table, relocation command stream, and the
//! versioned module header.

mod buffer;
mod emitter;
mod header;
mod relocation;
mod sections;
mod stream;
mod symbol_map;

pub use buffer::*;
pub use emitter::*;
pub use header::*;
pub use relocation::*;
pub use sections::*;
pub use stream::*;
pub use symbol_map::*;

use thiserror::Error;

/// REL emission errors.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported REL version: {0}")]
    UnsupportedVersion(u32),
    #[error("Relocation references symbol {index} missing from the symbol table")]
    SymbolLookup { index: u32 },
    #[error("Relocation against section {index} with no data in the output image")]
    UnmappedSection { index: u32 },
}

pub type Result<T> = std::result::Result<T, EmitError>;
