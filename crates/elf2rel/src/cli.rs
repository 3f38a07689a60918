//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::Parser;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "elf2rel")]
#[command(about = "Converts PowerPC ELF objects to REL runtime-linkable modules")]
#[command(version)]
pub struct Cli {
    /// Input ELF file
    #[arg(short = 'i', long = "input-file", value_name = "ELF")]
    pub input_file: Option<PathBuf>,

    /// Input ELF file (positional form)
    #[arg(value_name = "ELF", conflicts_with = "input_file")]
    pub input: Option<PathBuf>,

    /// Input symbol file(s)
    #[arg(
        short = 's',
        long = "symbol-file",
        value_name = "MAP",
        required = true,
        num_args = 1..
    )]
    pub symbol_files: Vec<PathBuf>,

    /// Output REL file (default: input with .rel extension)
    #[arg(short = 'o', long = "output-file", value_name = "REL")]
    pub output_file: Option<PathBuf>,

    /// REL module id (decimal or 0x hex)
    #[arg(long = "rel-id", default_value = "0x1000", value_parser = parse_module_id)]
    pub rel_id: u32,

    /// REL file format version (1, 2, 3)
    #[arg(
        long = "rel-version",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..=3)
    )]
    pub rel_version: u32,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The input path, from either the flag or the positional argument.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input_file.as_ref().or(self.input.as_ref())
    }
}

/// Parse a module id, accepting decimal or 0x-prefixed hex.
fn parse_module_id(arg: &str) -> Result<u32, String> {
    let arg = arg.trim();
    if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex module id: {}", e))
    } else {
        arg.parse()
            .map_err(|e| format!("invalid module id: {}", e))
    }
}
