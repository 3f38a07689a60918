//! External symbol map loading.
//!
//! Symbol files are line-oriented text:
//!
//! ```text
//! // dol symbols: addr:name
//! 80001234:OSReport
//! // rel symbols: module,section,offset:name
//! 0x10,1,0x40:some_rel_export
//! ```
//!
//! `module` and `section` accept decimal, `0x` hex, and `0` octal;
//! addresses and offsets are always hex.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::Result;

/// Where an externally defined symbol lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolLocation {
    /// 0 means the dol.
    pub module_id: u32,
    /// Section index within the target module; OSLink ignores it for the dol.
    pub target_section: u32,
    pub addr: u32,
}

/// Mapping from symbol name to its location in another module.
#[derive(Clone, Debug, Default)]
pub struct SymbolMap {
    entries: HashMap<String, SymbolLocation>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single symbol file's contents.
    ///
    /// Malformed lines are reported and skipped; within one file a later
    /// entry overwrites an earlier one of the same name.
    pub fn parse(text: &str) -> Self {
        let mut map = Self::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            match parse_line(line) {
                Some((name, location)) => {
                    map.entries.insert(name, location);
                }
                None => warn!(line = %line, "invalid symbol"),
            }
        }
        map
    }

    /// Load one symbol file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Load and merge several symbol files in order.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = Self::new();
        for path in paths {
            merged.merge(Self::load(path.as_ref())?);
        }
        Ok(merged)
    }

    /// Merge another map in; names already present are retained.
    pub fn merge(&mut self, other: SymbolMap) {
        for (name, location) in other.entries {
            self.entries.entry(name).or_insert(location);
        }
    }

    pub fn get(&self, name: &str) -> Option<SymbolLocation> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one `location:name` line.
fn parse_line(line: &str) -> Option<(String, SymbolLocation)> {
    let (location, name) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let fields: Vec<&str> = location.split(',').collect();
    let location = match fields.as_slice() {
        [addr] => SymbolLocation {
            module_id: 0,
            target_section: 0,
            addr: parse_hex(addr)?,
        },
        [module, section, addr] => SymbolLocation {
            module_id: parse_auto(module)?,
            target_section: parse_auto(section)?,
            addr: parse_hex(addr)?,
        },
        _ => return None,
    };

    Some((name.to_string(), location))
}

/// Parse a hex integer with optional `0x` prefix.
fn parse_hex(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

/// Parse an integer with C-style base detection: `0x` hex, `0` octal,
/// decimal otherwise.
fn parse_auto(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(digits, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u32::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}
