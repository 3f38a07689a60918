//! Relocation command stream encoding.
//!
//! The stream is a sequence of 8-byte commands
//! `(offset: u16, type: u8, section: u8, addend: u32)` grouped per target
//! module. Three synthetic types steer the loader: `R_DOLPHIN_SECTION`
//! selects the source section, `R_DOLPHIN_NOP` skips forward when a gap
//! exceeds the 16-bit offset field, and `R_DOLPHIN_END` closes a module's
//! segment.

use elf2rel_elf::{
    R_PPC_ADDR14, R_PPC_ADDR14_BRNTAKEN, R_PPC_ADDR14_BRTAKEN, R_PPC_ADDR16, R_PPC_ADDR16_HA,
    R_PPC_ADDR16_HI, R_PPC_ADDR16_LO, R_PPC_ADDR24, R_PPC_ADDR32, R_PPC_NONE, R_PPC_REL24,
    R_PPC_REL32,
};
use tracing::warn;

use crate::buffer::RelBuffer;
use crate::relocation::{module_delay, Relocation};
use crate::sections::PackedSections;
use crate::{EmitError, Result};

/// Skip `offset` bytes without applying a relocation.
pub const R_DOLPHIN_NOP: u8 = 0xCB;
/// Switch the current source section and reset the offset.
pub const R_DOLPHIN_SECTION: u8 = 0xCC;
/// Terminate the current module's relocations.
pub const R_DOLPHIN_END: u8 = 0xCD;

/// Displacement field of a REL24 branch instruction.
const REL24_DISPLACEMENT_MASK: u32 = 0x03FF_FFFC;

/// Offsets and sizes produced by stream emission, needed by the header.
#[derive(Clone, Copy, Debug)]
pub struct RelocationLayout {
    pub import_info_offset: u32,
    pub import_info_size: u32,
    pub relocation_offset: u32,
    /// Length of the leading stream region holding only relocations against
    /// non-trimmable modules; OSLinkFixed discards everything after it.
    pub fixed_relocations_size: u32,
}

/// Emit the import-info table and relocation command stream.
///
/// `relocations` must already be in command-stream order (see
/// [`crate::sort_relocations`]). Intra-module REL24/REL32 entries are
/// resolved by patching the packed section bytes and emit no command.
pub fn write_relocations(
    buffer: &mut RelBuffer,
    relocations: &[Relocation],
    packed: &PackedSections,
    this_module: u32,
) -> Result<RelocationLayout> {
    // Reserve one zeroed import record per distinct target module among the
    // relocations that survive early resolution.
    buffer.align_to(8);
    let import_info_offset = buffer.len();
    buffer.write_zeros(import_count(relocations, this_module) * 8);
    let relocation_offset = buffer.len();

    let mut imports = RelBuffer::new();
    let mut current_module: Option<u32> = None;
    let mut current_section: Option<u32> = None;
    let mut current_offset = 0u32;
    let mut fixed_relocations_size = 0;

    for relocation in relocations {
        if resolves_early(relocation, this_module) {
            patch_resolved(buffer, relocation, packed)?;
            continue;
        }

        if current_module != Some(relocation.module_id) {
            if current_module.is_some() {
                write_command(buffer, 0, R_DOLPHIN_END, 0, 0);
            }

            // Crossing from non-trimmable to trimmable modules marks the end
            // of the relocations OSLinkFixed must keep.
            let current_delay = current_module.map_or(0, |id| module_delay(id, this_module));
            if module_delay(relocation.module_id, this_module) > current_delay {
                fixed_relocations_size = buffer.len() - relocation_offset;
            }

            current_module = Some(relocation.module_id);
            current_section = None;
            imports.write_u32(relocation.module_id);
            imports.write_u32(buffer.len());
        }

        if current_section != Some(relocation.source_section) {
            current_section = Some(relocation.source_section);
            current_offset = 0;
            write_command(
                buffer,
                0,
                R_DOLPHIN_SECTION,
                relocation.source_section as u8,
                0,
            );
        }

        let mut delta = relocation.source_offset - current_offset;
        while delta > 0xFFFF {
            write_command(buffer, 0xFFFF, R_DOLPHIN_NOP, 0, 0);
            delta -= 0xFFFF;
        }

        // OSLink may still know what to do with an unknown type, so emit it
        // anyway after reporting.
        if !is_supported_type(relocation.rel_type) {
            warn!(rel_type = relocation.rel_type, "unsupported relocation type");
        }

        write_command(
            buffer,
            delta as u16,
            relocation.rel_type,
            relocation.target_section,
            relocation.addend,
        );
        current_offset = relocation.source_offset;
    }

    write_command(buffer, 0, R_DOLPHIN_END, 0, 0);

    // A stream ending on a non-trimmable module keeps everything fixed.
    if current_module.map_or(0, |id| module_delay(id, this_module)) == 0 {
        fixed_relocations_size = buffer.len() - relocation_offset;
    }

    let import_info_size = imports.len();
    buffer.patch(import_info_offset, imports.as_bytes());

    Ok(RelocationLayout {
        import_info_offset,
        import_info_size,
        relocation_offset,
        fixed_relocations_size,
    })
}

fn write_command(buffer: &mut RelBuffer, offset: u16, rel_type: u8, section: u8, addend: u32) {
    buffer.write_u16(offset);
    buffer.write_u8(rel_type);
    buffer.write_u8(section);
    buffer.write_u32(addend);
}

/// Intra-module PC-relative relocations are applied at link time.
fn resolves_early(relocation: &Relocation, this_module: u32) -> bool {
    relocation.module_id == this_module
        && (relocation.rel_type == R_PPC_REL24 || relocation.rel_type == R_PPC_REL32)
}

/// Count distinct target modules among the relocations that will be emitted.
fn import_count(relocations: &[Relocation], this_module: u32) -> u32 {
    let mut count = 0;
    let mut last_module = None;
    for relocation in relocations {
        if resolves_early(relocation, this_module) {
            continue;
        }
        if last_module != Some(relocation.module_id) {
            last_module = Some(relocation.module_id);
            count += 1;
        }
    }
    count
}

/// Patch an intra-module REL24/REL32 site directly in the packed bytes.
fn patch_resolved(
    buffer: &mut RelBuffer,
    relocation: &Relocation,
    packed: &PackedSections,
) -> Result<()> {
    let source_base =
        packed
            .offset_of(relocation.source_section)
            .ok_or(EmitError::UnmappedSection {
                index: relocation.source_section,
            })?;
    let target_base = packed
        .offset_of(relocation.target_section as u32)
        .ok_or(EmitError::UnmappedSection {
            index: relocation.target_section as u32,
        })?;

    let source = source_base + relocation.source_offset;
    let delta = target_base
        .wrapping_add(relocation.addend)
        .wrapping_sub(source);

    let word = buffer.read_u32(source);
    let patched = if relocation.rel_type == R_PPC_REL24 {
        (word & !REL24_DISPLACEMENT_MASK) | (delta & REL24_DISPLACEMENT_MASK)
    } else {
        delta
    };
    buffer.patch_u32(source, patched);

    Ok(())
}

/// Types OSLink applies at runtime.
const fn is_supported_type(rel_type: u8) -> bool {
    matches!(
        rel_type,
        R_PPC_NONE
            | R_PPC_ADDR32
            | R_PPC_ADDR24
            | R_PPC_ADDR16
            | R_PPC_ADDR16_LO
            | R_PPC_ADDR16_HI
            | R_PPC_ADDR16_HA
            | R_PPC_ADDR14
            | R_PPC_ADDR14_BRTAKEN
            | R_PPC_ADDR14_BRNTAKEN
            | R_PPC_REL24
            | R_DOLPHIN_NOP
            | R_DOLPHIN_SECTION
            | R_DOLPHIN_END
    )
}
