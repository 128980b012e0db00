//! Register save/restore sequencing.
//!
//! `sregs.save` and `sregs.load` walk the whole vector register file, then
//! the profile's reserved registers, through a pointer loaded from the
//! context block's `REGS` slot into the family scratch register (`eax/rax`
//! on x86, `r4` on Power). The scratch register is clobbered.
//!
//! Save and load visit exactly the same addresses in the same order; only
//! the direction of each transfer differs.

use alloc::vec::Vec;

use crate::error::EncodeError;
use crate::ir::VReg;
use crate::profile::{ProfileDesc, ReservedRole};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Registers to memory.
    Save,
    /// Memory to registers.
    Load,
}

/// One register's place in the save area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSlot {
    /// Physical register number.
    pub phys: u8,
    /// Byte offset from the start of the save area.
    pub offset: i64,
    /// Bytes transferred.
    pub bytes: i64,
    /// Set for profile-internal registers.
    pub reserved: Option<ReservedRole>,
}

/// The save-area layout of a profile.
///
/// Logical registers come first at a stride of one logical register
/// (`desc.stride()`); on pair profiles the low half precedes the high half
/// inside each stride. Reserved registers follow at native width.
pub fn layout(desc: &ProfileDesc) -> Vec<SaveSlot> {
    let native = i64::from(desc.native_bits / 8);
    let halves = if desc.is_paired() { 2 } else { 1 };
    let mut out = Vec::with_capacity(desc.regs.count as usize * halves + desc.regs.reserved.len());
    let mut offset = 0;

    for n in 0..desc.regs.count {
        // ids below `count` always map
        let Ok(pair) = desc.regs.pair(VReg(n), desc.id) else {
            continue;
        };
        for h in 0..halves {
            out.push(SaveSlot {
                phys: pair.half(h),
                offset,
                bytes: native,
                reserved: None,
            });
            offset += native;
        }
    }
    for r in desc.regs.reserved {
        out.push(SaveSlot {
            phys: r.phys,
            offset,
            bytes: native,
            reserved: Some(r.role),
        });
        offset += native;
    }
    out
}

/// Total save-area size in bytes.
pub fn area_size(desc: &ProfileDesc) -> i64 {
    layout(desc).iter().map(|s| s.bytes).sum()
}

/// Family primitives the sequencer drives.
pub(crate) trait Spill {
    /// Load the save-area pointer from `[context + REGS]` into the scratch register.
    fn load_area_pointer(&mut self) -> Result<(), EncodeError>;

    /// Move one physical register to or from `[scratch]`.
    fn transfer(&mut self, dir: Direction, phys: u8) -> Result<(), EncodeError>;

    /// Add `bytes` to the scratch register.
    fn advance(&mut self, bytes: i64) -> Result<(), EncodeError>;
}

/// Emit the full save or load sequence.
pub(crate) fn emit<S: Spill>(spill: &mut S, desc: &ProfileDesc, dir: Direction) -> Result<(), EncodeError> {
    let slots = layout(desc);
    log::debug!(
        "{}: {:?} {} register slots ({} bytes)",
        desc.id,
        dir,
        slots.len(),
        slots.iter().map(|s| s.bytes).sum::<i64>()
    );
    spill.load_area_pointer()?;
    let mut at = 0;
    for slot in &slots {
        if slot.offset != at {
            spill.advance(slot.offset - at)?;
            at = slot.offset;
        }
        spill.transfer(dir, slot.phys)?;
    }
    Ok(())
}
