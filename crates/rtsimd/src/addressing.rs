//! Addressing-mode resolution.
//!
//! Turns `[base + disp]` into what a profile needs to reach it: on x86 a
//! ModR/M displacement of the right size, on Power an address computed into
//! a dedicated scratch register (`TP`) by zero to three instructions ahead
//! of the indexed VSX access.
//!
//! The mode is a function of the displacement and the family alone. A
//! displacement exactly at a limit takes the larger form.

use crate::error::EncodeError;
use crate::ir::{AddrMode, MemoryOperand};
use crate::profile::{IsaFamily, ProfileDesc};

/// x86: displacements with `|disp|` below this use disp8.
pub const X86_INLINE_LIMIT: i64 = 0x80;

/// Power: displacements below this are folded into one `addi`.
pub const POWER_INLINE_LIMIT: i64 = 0x7FF0;
/// Power: displacements below this need only the low half materialized.
pub const POWER_INDEXED16_LIMIT: i64 = 0x1_0000;
/// Power: largest displacement the two-immediate form carries.
pub const POWER_MAX_DISP: i64 = 0x7FFF_FFF0;

/// Power GPR holding the computed address (`TP`).
pub const POWER_TP: u8 = 27;
/// Power GPR holding a materialized displacement (`TD`).
pub const POWER_TD: u8 = 26;

const ADDI: u32 = 0x3800_0000;
const ORI: u32 = 0x6000_0000;
const ORIS: u32 = 0x6400_0000;
const ADD: u32 = 0x7C00_0214;

/// Displacement range a family can encode at all.
pub const fn capacity(family: IsaFamily) -> (i64, i64) {
    match family {
        IsaFamily::X86 | IsaFamily::X86_64 => (i32::MIN as i64, i32::MAX as i64),
        IsaFamily::Power32 | IsaFamily::Power64 => (0, POWER_MAX_DISP),
    }
}

/// Mode tag for a displacement. Out-of-range values still get the widest
/// tag; [`resolve`] is the one that rejects them.
pub const fn classify(family: IsaFamily, disp: i64) -> AddrMode {
    match family {
        IsaFamily::X86 | IsaFamily::X86_64 => {
            if disp > -X86_INLINE_LIMIT && disp < X86_INLINE_LIMIT {
                AddrMode::Inline
            } else {
                AddrMode::Wide
            }
        }
        IsaFamily::Power32 | IsaFamily::Power64 => {
            if disp < POWER_INLINE_LIMIT {
                AddrMode::Inline
            } else if disp < POWER_INDEXED16_LIMIT {
                AddrMode::Indexed16
            } else {
                AddrMode::Indexed32
            }
        }
    }
}

/// A memory operand resolved for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Chosen form.
    pub mode: AddrMode,
    /// Physical base register number.
    pub base: u8,
    /// Displacement, known to fit the form.
    pub disp: i64,
    prelude: [u32; 3],
    prelude_len: u8,
}

impl ResolvedAddress {
    /// Power instructions that compute the address into `TP`, in order.
    /// Empty on x86.
    pub fn prelude(&self) -> &[u32] {
        &self.prelude[..self.prelude_len as usize]
    }

    /// The x86 displacement as carried in the instruction.
    pub fn disp32(&self) -> i32 {
        self.disp as i32
    }

    fn push(&mut self, word: u32) {
        if let Some(slot) = self.prelude.get_mut(self.prelude_len as usize) {
            *slot = word;
            self.prelude_len += 1;
        }
    }
}

/// Resolve `mem` for the profile described by `desc`.
///
/// # Errors
///
/// - [`EncodeError::BaseRegisterOutOfRange`] for a base the family cannot encode.
/// - [`EncodeError::MisalignedDisplacement`] when the profile requires
///   SIMD-aligned displacements and `disp` is not.
/// - [`EncodeError::DisplacementOutOfRange`] beyond the extended form.
pub fn resolve(desc: &ProfileDesc, mem: &MemoryOperand) -> Result<ResolvedAddress, EncodeError> {
    let base = mem.base.num();
    let limit = desc.family.gpr_count();
    if base >= limit {
        return Err(EncodeError::BaseRegisterOutOfRange {
            reg: base,
            limit,
            profile: desc.id,
        });
    }

    let disp = mem.disp;
    let (min, max) = capacity(desc.family);
    if disp < min || disp > max {
        return Err(EncodeError::DisplacementOutOfRange {
            disp,
            min,
            max,
            profile: desc.id,
        });
    }
    if desc.align > 1 && disp % i64::from(desc.align) != 0 {
        return Err(EncodeError::MisalignedDisplacement {
            disp,
            align: desc.align,
            profile: desc.id,
        });
    }

    let mode = classify(desc.family, disp);
    let mut out = ResolvedAddress {
        mode,
        base,
        disp,
        prelude: [0; 3],
        prelude_len: 0,
    };

    if !desc.family.is_x86() {
        let lo = (disp & 0xFFF0) as u16;
        match mode {
            AddrMode::Inline => {
                out.push(ADDI | (u32::from(POWER_TP) << 21) | (u32::from(base) << 16) | u32::from(lo));
            }
            AddrMode::Indexed16 => {
                out.push(ORI | (u32::from(POWER_TD) << 16) | u32::from(lo));
                out.push(ADD | (u32::from(POWER_TP) << 21) | (u32::from(base) << 16) | (u32::from(POWER_TD) << 11));
            }
            AddrMode::Indexed32 | AddrMode::Wide => {
                let hi = ((disp >> 16) & 0x7FFF) as u16;
                out.push(ORIS | (u32::from(POWER_TD) << 16) | u32::from(hi));
                out.push(ORI | (u32::from(POWER_TD) << 21) | (u32::from(POWER_TD) << 16) | u32::from(lo));
                out.push(ADD | (u32::from(POWER_TP) << 21) | (u32::from(base) << 16) | (u32::from(POWER_TD) << 11));
            }
        }
    }

    Ok(out)
}
