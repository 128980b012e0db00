//! Encoding profiles: {ISA family, extension level, vector width, element width}.
//!
//! A profile is a zero-sized marker type implementing [`Profile`]. Everything
//! the back ends need to know about it lives in the associated
//! [`ProfileDesc`] constant, so rule selection is resolved by
//! monomorphization and the `if P::DESC.ext == ...` branches fold away.

use alloc::string::{String, ToString};
use core::fmt;

use crate::encoder::CodeBuffer;
use crate::error::EncodeError;
use crate::ir::{GpReg, MemoryOperand, PseudoOp, VReg, WideRegisterPair};

// ─── Tuple components ───────────────────────────────────────────────────────

/// Instruction-set family and address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsaFamily {
    /// 32-bit x86.
    X86,
    /// x86-64.
    X86_64,
    /// 32-bit Power.
    Power32,
    /// 64-bit Power.
    Power64,
}

impl IsaFamily {
    /// `true` for both x86 address widths.
    pub const fn is_x86(self) -> bool {
        matches!(self, IsaFamily::X86 | IsaFamily::X86_64)
    }

    /// Number of general-purpose registers usable as an address base.
    pub const fn gpr_count(self) -> u8 {
        match self {
            IsaFamily::X86 => 8,
            IsaFamily::X86_64 => 16,
            IsaFamily::Power32 | IsaFamily::Power64 => 32,
        }
    }
}

impl fmt::Display for IsaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsaFamily::X86 => "x86",
            IsaFamily::X86_64 => "x64",
            IsaFamily::Power32 => "p32",
            IsaFamily::Power64 => "p64",
        })
    }
}

/// Extension level within a family.
///
/// `V1` is AVX1 / VSX1 (POWER7), `V2` is AVX2+FMA3 / VSX2 (POWER8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtLevel {
    V1,
    V2,
}

impl ExtLevel {
    /// Family-specific name, e.g. `avx2` or `vsx1`.
    pub const fn name_for(self, family: IsaFamily) -> &'static str {
        match (family.is_x86(), self) {
            (true, ExtLevel::V1) => "avx1",
            (true, ExtLevel::V2) => "avx2",
            (false, ExtLevel::V1) => "vsx1",
            (false, ExtLevel::V2) => "vsx2",
        }
    }
}

/// Floating-point element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElemWidth {
    W32,
    W64,
}

impl ElemWidth {
    /// Element size in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            ElemWidth::W32 => 4,
            ElemWidth::W64 => 8,
        }
    }

    /// Element size in bits.
    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

impl fmt::Display for ElemWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElemWidth::W32 => "f32",
            ElemWidth::W64 => "f64",
        })
    }
}

// ─── Reserved registers & context block ─────────────────────────────────────

/// What a reserved vector register holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReservedRole {
    /// Rounding-mode image preserved across context switches.
    RoundingMode,
    /// Sign-bit splat.
    SignMask,
    /// All-ones splat (the QNAN pattern), compare target for mask tests.
    AllOnes,
    /// `+1.0` splat.
    PlusOne,
    /// `-0.5` splat.
    MinusHalf,
    /// Refinement temporary.
    Scratch,
    /// Staging register for memory operands.
    MemTemp,
}

/// A physical vector register a profile keeps for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRegister {
    /// Physical register number (VSR number on Power).
    pub phys: u8,
    /// Contents.
    pub role: ReservedRole,
    /// Context slot `enter` loads it from, if any.
    pub init: Option<ContextSlot>,
}

/// Named slots of the context block addressed off the profile's context register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextSlot {
    /// Four 32-bit MXCSR images for N, M, P, Z rounding.
    Fctrl,
    /// 8-byte scalar scratch.
    Scr00,
    /// Pointer to the register save area.
    Regs,
    /// `+1.0` splat.
    Gpc01,
    /// `-0.5` splat.
    Gpc02,
    /// `+3.0` splat.
    Gpc03,
    /// Sign-mask splat.
    Gpc04,
    /// All-ones splat.
    Gpc05,
    /// Vector scratch.
    Scr01,
    /// Vector scratch.
    Scr02,
}

impl ContextSlot {
    /// All slots in layout order.
    pub const ALL: [ContextSlot; 10] = [
        ContextSlot::Fctrl,
        ContextSlot::Scr00,
        ContextSlot::Regs,
        ContextSlot::Gpc01,
        ContextSlot::Gpc02,
        ContextSlot::Gpc03,
        ContextSlot::Gpc04,
        ContextSlot::Gpc05,
        ContextSlot::Scr01,
        ContextSlot::Scr02,
    ];

    /// Byte offset from the context register.
    pub const fn offset(self) -> i64 {
        match self {
            ContextSlot::Fctrl => 0x000,
            ContextSlot::Scr00 => 0x010,
            ContextSlot::Regs => 0x018,
            ContextSlot::Gpc01 => 0x020,
            ContextSlot::Gpc02 => 0x040,
            ContextSlot::Gpc03 => 0x060,
            ContextSlot::Gpc04 => 0x080,
            ContextSlot::Gpc05 => 0x0A0,
            ContextSlot::Scr01 => 0x0C0,
            ContextSlot::Scr02 => 0x0E0,
        }
    }

    /// Upper-case listing name (`SCR01`, `GPC04`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            ContextSlot::Fctrl => "FCTRL",
            ContextSlot::Scr00 => "SCR00",
            ContextSlot::Regs => "REGS",
            ContextSlot::Gpc01 => "GPC01",
            ContextSlot::Gpc02 => "GPC02",
            ContextSlot::Gpc03 => "GPC03",
            ContextSlot::Gpc04 => "GPC04",
            ContextSlot::Gpc05 => "GPC05",
            ContextSlot::Scr01 => "SCR01",
            ContextSlot::Scr02 => "SCR02",
        }
    }

    /// Case-insensitive lookup by listing name.
    pub fn from_name(name: &str) -> Option<ContextSlot> {
        ContextSlot::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

// ─── Register files ─────────────────────────────────────────────────────────

/// Logical → physical register mapping of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    /// Number of logical registers.
    pub count: u8,
    /// Physical number of logical register 0.
    pub base: u8,
    /// Distance from a low half to its high half, for pair profiles.
    pub high_offset: Option<u8>,
    /// Profile-internal registers, in save/restore order.
    pub reserved: &'static [ReservedRegister],
}

const NO_RESERVED: &[ReservedRegister] = &[];

const fn vr(n: u8) -> u8 {
    32 + n
}

const P64_RESERVED: &[ReservedRegister] = &[
    ReservedRegister { phys: vr(23), role: ReservedRole::RoundingMode, init: None },
    ReservedRegister { phys: vr(24), role: ReservedRole::SignMask, init: Some(ContextSlot::Gpc04) },
    ReservedRegister { phys: vr(25), role: ReservedRole::AllOnes, init: Some(ContextSlot::Gpc05) },
    ReservedRegister { phys: vr(26), role: ReservedRole::PlusOne, init: Some(ContextSlot::Gpc01) },
    ReservedRegister { phys: vr(27), role: ReservedRole::MinusHalf, init: Some(ContextSlot::Gpc02) },
    ReservedRegister { phys: vr(28), role: ReservedRole::Scratch, init: None },
    ReservedRegister { phys: vr(29), role: ReservedRole::Scratch, init: None },
    ReservedRegister { phys: vr(30), role: ReservedRole::Scratch, init: None },
    ReservedRegister { phys: vr(31), role: ReservedRole::MemTemp, init: None },
];

const PAIR_RESERVED: &[ReservedRegister] = &[
    ReservedRegister { phys: vr(14), role: ReservedRole::PlusOne, init: Some(ContextSlot::Gpc01) },
    ReservedRegister { phys: vr(15), role: ReservedRole::AllOnes, init: Some(ContextSlot::Gpc05) },
    // FPR-bank VSRs used by the refinement shims
    ReservedRegister { phys: 15, role: ReservedRole::Scratch, init: None },
    ReservedRegister { phys: 31, role: ReservedRole::Scratch, init: None },
    ReservedRegister { phys: vr(30), role: ReservedRole::MinusHalf, init: Some(ContextSlot::Gpc02) },
    ReservedRegister { phys: vr(31), role: ReservedRole::MemTemp, init: None },
];

impl RegisterFile {
    /// Physical register for a logical id on single-register profiles.
    pub fn phys(&self, reg: VReg, profile: ProfileId) -> Result<u8, EncodeError> {
        self.check(reg, profile)?;
        Ok(self.base + reg.id())
    }

    /// Both halves of a logical register on pair profiles.
    ///
    /// Single-register profiles report the same physical register twice.
    pub fn pair(&self, reg: VReg, profile: ProfileId) -> Result<WideRegisterPair, EncodeError> {
        let low = self.phys(reg, profile)?;
        let high = low + self.high_offset.unwrap_or(0);
        Ok(WideRegisterPair::new(reg, low, high))
    }

    /// Reject ids outside the register file.
    pub fn check(&self, reg: VReg, profile: ProfileId) -> Result<(), EncodeError> {
        if reg.id() >= self.count {
            return Err(EncodeError::RegisterOutOfRange {
                reg: reg.id(),
                limit: self.count,
                profile,
            });
        }
        Ok(())
    }

    /// First reserved register with the given role.
    pub fn reserved(&self, role: ReservedRole) -> Option<u8> {
        self.reserved.iter().find(|r| r.role == role).map(|r| r.phys)
    }
}

// ─── Profile descriptor ─────────────────────────────────────────────────────

/// Static description of one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileDesc {
    pub id: ProfileId,
    pub family: IsaFamily,
    pub ext: ExtLevel,
    /// Logical vector width in bits.
    pub bits: u32,
    /// Native vector register width in bits.
    pub native_bits: u32,
    pub elem: ElemWidth,
    pub regs: RegisterFile,
    /// Base register of the context block.
    pub context: GpReg,
    /// Family scratch clobbered by save/restore and mask tests.
    pub scratch: GpReg,
    /// Required alignment of vector memory displacements.
    pub align: u32,
}

impl ProfileDesc {
    /// `true` when logical registers are realised as [`WideRegisterPair`]s.
    pub const fn is_paired(&self) -> bool {
        self.native_bits < self.bits
    }

    /// Save/restore stride: one logical register in bytes.
    pub const fn stride(&self) -> i64 {
        (self.bits / 8) as i64
    }

    /// Lanes per logical register.
    pub const fn lanes(&self) -> u32 {
        self.bits / self.elem.bits()
    }

    /// `[context + slot]`.
    pub const fn ctx(&self, slot: ContextSlot) -> MemoryOperand {
        MemoryOperand::new(self.context, slot.offset())
    }
}

// ─── Profile ids & runtime resolution ───────────────────────────────────────

/// Runtime name of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProfileId {
    X86Avx1F32,
    X86Avx2F32,
    X64Avx1F32,
    X64Avx2F32,
    X64Avx1F64,
    X64Avx2F64,
    P64Vsx1F64,
    P64Vsx2F64,
    P32Vsx1F32x2,
    P32Vsx2F32x2,
}

impl ProfileId {
    /// Every profile, enabled or not.
    pub const ALL: [ProfileId; 10] = [
        ProfileId::X86Avx1F32,
        ProfileId::X86Avx2F32,
        ProfileId::X64Avx1F32,
        ProfileId::X64Avx2F32,
        ProfileId::X64Avx1F64,
        ProfileId::X64Avx2F64,
        ProfileId::P64Vsx1F64,
        ProfileId::P64Vsx2F64,
        ProfileId::P32Vsx1F32x2,
        ProfileId::P32Vsx2F32x2,
    ];

    /// Listing name, e.g. `x64-avx2-f32`.
    pub const fn name(self) -> &'static str {
        match self {
            ProfileId::X86Avx1F32 => "x86-avx1-f32",
            ProfileId::X86Avx2F32 => "x86-avx2-f32",
            ProfileId::X64Avx1F32 => "x64-avx1-f32",
            ProfileId::X64Avx2F32 => "x64-avx2-f32",
            ProfileId::X64Avx1F64 => "x64-avx1-f64",
            ProfileId::X64Avx2F64 => "x64-avx2-f64",
            ProfileId::P64Vsx1F64 => "p64-vsx1-f64",
            ProfileId::P64Vsx2F64 => "p64-vsx2-f64",
            ProfileId::P32Vsx1F32x2 => "p32-vsx1-f32x2",
            ProfileId::P32Vsx2F32x2 => "p32-vsx2-f32x2",
        }
    }

    /// Lookup by listing name (case-insensitive). Also accepts the
    /// underscore spelling used for Rust identifiers (`x64_avx2_f32`).
    pub fn from_name(name: &str) -> Option<ProfileId> {
        ProfileId::ALL.iter().copied().find(|id| {
            let canon = id.name();
            canon.len() == name.len()
                && canon
                    .bytes()
                    .zip(name.bytes())
                    .all(|(a, b)| a == b.to_ascii_lowercase() || (a == b'-' && b == b'_'))
        })
    }

    /// Static descriptor.
    pub const fn desc(self) -> &'static ProfileDesc {
        match self {
            ProfileId::X86Avx1F32 => &X86_AVX1_F32,
            ProfileId::X86Avx2F32 => &X86_AVX2_F32,
            ProfileId::X64Avx1F32 => &X64_AVX1_F32,
            ProfileId::X64Avx2F32 => &X64_AVX2_F32,
            ProfileId::X64Avx1F64 => &X64_AVX1_F64,
            ProfileId::X64Avx2F64 => &X64_AVX2_F64,
            ProfileId::P64Vsx1F64 => &P64_VSX1_F64,
            ProfileId::P64Vsx2F64 => &P64_VSX2_F64,
            ProfileId::P32Vsx1F32x2 => &P32_VSX1_F32X2,
            ProfileId::P32Vsx2F32x2 => &P32_VSX2_F32X2,
        }
    }

    /// `true` when the profile's family back end is compiled in.
    pub const fn is_enabled(self) -> bool {
        match self.desc().family {
            IsaFamily::X86 => cfg!(feature = "x86"),
            IsaFamily::X86_64 => cfg!(feature = "x86_64"),
            IsaFamily::Power32 | IsaFamily::Power64 => cfg!(feature = "power"),
        }
    }

    /// The tuple this profile implements.
    pub const fn spec(self) -> ProfileSpec {
        let d = self.desc();
        ProfileSpec {
            family: d.family,
            ext: d.ext,
            bits: d.bits,
            elem: d.elem,
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A requested {family, extension, width, element} tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileSpec {
    pub family: IsaFamily,
    pub ext: ExtLevel,
    /// Logical vector width in bits.
    pub bits: u32,
    pub elem: ElemWidth,
}

impl ProfileSpec {
    /// Find the implemented profile for this tuple.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedProfile`] naming why nothing matches:
    /// a width the family does not implement, an element width the family
    /// does not carry, or a family compiled out of this build.
    pub fn resolve(&self) -> Result<ProfileId, EncodeError> {
        let reject = |reason: &str| EncodeError::UnsupportedProfile {
            family: self.family,
            ext: self.ext,
            bits: self.bits,
            elem: self.elem,
            reason: reason.to_string(),
        };

        let expected_bits = match self.family {
            IsaFamily::Power64 => 128,
            _ => 256,
        };
        if self.bits != expected_bits {
            let reason = match self.family {
                IsaFamily::Power64 => "64-bit Power implements 128-bit vectors only",
                IsaFamily::Power32 => "32-bit Power implements 256-bit vectors as register pairs only",
                _ => "x86 profiles implement 256-bit vectors only",
            };
            return Err(reject(reason));
        }

        let id = match (self.family, self.elem, self.ext) {
            (IsaFamily::X86, ElemWidth::W32, ExtLevel::V1) => ProfileId::X86Avx1F32,
            (IsaFamily::X86, ElemWidth::W32, ExtLevel::V2) => ProfileId::X86Avx2F32,
            (IsaFamily::X86, ElemWidth::W64, _) => {
                return Err(reject("32-bit x86 only carries fp32 elements"))
            }
            (IsaFamily::X86_64, ElemWidth::W32, ExtLevel::V1) => ProfileId::X64Avx1F32,
            (IsaFamily::X86_64, ElemWidth::W32, ExtLevel::V2) => ProfileId::X64Avx2F32,
            (IsaFamily::X86_64, ElemWidth::W64, ExtLevel::V1) => ProfileId::X64Avx1F64,
            (IsaFamily::X86_64, ElemWidth::W64, ExtLevel::V2) => ProfileId::X64Avx2F64,
            (IsaFamily::Power64, ElemWidth::W64, ExtLevel::V1) => ProfileId::P64Vsx1F64,
            (IsaFamily::Power64, ElemWidth::W64, ExtLevel::V2) => ProfileId::P64Vsx2F64,
            (IsaFamily::Power64, ElemWidth::W32, _) => {
                return Err(reject("64-bit Power only carries fp64 elements"))
            }
            (IsaFamily::Power32, ElemWidth::W32, ExtLevel::V1) => ProfileId::P32Vsx1F32x2,
            (IsaFamily::Power32, ElemWidth::W32, ExtLevel::V2) => ProfileId::P32Vsx2F32x2,
            (IsaFamily::Power32, ElemWidth::W64, _) => {
                return Err(reject("32-bit Power only carries fp32 elements"))
            }
        };

        if !id.is_enabled() {
            let mut reason = String::from("family back end not compiled in (enable feature `");
            reason.push_str(match self.family {
                IsaFamily::X86 => "x86",
                IsaFamily::X86_64 => "x86_64",
                IsaFamily::Power32 | IsaFamily::Power64 => "power",
            });
            reason.push_str("`)");
            return Err(reject(&reason));
        }
        Ok(id)
    }
}

// ─── Descriptors ────────────────────────────────────────────────────────────

const fn x86_desc(id: ProfileId, family: IsaFamily, ext: ExtLevel, elem: ElemWidth) -> ProfileDesc {
    let count = match family {
        IsaFamily::X86 => 8,
        _ => 16,
    };
    ProfileDesc {
        id,
        family,
        ext,
        bits: 256,
        native_bits: 256,
        elem,
        regs: RegisterFile {
            count,
            base: 0,
            high_offset: None,
            reserved: NO_RESERVED,
        },
        context: GpReg::EBP,
        scratch: GpReg::EAX,
        align: 1,
    }
}

const fn power_desc(id: ProfileId, family: IsaFamily, ext: ExtLevel) -> ProfileDesc {
    let paired = matches!(family, IsaFamily::Power32);
    ProfileDesc {
        id,
        family,
        ext,
        bits: if paired { 256 } else { 128 },
        native_bits: 128,
        elem: if paired { ElemWidth::W32 } else { ElemWidth::W64 },
        regs: RegisterFile {
            count: if paired { 14 } else { 16 },
            base: 32,
            high_offset: if paired { Some(16) } else { None },
            reserved: if paired { PAIR_RESERVED } else { P64_RESERVED },
        },
        context: GpReg(5),
        scratch: GpReg(4),
        align: 16,
    }
}

pub const X86_AVX1_F32: ProfileDesc =
    x86_desc(ProfileId::X86Avx1F32, IsaFamily::X86, ExtLevel::V1, ElemWidth::W32);
pub const X86_AVX2_F32: ProfileDesc =
    x86_desc(ProfileId::X86Avx2F32, IsaFamily::X86, ExtLevel::V2, ElemWidth::W32);
pub const X64_AVX1_F32: ProfileDesc =
    x86_desc(ProfileId::X64Avx1F32, IsaFamily::X86_64, ExtLevel::V1, ElemWidth::W32);
pub const X64_AVX2_F32: ProfileDesc =
    x86_desc(ProfileId::X64Avx2F32, IsaFamily::X86_64, ExtLevel::V2, ElemWidth::W32);
pub const X64_AVX1_F64: ProfileDesc =
    x86_desc(ProfileId::X64Avx1F64, IsaFamily::X86_64, ExtLevel::V1, ElemWidth::W64);
pub const X64_AVX2_F64: ProfileDesc =
    x86_desc(ProfileId::X64Avx2F64, IsaFamily::X86_64, ExtLevel::V2, ElemWidth::W64);
pub const P64_VSX1_F64: ProfileDesc =
    power_desc(ProfileId::P64Vsx1F64, IsaFamily::Power64, ExtLevel::V1);
pub const P64_VSX2_F64: ProfileDesc =
    power_desc(ProfileId::P64Vsx2F64, IsaFamily::Power64, ExtLevel::V2);
pub const P32_VSX1_F32X2: ProfileDesc =
    power_desc(ProfileId::P32Vsx1F32x2, IsaFamily::Power32, ExtLevel::V1);
pub const P32_VSX2_F32X2: ProfileDesc =
    power_desc(ProfileId::P32Vsx2F32x2, IsaFamily::Power32, ExtLevel::V2);

// ─── Profile trait & markers ────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// A statically selected encoding profile.
///
/// Sealed: the rule tables are exhaustive over the markers defined here.
pub trait Profile: sealed::Sealed + Copy + Default + fmt::Debug + 'static {
    /// Static description.
    const DESC: ProfileDesc;

    /// Lower one pseudo-op into `buf`.
    ///
    /// # Errors
    ///
    /// Any operand the profile cannot encode.
    fn lower(buf: &mut CodeBuffer, op: &PseudoOp) -> Result<(), EncodeError>;
}

macro_rules! define_profile {
    ($(#[$meta:meta])* $name:ident, $desc:ident, $feature:literal, $backend:path) => {
        $(#[$meta])*
        #[cfg(feature = $feature)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        #[cfg(feature = $feature)]
        impl sealed::Sealed for $name {}

        #[cfg(feature = $feature)]
        impl Profile for $name {
            const DESC: ProfileDesc = $desc;

            #[inline]
            fn lower(buf: &mut CodeBuffer, op: &PseudoOp) -> Result<(), EncodeError> {
                $backend(buf, op)
            }
        }
    };
}

define_profile!(
    /// 32-bit x86, AVX1, 8 × fp32.
    X86Avx1F32, X86_AVX1_F32, "x86", crate::x86::lower::<X86Avx1F32>
);
define_profile!(
    /// 32-bit x86, AVX2+FMA3, 8 × fp32.
    X86Avx2F32, X86_AVX2_F32, "x86", crate::x86::lower::<X86Avx2F32>
);
define_profile!(
    /// x86-64, AVX1, 8 × fp32.
    X64Avx1F32, X64_AVX1_F32, "x86_64", crate::x86::lower::<X64Avx1F32>
);
define_profile!(
    /// x86-64, AVX2+FMA3, 8 × fp32.
    X64Avx2F32, X64_AVX2_F32, "x86_64", crate::x86::lower::<X64Avx2F32>
);
define_profile!(
    /// x86-64, AVX1, 4 × fp64.
    X64Avx1F64, X64_AVX1_F64, "x86_64", crate::x86::lower::<X64Avx1F64>
);
define_profile!(
    /// x86-64, AVX2+FMA3, 4 × fp64.
    X64Avx2F64, X64_AVX2_F64, "x86_64", crate::x86::lower::<X64Avx2F64>
);
define_profile!(
    /// 64-bit Power, VSX1 (POWER7), 2 × fp64.
    P64Vsx1F64, P64_VSX1_F64, "power", crate::power::lower::<P64Vsx1F64>
);
define_profile!(
    /// 64-bit Power, VSX2 (POWER8), 2 × fp64.
    P64Vsx2F64, P64_VSX2_F64, "power", crate::power::lower::<P64Vsx2F64>
);
define_profile!(
    /// 32-bit Power, VSX1, 8 × fp32 as register pairs.
    P32Vsx1F32x2, P32_VSX1_F32X2, "power", crate::power::lower::<P32Vsx1F32x2>
);
define_profile!(
    /// 32-bit Power, VSX2, 8 × fp32 as register pairs.
    P32Vsx2F32x2, P32_VSX2_F32X2, "power", crate::power::lower::<P32Vsx2F32x2>
);
