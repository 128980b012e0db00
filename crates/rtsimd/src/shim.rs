//! Compatibility shims.
//!
//! A shim is a fixed multi-instruction sequence standing in for a
//! pseudo-op that a profile has no single native instruction for. Whether
//! an operation lowers natively or through a shim is decided here, once,
//! from the profile tuple; the back ends hold the sequences themselves.
//!
//! Shims only ever touch the context block's scratch slots (`SCR00`,
//! `SCR01`, `SCR02`), the family's reserved temporaries, and on x86-64
//! `rcx` around a memory-sourced 64-bit arithmetic shift (saved and
//! restored through the stack).

use core::fmt;

use crate::ir::{Op, RoundMode, Rounding};
use crate::profile::{ElemWidth, ExtLevel, ProfileDesc};

/// A compatibility sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shim {
    /// 256-bit operation applied to both halves of a register pair.
    PairSplit,
    /// 256-bit integer operation as two 128-bit operations (AVX1).
    IntSplit256,
    /// 64-bit integer add/sub/shift one lane at a time through GPRs (VSX1).
    Int64Scalar,
    /// 64-bit arithmetic right shift one lane at a time (x86 has no `vpsraq`).
    Sar64Scalar,
    /// Newton-Raphson refinement with separate multiply and add.
    NewtonRaphson,
    /// Newton-Raphson refinement with fused multiply-add.
    FusedRefine,
    /// Exact reciprocal (square root) by division; refinement becomes empty.
    DivideEstimate,
    /// `fma`/`fms` as multiply then add, rounding twice (AVX1).
    UnfusedFma,
    /// Round in the requested mode, then truncate.
    ConvertWithMode,
    /// fp64 ↔ int64 per lane through the x87 unit.
    X87Convert,
    /// `not`/`orn` built from and-not/nor and the all-ones constant.
    LogicComplement,
    /// Compare-equal followed by a complement.
    CompareNotEqual,
}

impl Shim {
    /// Every shim in the catalogue.
    pub const ALL: [Shim; 12] = [
        Shim::PairSplit,
        Shim::IntSplit256,
        Shim::Int64Scalar,
        Shim::Sar64Scalar,
        Shim::NewtonRaphson,
        Shim::FusedRefine,
        Shim::DivideEstimate,
        Shim::UnfusedFma,
        Shim::ConvertWithMode,
        Shim::X87Convert,
        Shim::LogicComplement,
        Shim::CompareNotEqual,
    ];

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Shim::PairSplit => "pair-split",
            Shim::IntSplit256 => "int-split-256",
            Shim::Int64Scalar => "int64-scalar",
            Shim::Sar64Scalar => "sar64-scalar",
            Shim::NewtonRaphson => "newton-raphson",
            Shim::FusedRefine => "fused-refine",
            Shim::DivideEstimate => "divide-estimate",
            Shim::UnfusedFma => "unfused-fma",
            Shim::ConvertWithMode => "convert-with-mode",
            Shim::X87Convert => "x87-convert",
            Shim::LogicComplement => "logic-complement",
            Shim::CompareNotEqual => "compare-not-equal",
        }
    }

    /// `true` when the sequence may differ from a native instruction in
    /// the last bit (double rounding).
    pub const fn is_inexact(self) -> bool {
        matches!(self, Shim::UnfusedFma | Shim::NewtonRaphson | Shim::FusedRefine)
    }
}

impl fmt::Display for Shim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The shim `op` lowers through on the profile described by `desc`, or
/// `None` when the profile has a native instruction for it.
///
/// A native rule is always preferred when the extension level offers one.
pub const fn select(desc: &ProfileDesc, op: Op) -> Option<Shim> {
    let v2 = matches!(desc.ext, ExtLevel::V2);
    let dp = matches!(desc.elem, ElemWidth::W64);
    if desc.family.is_x86() {
        select_x86(op, v2, dp)
    } else {
        select_power(op, v2, desc.is_paired())
    }
}

const fn select_x86(op: Op, v2: bool, dp: bool) -> Option<Shim> {
    match op {
        Op::Not | Op::Orn => Some(Shim::LogicComplement),
        Op::RcpEstimate | Op::RsqEstimate | Op::Rcp | Op::Rsq | Op::RcpRefine | Op::RsqRefine if dp => {
            Some(Shim::DivideEstimate)
        }
        Op::RcpRefine | Op::RsqRefine | Op::Rcp | Op::Rsq => Some(Shim::NewtonRaphson),
        Op::Fma | Op::Fms if !v2 => Some(Shim::UnfusedFma),
        Op::Convert(Rounding::Fixed(RoundMode::Zero)) | Op::ConvertFromInt if dp => Some(Shim::X87Convert),
        Op::Convert(Rounding::Fixed(RoundMode::Zero)) => None,
        Op::Convert(Rounding::Current) if !dp => None,
        Op::Convert(_) => Some(Shim::ConvertWithMode),
        Op::Sar if dp => Some(Shim::Sar64Scalar),
        Op::AddInt | Op::SubInt | Op::Shl | Op::Shr | Op::Sar if !v2 => Some(Shim::IntSplit256),
        _ => None,
    }
}

const fn select_power(op: Op, v2: bool, paired: bool) -> Option<Shim> {
    match op {
        Op::RcpRefine | Op::RsqRefine | Op::Rcp | Op::Rsq => Some(Shim::FusedRefine),
        Op::CmpNe => Some(Shim::CompareNotEqual),
        Op::Orn if !v2 => Some(Shim::LogicComplement),
        Op::Convert(Rounding::Fixed(RoundMode::Zero)) => {
            if paired {
                Some(Shim::PairSplit)
            } else {
                None
            }
        }
        Op::Convert(_) => Some(Shim::ConvertWithMode),
        Op::AddInt | Op::SubInt | Op::Shl | Op::Shr | Op::Sar if !v2 && !paired => Some(Shim::Int64Scalar),
        Op::MaskJump(_) | Op::SetRounding(_) | Op::ResetRounding | Op::Enter | Op::SaveRegs | Op::LoadRegs => None,
        _ if paired => Some(Shim::PairSplit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MaskKind;
    use crate::profile::ProfileId;

    fn sel(id: ProfileId, op: Op) -> Option<Shim> {
        select(id.desc(), op)
    }

    #[test]
    fn native_preferred_when_available() {
        assert_eq!(sel(ProfileId::X64Avx2F32, Op::Fma), None);
        assert_eq!(sel(ProfileId::X64Avx1F32, Op::Fma), Some(Shim::UnfusedFma));
        assert_eq!(sel(ProfileId::X64Avx2F32, Op::AddInt), None);
        assert_eq!(sel(ProfileId::X86Avx1F32, Op::AddInt), Some(Shim::IntSplit256));
        assert_eq!(sel(ProfileId::P64Vsx2F64, Op::Shl), None);
        assert_eq!(sel(ProfileId::P64Vsx1F64, Op::Shl), Some(Shim::Int64Scalar));
        assert_eq!(sel(ProfileId::P64Vsx2F64, Op::Orn), None);
        assert_eq!(sel(ProfileId::P64Vsx1F64, Op::Orn), Some(Shim::LogicComplement));
    }

    #[test]
    fn f64_on_x86() {
        assert_eq!(sel(ProfileId::X64Avx2F64, Op::Sar), Some(Shim::Sar64Scalar));
        assert_eq!(sel(ProfileId::X64Avx2F64, Op::Shr), None);
        assert_eq!(sel(ProfileId::X64Avx2F64, Op::RcpRefine), Some(Shim::DivideEstimate));
        assert_eq!(sel(ProfileId::X64Avx2F64, Op::ConvertFromInt), Some(Shim::X87Convert));
        assert_eq!(
            sel(ProfileId::X64Avx2F64, Op::Convert(Rounding::Current)),
            Some(Shim::ConvertWithMode)
        );
        assert_eq!(sel(ProfileId::X64Avx2F32, Op::Convert(Rounding::Current)), None);
        assert_eq!(
            sel(ProfileId::X64Avx2F32, Op::Convert(Rounding::Fixed(RoundMode::Down))),
            Some(Shim::ConvertWithMode)
        );
    }

    #[test]
    fn pairs_split_everything_vector() {
        assert_eq!(sel(ProfileId::P32Vsx1F32x2, Op::Add), Some(Shim::PairSplit));
        assert_eq!(sel(ProfileId::P32Vsx2F32x2, Op::AddInt), Some(Shim::PairSplit));
        assert_eq!(sel(ProfileId::P32Vsx2F32x2, Op::Rcp), Some(Shim::FusedRefine));
        assert_eq!(sel(ProfileId::P32Vsx2F32x2, Op::MaskJump(MaskKind::Full)), None);
        assert_eq!(sel(ProfileId::P32Vsx2F32x2, Op::SaveRegs), None);
        assert_eq!(sel(ProfileId::P64Vsx2F64, Op::Add), None);
    }

    #[test]
    fn control_ops_are_never_shimmed() {
        for id in ProfileId::ALL {
            for op in [Op::Enter, Op::SaveRegs, Op::LoadRegs, Op::ResetRounding] {
                assert_eq!(sel(id, op), None, "{id} {op}");
            }
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in Shim::ALL.iter().enumerate() {
            for b in &Shim::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
        assert!(Shim::UnfusedFma.is_inexact());
        assert!(!Shim::PairSplit.is_inexact());
    }
}
