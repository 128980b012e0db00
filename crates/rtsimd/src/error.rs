//! Error types for pseudo-op encoding.
//!
//! Every failure in this crate is a build-time failure of the generated code:
//! an operand the profile cannot address, a displacement past the extended
//! form's capacity, a profile tuple nobody implements. Nothing here describes
//! a run-time condition of the emitted machine code.

use alloc::string::String;
use core::fmt;

use crate::ir::Op;
use crate::profile::{ElemWidth, ExtLevel, IsaFamily, ProfileId};

/// Encoding error with a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodeError {
    /// Logical vector register id outside the profile's register file.
    RegisterOutOfRange {
        /// The offending logical id.
        reg: u8,
        /// Number of logical registers the profile exposes.
        limit: u8,
        /// Active profile.
        profile: ProfileId,
    },

    /// Base (address) register not encodable on the profile.
    BaseRegisterOutOfRange {
        /// The offending physical base register number.
        reg: u8,
        /// Number of general-purpose registers the family encodes.
        limit: u8,
        /// Active profile.
        profile: ProfileId,
    },

    /// Displacement exceeds even the extended addressing form.
    DisplacementOutOfRange {
        /// The displacement that did not fit.
        disp: i64,
        /// Smallest encodable displacement.
        min: i64,
        /// Largest encodable displacement.
        max: i64,
        /// Active profile.
        profile: ProfileId,
    },

    /// Displacement violates the profile's SIMD alignment.
    MisalignedDisplacement {
        /// The misaligned displacement.
        disp: i64,
        /// Required alignment in bytes.
        align: u32,
        /// Active profile.
        profile: ProfileId,
    },

    /// Immediate operand exceeds the allowed range.
    ImmediateOutOfRange {
        /// The immediate value.
        value: i64,
        /// Largest allowed value (smallest is zero).
        max: i64,
    },

    /// Operand kinds do not match any form of the pseudo-op.
    InvalidOperands {
        /// The pseudo-op.
        op: Op,
        /// Why the operands were rejected.
        detail: String,
    },

    /// The requested {family, extension, width, element} tuple is not implemented.
    UnsupportedProfile {
        /// Requested ISA family.
        family: IsaFamily,
        /// Requested extension level.
        ext: ExtLevel,
        /// Requested vector width in bits.
        bits: u32,
        /// Requested element width.
        elem: ElemWidth,
        /// Why no profile matches.
        reason: String,
    },

    /// Neither a native rule nor a shim exists for the pseudo-op.
    NoEncodingRule {
        /// The pseudo-op.
        op: Op,
        /// Active profile.
        profile: ProfileId,
    },

    /// A label was referenced but never bound.
    UndefinedLabel {
        /// Label name or numeric id.
        label: String,
    },

    /// A label was bound twice.
    DuplicateLabel {
        /// Label name or numeric id.
        label: String,
    },

    /// Branch target does not fit the branch displacement field.
    BranchOutOfRange {
        /// Label name or numeric id.
        label: String,
        /// Byte displacement to the target.
        disp: i64,
        /// Largest encodable magnitude.
        max: i64,
    },

    /// Malformed pseudo-op listing.
    Syntax {
        /// What went wrong.
        msg: String,
        /// 1-based line number in the listing.
        line: u32,
    },

    /// Listing names a pseudo-op that does not exist.
    UnknownMnemonic {
        /// The unrecognized mnemonic.
        mnemonic: String,
        /// 1-based line number in the listing.
        line: u32,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::RegisterOutOfRange {
                reg,
                limit,
                profile,
            } => write!(
                f,
                "register x{} out of range for {} (register file has {})",
                reg, profile, limit
            ),
            EncodeError::BaseRegisterOutOfRange {
                reg,
                limit,
                profile,
            } => write!(
                f,
                "base register r{} out of range for {} (limit {})",
                reg, profile, limit
            ),
            EncodeError::DisplacementOutOfRange {
                disp,
                min,
                max,
                profile,
            } => write!(
                f,
                "displacement {:#x} out of range for {} [{:#x}..{:#x}]",
                disp, profile, min, max
            ),
            EncodeError::MisalignedDisplacement {
                disp,
                align,
                profile,
            } => write!(
                f,
                "displacement {:#x} is not {}-byte aligned as {} requires",
                disp, align, profile
            ),
            EncodeError::ImmediateOutOfRange { value, max } => {
                write!(f, "immediate value {} out of range [0..{}]", value, max)
            }
            EncodeError::InvalidOperands { op, detail } => {
                write!(f, "invalid operands for '{}': {}", op, detail)
            }
            EncodeError::UnsupportedProfile {
                family,
                ext,
                bits,
                elem,
                reason,
            } => write!(
                f,
                "unsupported profile {} {} {}-bit {}: {}",
                family,
                ext.name_for(*family),
                bits,
                elem,
                reason
            ),
            EncodeError::NoEncodingRule { op, profile } => {
                write!(f, "no native rule or shim for '{}' on {}", op, profile)
            }
            EncodeError::UndefinedLabel { label } => {
                write!(f, "undefined label '{}'", label)
            }
            EncodeError::DuplicateLabel { label } => {
                write!(f, "duplicate label '{}'", label)
            }
            EncodeError::BranchOutOfRange { label, disp, max } => write!(
                f,
                "branch target '{}' out of range (displacement={}, max=±{})",
                label, disp, max
            ),
            EncodeError::Syntax { msg, line } => write!(f, "line {}: {}", line, msg),
            EncodeError::UnknownMnemonic { mnemonic, line } => {
                write!(f, "line {}: unknown pseudo-op '{}'", line, mnemonic)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn error_register_out_of_range_display() {
        let err = EncodeError::RegisterOutOfRange {
            reg: 9,
            limit: 8,
            profile: ProfileId::X86Avx1F32,
        };
        assert_eq!(
            format!("{}", err),
            "register x9 out of range for x86-avx1-f32 (register file has 8)"
        );
    }

    #[test]
    fn error_displacement_display() {
        let err = EncodeError::DisplacementOutOfRange {
            disp: 0x8000_0000,
            min: 0,
            max: 0x7FFF_FFF0,
            profile: ProfileId::P64Vsx2F64,
        };
        assert_eq!(
            format!("{}", err),
            "displacement 0x80000000 out of range for p64-vsx2-f64 [0x0..0x7ffffff0]"
        );
    }

    #[test]
    fn error_misaligned_display() {
        let err = EncodeError::MisalignedDisplacement {
            disp: 0x18,
            align: 16,
            profile: ProfileId::P32Vsx1F32x2,
        };
        assert_eq!(
            format!("{}", err),
            "displacement 0x18 is not 16-byte aligned as p32-vsx1-f32x2 requires"
        );
    }

    #[test]
    fn error_unsupported_profile_display() {
        let err = EncodeError::UnsupportedProfile {
            family: IsaFamily::X86,
            ext: ExtLevel::V2,
            bits: 256,
            elem: ElemWidth::W64,
            reason: "32-bit x86 only carries fp32 elements".into(),
        };
        assert_eq!(
            format!("{}", err),
            "unsupported profile x86 avx2 256-bit f64: 32-bit x86 only carries fp32 elements"
        );
    }

    #[test]
    fn error_no_rule_display() {
        let err = EncodeError::NoEncodingRule {
            op: Op::Add,
            profile: ProfileId::X64Avx2F32,
        };
        assert_eq!(
            format!("{}", err),
            "no native rule or shim for 'add' on x64-avx2-f32"
        );
    }

    #[test]
    fn error_branch_out_of_range_display() {
        let err = EncodeError::BranchOutOfRange {
            label: "far".into(),
            disp: 40000,
            max: 32767,
        };
        assert_eq!(
            format!("{}", err),
            "branch target 'far' out of range (displacement=40000, max=±32767)"
        );
    }

    #[test]
    fn error_syntax_display() {
        let err = EncodeError::Syntax {
            msg: "expected ','".into(),
            line: 4,
        };
        assert_eq!(format!("{}", err), "line 4: expected ','");
    }

    #[test]
    fn error_unknown_mnemonic_display() {
        let err = EncodeError::UnknownMnemonic {
            mnemonic: "frob".into(),
            line: 2,
        };
        assert_eq!(format!("{}", err), "line 2: unknown pseudo-op 'frob'");
    }
}
