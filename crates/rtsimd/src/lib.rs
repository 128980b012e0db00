//! # rtsimd: Retargetable SIMD Pseudo-Op Encoder
//!
//! `rtsimd` turns a fixed, profile-independent vocabulary of packed
//! floating-point and integer pseudo-ops into x86 AVX or Power VSX machine
//! code. One kernel written against the vocabulary encodes unchanged for
//! every profile; what changes is the rule table behind it.
//!
//! ## Quick Start
//!
//! ```rust
//! use rtsimd::{assemble, ProfileId};
//!
//! let code = assemble("add x0, x1", ProfileId::X64Avx2F32).unwrap();
//! assert_eq!(code.bytes(), &[0xC4, 0xE1, 0x7C, 0x58, 0xC1]);
//! ```
//!
//! ## Features
//!
//! - **Statically selected profiles**: [`Assembler<P>`] is generic over a
//!   [`Profile`] marker, one per {family, extension, width, element} tuple.
//! - **Addressing**: displacements past the inline field are materialized
//!   into a scratch register automatically.
//! - **Compatibility shims**: operations a profile lacks lower to a
//!   documented multi-instruction [`Shim`]; native rules always win.
//! - **Register save/restore**: the whole register file, reserved
//!   constants included, spills to and reloads from the context block.
//! - **`no_std` + `alloc`**.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Instruction encoding narrows register numbers and displacements into
// bit fields constantly and writes opcodes as dense hex literals.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    clippy::many_single_char_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::new_without_default
)]

extern crate alloc;

/// Displacement classification and scratch-register materialization.
pub mod addressing;
/// Typed builder, listing assembly, and `AssemblyResult`.
pub mod assembler;
/// Code buffer, label fixups, and instruction field builders.
pub mod encoder;
/// Error type.
pub mod error;
/// Operand model and pseudo-op vocabulary.
pub mod ir;
/// Listing parser.
pub mod parser;
#[cfg(feature = "power")]
pub(crate) mod power;
/// Profiles: descriptors, register files, context block, markers.
pub mod profile;
/// Register file save/restore layout.
pub mod save_restore;
/// Compatibility shim catalogue and selection.
pub mod shim;
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) mod x86;

// Re-exports
pub use addressing::classify;
pub use assembler::{assemble, assemble_for, Assembler, AssemblyResult};
pub use encoder::CodeBuffer;
pub use error::EncodeError;
pub use ir::{
    AddrMode, Form, GpReg, Label, MaskKind, MemoryOperand, Op, Operand, PseudoOp, RoundMode, Rounding, ShiftCount,
    Src, VReg, WideRegisterPair, XMM0, XMM1, XMM2, XMM3, XMM4, XMM5, XMM6, XMM7, XMM8, XMM9, XMMA, XMMB, XMMC,
    XMMD, XMME, XMMF,
};
pub use parser::{ListingOperand, Statement};
pub use profile::*;
pub use save_restore::{area_size, layout, Direction, SaveSlot};
pub use shim::Shim;

// ─── Build-time target ──────────────────────────────────────────────────────

/// Counts enabled `target-*` features.
const TARGET_FEATURES: usize = cfg!(feature = "target-x86-avx1-f32") as usize
    + cfg!(feature = "target-x86-avx2-f32") as usize
    + cfg!(feature = "target-x64-avx1-f32") as usize
    + cfg!(feature = "target-x64-avx2-f32") as usize
    + cfg!(feature = "target-x64-avx1-f64") as usize
    + cfg!(feature = "target-x64-avx2-f64") as usize
    + cfg!(feature = "target-p64-vsx1-f64") as usize
    + cfg!(feature = "target-p64-vsx2-f64") as usize
    + cfg!(feature = "target-p32-vsx1-f32x2") as usize
    + cfg!(feature = "target-p32-vsx2-f32x2") as usize;

const _: () = assert!(
    TARGET_FEATURES <= 1,
    "more than one `target-*` feature is enabled; a build encodes for exactly one profile"
);

// Each alias is gated on every earlier feature being off, so a conflicting
// selection reports through the assertion above and nothing else.
macro_rules! target_alias {
    (@acc [$($prev:literal),*] $feature:literal => $marker:ident, $($rest:tt)*) => {
        /// The profile selected at build time by a `target-*` feature.
        #[cfg(all(feature = $feature, not(any($(feature = $prev),*))))]
        pub type Target = $marker;

        target_alias!(@acc [$($prev,)* $feature] $($rest)*);
    };
    (@acc [$($prev:literal),*]) => {};
}

target_alias! {
    @acc []
    "target-x86-avx1-f32" => X86Avx1F32,
    "target-x86-avx2-f32" => X86Avx2F32,
    "target-x64-avx1-f32" => X64Avx1F32,
    "target-x64-avx2-f32" => X64Avx2F32,
    "target-x64-avx1-f64" => X64Avx1F64,
    "target-x64-avx2-f64" => X64Avx2F64,
    "target-p64-vsx1-f64" => P64Vsx1F64,
    "target-p64-vsx2-f64" => P64Vsx2F64,
    "target-p32-vsx1-f32x2" => P32Vsx1F32x2,
    "target-p32-vsx2-f32x2" => P32Vsx2F32x2,
}
