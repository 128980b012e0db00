//! Public encoder API: the typed builder and one-shot listing assembly.
//!
//! [`Assembler`] is parameterized by a [`Profile`] marker, so every
//! pseudo-op pushed into one assembler is encoded by one rule table. Mixing
//! profiles inside a stream is not expressible.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::encoder::CodeBuffer;
use crate::error::EncodeError;
use crate::ir::{Label, MaskKind, MemoryOperand, Op, Operand, PseudoOp, RoundMode, Rounding, ShiftCount, Src, VReg};
use crate::parser::{self, ListingOperand, Statement};
use crate::profile::{IsaFamily, Profile, ProfileId};

/// The result of a successful encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    bytes: Vec<u8>,
    /// Named labels (name → byte offset), sorted by offset.
    labels: Vec<(String, usize)>,
    /// `(offset, pseudo-op text)` per pushed op, when listing was enabled.
    annotations: Vec<(usize, String)>,
    profile: ProfileId,
}

impl AssemblyResult {
    /// The encoded bytes. Power words are big-endian.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtsimd::{Assembler, X64Avx2F32, XMM0, XMM1};
    ///
    /// let mut asm = Assembler::<X64Avx2F32>::new();
    /// asm.add(XMM0, XMM1)?;
    /// assert_eq!(asm.finish()?.bytes(), &[0xC4, 0xE1, 0x7C, 0x58, 0xC1]);
    /// # Ok::<(), rtsimd::EncodeError>(())
    /// ```
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Profile the bytes were encoded for.
    #[must_use]
    pub fn profile(&self) -> ProfileId {
        self.profile
    }

    /// Named labels and their offsets, in offset order.
    #[must_use]
    pub fn labels(&self) -> &[(String, usize)] {
        &self.labels
    }

    /// Look up a label offset by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtsimd::{assemble, ProfileId};
    ///
    /// let result = assemble("top: add x0, x1\nend:", ProfileId::X64Avx2F32)?;
    /// assert_eq!(result.label_offset("top"), Some(0));
    /// assert_eq!(result.label_offset("end"), Some(5));
    /// # Ok::<(), rtsimd::EncodeError>(())
    /// ```
    #[must_use]
    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.labels.iter().find(|(n, _)| n == name).map(|&(_, off)| off)
    }

    /// Human-readable listing with offsets, hex bytes and pseudo-op text.
    ///
    /// Empty of text unless [`Assembler::enable_listing`] was called; the
    /// hex column is always present. x86 output is chunked at most eight
    /// bytes per line, Power output one instruction word per line.
    ///
    /// ```text
    /// 00000000                  top:
    /// 00000000  C4E17C58C1        add x0, x1
    /// ```
    #[must_use]
    pub fn listing(&self) -> String {
        let chunk = if self.profile.desc().family.is_x86() { 8 } else { 4 };

        let mut label_at: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (name, off) in &self.labels {
            label_at.entry(*off).or_default().push(name);
        }
        let text_at: BTreeMap<usize, &str> = self.annotations.iter().map(|(off, t)| (*off, t.as_str())).collect();
        let label_lines = |out: &mut String, at: usize| {
            for name in label_at.get(&at).into_iter().flatten() {
                out.push_str(&format!("{:08X}                  {}:\n", at, name));
            }
        };

        let mut out = String::new();
        let mut i = 0;
        while i < self.bytes.len() {
            label_lines(&mut out, i);

            // break at the next op or label boundary
            let mut end = core::cmp::min(i + chunk, self.bytes.len());
            if let Some((&next, _)) = text_at.range(i + 1..end).next() {
                end = next;
            }
            if let Some((&next, _)) = label_at.range(i + 1..end).next() {
                end = next;
            }

            let hex: String = self.bytes[i..end].iter().map(|b| format!("{:02X}", b)).collect();
            match text_at.get(&i) {
                Some(text) => out.push_str(&format!("{:08X}  {:<16}  {}\n", i, hex, text)),
                None => out.push_str(&format!("{:08X}  {:<16}\n", i, hex)),
            }
            i = end;
        }
        label_lines(&mut out, i);
        out
    }
}

/// Builder-pattern encoder for one profile.
///
/// # Examples
///
/// ```rust
/// use rtsimd::{Assembler, MaskKind, P64Vsx2F64, XMM0, XMM1};
///
/// let mut asm = Assembler::<P64Vsx2F64>::new();
/// let done = asm.new_label();
/// asm.add(XMM0, XMM1)?
///     .mask_jump(MaskKind::None, XMM0, done)?
///     .bind(done)?;
/// let result = asm.finish()?;
/// assert_eq!(result.len() % 4, 0);
/// # Ok::<(), rtsimd::EncodeError>(())
/// ```
#[derive(Debug)]
pub struct Assembler<P: Profile> {
    buf: CodeBuffer,
    /// Listing label names.
    labels: BTreeMap<String, Label>,
    annotations: Vec<(usize, String)>,
    listing_enabled: bool,
    ops: usize,
    _profile: PhantomData<P>,
}

impl<P: Profile> Default for Assembler<P> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! binary_ops {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, g: VReg, s: impl Into<Src>) -> Result<&mut Self, EncodeError> {
                let s: Src = s.into();
                self.push(PseudoOp::binary($op, g, s))
            }
        )*
    };
}

macro_rules! unary_ops {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, d: VReg, s: impl Into<Src>) -> Result<&mut Self, EncodeError> {
                let s: Src = s.into();
                self.push(PseudoOp::binary($op, d, s))
            }
        )*
    };
}

macro_rules! shift_ops {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, g: VReg, count: impl Into<ShiftCount>) -> Result<&mut Self, EncodeError> {
                let count: ShiftCount = count.into();
                self.push(PseudoOp::binary($op, g, count))
            }
        )*
    };
}

macro_rules! nullary_ops {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self) -> Result<&mut Self, EncodeError> {
                self.push(PseudoOp::nullary($op))
            }
        )*
    };
}

impl<P: Profile> Assembler<P> {
    /// Empty assembler.
    pub fn new() -> Self {
        Self {
            buf: CodeBuffer::new(),
            labels: BTreeMap::new(),
            annotations: Vec::new(),
            listing_enabled: false,
            ops: 0,
            _profile: PhantomData,
        }
    }

    /// The profile this assembler encodes for.
    pub fn profile(&self) -> ProfileId {
        P::DESC.id
    }

    /// Record pseudo-op text for [`AssemblyResult::listing`].
    pub fn enable_listing(&mut self) -> &mut Self {
        self.listing_enabled = true;
        self
    }

    /// Bytes emitted so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode one pseudo-op.
    ///
    /// On error nothing from `op` remains in the output.
    ///
    /// # Errors
    ///
    /// Any operand the profile cannot encode.
    pub fn push(&mut self, op: PseudoOp) -> Result<&mut Self, EncodeError> {
        let start = self.buf.len();
        if let Err(e) = P::lower(&mut self.buf, &op) {
            self.buf.truncate(start);
            return Err(e);
        }
        log::trace!("{}: {} -> {} bytes", P::DESC.id, op, self.buf.len() - start);
        if self.listing_enabled {
            let text = self.describe(&op);
            self.annotations.push((start, text));
        }
        self.ops += 1;
        Ok(self)
    }

    fn describe(&self, op: &PseudoOp) -> String {
        match op.src {
            Operand::Label(l) => alloc::format!("{} {}, {}", op.op, op.dst, self.buf.label_name(l)),
            _ => alloc::format!("{op}"),
        }
    }

    /// Fresh anonymous label.
    pub fn new_label(&mut self) -> Label {
        self.buf.new_label()
    }

    /// Bind `label` to the current offset.
    ///
    /// # Errors
    ///
    /// [`EncodeError::DuplicateLabel`] when already bound.
    pub fn bind(&mut self, label: Label) -> Result<&mut Self, EncodeError> {
        self.buf.bind(label)?;
        Ok(self)
    }

    /// The label called `name`, created unbound on first use.
    pub fn named_label(&mut self, name: &str) -> Label {
        if let Some(&l) = self.labels.get(name) {
            return l;
        }
        let l = self.buf.new_named_label(name);
        self.labels.insert(String::from(name), l);
        l
    }

    /// Define label `name` at the current offset.
    ///
    /// # Errors
    ///
    /// [`EncodeError::DuplicateLabel`] when `name` is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self, EncodeError> {
        let l = self.named_label(name);
        self.bind(l)
    }

    /// Parse a listing and encode every statement.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtsimd::{Assembler, X86Avx2F32};
    ///
    /// let mut asm = Assembler::<X86Avx2F32>::new();
    /// asm.emit("add x2, x3")?;
    /// assert_eq!(asm.finish()?.bytes(), &[0xC5, 0xEC, 0x58, 0xD3]);
    /// # Ok::<(), rtsimd::EncodeError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Listing syntax errors, or the first pseudo-op the profile cannot
    /// encode. Statements before the failing one stay encoded.
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, EncodeError> {
        for stmt in parser::parse(source, P::DESC.context)? {
            match stmt {
                Statement::Label { name, .. } => {
                    self.label(&name)?;
                }
                Statement::Op { op, operands, .. } => {
                    let op = self.resolve(op, operands);
                    self.push(op)?;
                }
            }
        }
        Ok(self)
    }

    fn resolve(&mut self, op: Op, operands: Vec<ListingOperand>) -> PseudoOp {
        let mut slots = [Operand::None; 3];
        for (slot, operand) in slots.iter_mut().zip(operands) {
            *slot = match operand {
                ListingOperand::Reg(r) => Operand::Reg(r),
                ListingOperand::Mem(m) => Operand::Mem(m),
                ListingOperand::Imm(v) => Operand::Imm(v),
                ListingOperand::Label(name) => Operand::Label(self.named_label(&name)),
            };
        }
        let [dst, src, third] = slots;
        PseudoOp { op, dst, src, third }
    }

    /// Encode a single listing statement in isolation, without touching
    /// this assembler's output or labels.
    ///
    /// # Errors
    ///
    /// Syntax errors, a statement that is not a pseudo-op, or any encoding
    /// failure. A branch has no bound target here and fails with
    /// [`EncodeError::UndefinedLabel`].
    pub fn encode_one(&self, source: &str) -> Result<Vec<u8>, EncodeError> {
        let mut scratch = Self::new();
        let mut stmts = parser::parse(source, P::DESC.context)?.into_iter();
        match (stmts.next(), stmts.next()) {
            (None, _) => Ok(Vec::new()),
            (Some(Statement::Op { op, operands, .. }), None) => {
                let op = scratch.resolve(op, operands);
                scratch.push(op)?;
                scratch.buf.finish()
            }
            (Some(Statement::Label { line, .. }), _) => Err(EncodeError::Syntax {
                msg: String::from("expected a pseudo-op"),
                line,
            }),
            (Some(Statement::Op { line, .. }), Some(_)) => Err(EncodeError::Syntax {
                msg: String::from("expected exactly one pseudo-op"),
                line,
            }),
        }
    }

    /// Patch label fixups and return the encoded bytes.
    ///
    /// # Errors
    ///
    /// [`EncodeError::UndefinedLabel`] for a branch to a label never bound,
    /// [`EncodeError::BranchOutOfRange`] when a target is out of reach.
    pub fn finish(self) -> Result<AssemblyResult, EncodeError> {
        let mut labels: Vec<(String, usize)> = self
            .labels
            .iter()
            .filter_map(|(name, &l)| self.buf.label_offset(l).map(|off| (name.clone(), off)))
            .collect();
        labels.sort_by_key(|&(_, off)| off);

        let bytes = self.buf.finish()?;
        log::debug!("{}: encoded {} pseudo-ops into {} bytes", P::DESC.id, self.ops, bytes.len());
        Ok(AssemblyResult {
            bytes,
            labels,
            annotations: self.annotations,
            profile: P::DESC.id,
        })
    }

    // ─── Typed pseudo-ops ───────────────────────────────────────────────

    /// `mov [m], s`.
    pub fn store(&mut self, m: MemoryOperand, s: VReg) -> Result<&mut Self, EncodeError> {
        self.push(PseudoOp::binary(Op::Mov, m, s))
    }

    /// `not g`.
    pub fn not(&mut self, g: VReg) -> Result<&mut Self, EncodeError> {
        self.push(PseudoOp::binary(Op::Not, g, Operand::None))
    }

    /// `neg g`.
    pub fn neg(&mut self, g: VReg) -> Result<&mut Self, EncodeError> {
        self.push(PseudoOp::binary(Op::Neg, g, Operand::None))
    }

    /// `fma g, s, t`: `g += s * t`.
    pub fn fma(&mut self, g: VReg, s: VReg, t: impl Into<Src>) -> Result<&mut Self, EncodeError> {
        let t: Src = t.into();
        self.push(PseudoOp::ternary(Op::Fma, g, s, t))
    }

    /// `fms g, s, t`: `g -= s * t`.
    pub fn fms(&mut self, g: VReg, s: VReg, t: impl Into<Src>) -> Result<&mut Self, EncodeError> {
        let t: Src = t.into();
        self.push(PseudoOp::ternary(Op::Fms, g, s, t))
    }

    /// Round `s` into `d`.
    pub fn round(&mut self, mode: Rounding, d: VReg, s: impl Into<Src>) -> Result<&mut Self, EncodeError> {
        let s: Src = s.into();
        self.push(PseudoOp::binary(Op::Round(mode), d, s))
    }

    /// Convert float `s` to integer `d`.
    pub fn convert(&mut self, mode: Rounding, d: VReg, s: impl Into<Src>) -> Result<&mut Self, EncodeError> {
        let s: Src = s.into();
        self.push(PseudoOp::binary(Op::Convert(mode), d, s))
    }

    /// Branch to `target` when the sign bits of `s` are all clear
    /// ([`MaskKind::None`]) or all set ([`MaskKind::Full`]).
    pub fn mask_jump(&mut self, kind: MaskKind, s: VReg, target: Label) -> Result<&mut Self, EncodeError> {
        self.push(PseudoOp::binary(Op::MaskJump(kind), s, target))
    }

    /// Load the rounding mode `mode` into the control register.
    pub fn set_rounding(&mut self, mode: RoundMode) -> Result<&mut Self, EncodeError> {
        self.push(PseudoOp::nullary(Op::SetRounding(mode)))
    }

    unary_ops! {
        /// `mov d, s`.
        mov => Op::Mov;
        sqrt => Op::Sqrt;
        /// Reciprocal estimate.
        rcp_estimate => Op::RcpEstimate;
        /// Refined reciprocal; consumes `s`.
        rcp => Op::Rcp;
        /// Reciprocal square-root estimate.
        rsq_estimate => Op::RsqEstimate;
        /// Refined reciprocal square root; consumes `s`.
        rsq => Op::Rsq;
        /// Integer to float.
        convert_from_int => Op::ConvertFromInt;
    }

    binary_ops! {
        and => Op::And;
        andn => Op::Andn;
        or => Op::Or;
        orn => Op::Orn;
        xor => Op::Xor;
        add => Op::Add;
        sub => Op::Sub;
        mul => Op::Mul;
        div => Op::Div;
        min => Op::Min;
        max => Op::Max;
        /// Refine reciprocal estimate `g` of `s`; consumes `s`.
        rcp_refine => Op::RcpRefine;
        /// Refine reciprocal square-root estimate `g` of `s`; consumes `s`.
        rsq_refine => Op::RsqRefine;
        cmp_eq => Op::CmpEq;
        cmp_ne => Op::CmpNe;
        cmp_lt => Op::CmpLt;
        cmp_le => Op::CmpLe;
        cmp_gt => Op::CmpGt;
        cmp_ge => Op::CmpGe;
        /// Wrapping integer add.
        add_int => Op::AddInt;
        /// Wrapping integer subtract.
        sub_int => Op::SubInt;
    }

    shift_ops! {
        shl => Op::Shl;
        shr => Op::Shr;
        sar => Op::Sar;
    }

    nullary_ops! {
        /// Restore the default rounding mode.
        reset_rounding => Op::ResetRounding;
        /// Load the reserved constant registers from the context block.
        enter => Op::Enter;
        /// Spill the whole register file to the save area.
        save_regs => Op::SaveRegs;
        /// Reload the whole register file from the save area.
        load_regs => Op::LoadRegs;
    }
}

/// Encode `source` with `P`.
///
/// # Errors
///
/// See [`Assembler::emit`] and [`Assembler::finish`].
pub fn assemble_for<P: Profile>(source: &str) -> Result<AssemblyResult, EncodeError> {
    let mut asm = Assembler::<P>::new();
    asm.emit(source)?;
    asm.finish()
}

/// Encode a listing for a profile chosen at run time.
///
/// # Errors
///
/// [`EncodeError::UnsupportedProfile`] when the profile's family is not
/// compiled in, otherwise as [`assemble_for`].
///
/// # Examples
///
/// ```rust
/// use rtsimd::{assemble, ProfileId};
///
/// let result = assemble("add x0, x1", ProfileId::P32Vsx2F32x2)?;
/// assert_eq!(result.bytes(), &[0xF0, 0x00, 0x0A, 0x07, 0xF2, 0x10, 0x8A, 0x07]);
/// # Ok::<(), rtsimd::EncodeError>(())
/// ```
pub fn assemble(source: &str, profile: ProfileId) -> Result<AssemblyResult, EncodeError> {
    #[allow(unused_imports)]
    use crate::profile::*;

    match profile {
        #[cfg(feature = "x86")]
        ProfileId::X86Avx1F32 => assemble_for::<X86Avx1F32>(source),
        #[cfg(feature = "x86")]
        ProfileId::X86Avx2F32 => assemble_for::<X86Avx2F32>(source),
        #[cfg(feature = "x86_64")]
        ProfileId::X64Avx1F32 => assemble_for::<X64Avx1F32>(source),
        #[cfg(feature = "x86_64")]
        ProfileId::X64Avx2F32 => assemble_for::<X64Avx2F32>(source),
        #[cfg(feature = "x86_64")]
        ProfileId::X64Avx1F64 => assemble_for::<X64Avx1F64>(source),
        #[cfg(feature = "x86_64")]
        ProfileId::X64Avx2F64 => assemble_for::<X64Avx2F64>(source),
        #[cfg(feature = "power")]
        ProfileId::P64Vsx1F64 => assemble_for::<P64Vsx1F64>(source),
        #[cfg(feature = "power")]
        ProfileId::P64Vsx2F64 => assemble_for::<P64Vsx2F64>(source),
        #[cfg(feature = "power")]
        ProfileId::P32Vsx1F32x2 => assemble_for::<P32Vsx1F32x2>(source),
        #[cfg(feature = "power")]
        ProfileId::P32Vsx2F32x2 => assemble_for::<P32Vsx2F32x2>(source),
        #[allow(unreachable_patterns)]
        other => Err(disabled(other)),
    }
}

fn disabled(id: ProfileId) -> EncodeError {
    let spec = id.spec();
    let feature = match spec.family {
        IsaFamily::X86 => "x86",
        IsaFamily::X86_64 => "x86_64",
        IsaFamily::Power32 | IsaFamily::Power64 => "power",
    };
    EncodeError::UnsupportedProfile {
        family: spec.family,
        ext: spec.ext,
        bits: spec.bits,
        elem: spec.elem,
        reason: alloc::format!("the '{feature}' feature is not enabled"),
    }
}
