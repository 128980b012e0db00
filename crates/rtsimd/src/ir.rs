//! Profile-independent operand model and pseudo-op vocabulary.
//!
//! Operands name *logical* registers. Mapping a logical id to physical
//! register fields (and to register pairs on profiles whose native vector is
//! narrower than the pseudo-op width) is the job of [`crate::profile`].

use alloc::string::String;
use core::fmt;

use crate::error::EncodeError;

// ─── Registers ──────────────────────────────────────────────────────────────

/// Logical SIMD register id, `0..N` where `N` is the profile's register file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VReg(pub u8);

impl VReg {
    /// Logical id.
    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

pub const XMM0: VReg = VReg(0);
pub const XMM1: VReg = VReg(1);
pub const XMM2: VReg = VReg(2);
pub const XMM3: VReg = VReg(3);
pub const XMM4: VReg = VReg(4);
pub const XMM5: VReg = VReg(5);
pub const XMM6: VReg = VReg(6);
pub const XMM7: VReg = VReg(7);
pub const XMM8: VReg = VReg(8);
pub const XMM9: VReg = VReg(9);
pub const XMMA: VReg = VReg(10);
pub const XMMB: VReg = VReg(11);
pub const XMMC: VReg = VReg(12);
pub const XMMD: VReg = VReg(13);
pub const XMME: VReg = VReg(14);
pub const XMMF: VReg = VReg(15);

/// Physical general-purpose register number, used only as an address base.
///
/// The numbering is the ISA's own: `0 = eax/rax` on x86, `rN = N` on Power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpReg(pub u8);

impl GpReg {
    pub const EAX: GpReg = GpReg(0);
    pub const ECX: GpReg = GpReg(1);
    pub const EDX: GpReg = GpReg(2);
    pub const EBX: GpReg = GpReg(3);
    pub const ESP: GpReg = GpReg(4);
    pub const EBP: GpReg = GpReg(5);
    pub const ESI: GpReg = GpReg(6);
    pub const EDI: GpReg = GpReg(7);

    /// Hardware register number.
    #[inline]
    pub const fn num(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GpReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A logical wide register realised as two physical half registers.
///
/// Half 0 is always emitted first and lives at the lower memory address, so
/// loads, stores and arithmetic visit the halves in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideRegisterPair {
    logical: VReg,
    halves: [u8; 2],
}

impl WideRegisterPair {
    pub(crate) const fn new(logical: VReg, low: u8, high: u8) -> Self {
        Self {
            logical,
            halves: [low, high],
        }
    }

    /// The logical register this pair represents.
    pub const fn logical(&self) -> VReg {
        self.logical
    }

    /// Physical register number of half `i` (0 = low, 1 = high).
    ///
    /// `i` is masked to one bit.
    pub const fn half(&self, i: usize) -> u8 {
        self.halves[i & 1]
    }
}

// ─── Memory operands ────────────────────────────────────────────────────────

/// Base register plus signed displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryOperand {
    /// Address base.
    pub base: GpReg,
    /// Byte displacement from `base`.
    pub disp: i64,
}

impl MemoryOperand {
    /// `[base + disp]`.
    pub const fn new(base: GpReg, disp: i64) -> Self {
        Self { base, disp }
    }

    /// Same base, displacement moved by `delta` bytes. Saturates, so an
    /// out-of-range displacement stays out of range.
    pub const fn offset(self, delta: i64) -> Self {
        Self {
            base: self.base,
            disp: self.disp.saturating_add(delta),
        }
    }
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disp == 0 {
            write!(f, "[{}]", self.base)
        } else if self.disp < 0 {
            write!(f, "[{} - {:#x}]", self.base, -self.disp)
        } else {
            write!(f, "[{} + {:#x}]", self.base, self.disp)
        }
    }
}

/// How a profile encodes a memory operand's displacement.
///
/// The tag is a pure function of the displacement and the profile; see
/// [`crate::addressing::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddrMode {
    /// Compact in-line displacement (x86 disp8 / none, Power `addi`).
    Inline,
    /// Full-width in-line displacement (x86 disp32).
    Wide,
    /// Low 16 bits materialized into a scratch register, then register-indexed.
    Indexed16,
    /// High and low halves materialized, then register-indexed.
    Indexed32,
}

impl AddrMode {
    /// `true` for every form past the compact in-line one.
    pub const fn is_extended(self) -> bool {
        !matches!(self, AddrMode::Inline)
    }
}

// ─── Labels ─────────────────────────────────────────────────────────────────

/// Branch target created by [`crate::Assembler::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

// ─── Vocabulary ─────────────────────────────────────────────────────────────

/// Rounding direction encoded directly in an instruction or the control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundMode {
    /// Round to nearest, ties to even.
    Nearest,
    /// Toward negative infinity.
    Down,
    /// Toward positive infinity.
    Up,
    /// Toward zero.
    Zero,
}

impl RoundMode {
    const fn suffix(self) -> char {
        match self {
            RoundMode::Nearest => 'n',
            RoundMode::Down => 'm',
            RoundMode::Up => 'p',
            RoundMode::Zero => 'z',
        }
    }
}

/// Rounding for round/convert pseudo-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rounding {
    /// Mode fixed at encode time.
    Fixed(RoundMode),
    /// Mode taken from the control register at run time (see `fctrl`).
    Current,
}

/// Condition tested by the mask jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaskKind {
    /// No lane satisfies the condition.
    None,
    /// Every lane satisfies the condition.
    Full,
}

/// Pseudo-operation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    Mov,
    And,
    Andn,
    Or,
    Orn,
    Xor,
    Not,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Sqrt,
    RcpEstimate,
    RcpRefine,
    Rcp,
    RsqEstimate,
    RsqRefine,
    Rsq,
    Fma,
    Fms,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    Round(Rounding),
    Convert(Rounding),
    ConvertFromInt,
    AddInt,
    SubInt,
    /// Shifts by an immediate below the element width, or by a count read
    /// from memory. Memory counts at or above the element width are
    /// family-defined. 64-bit Power takes them mod 64 on both extension
    /// levels. x86 zeroes logical shifts and sign-fills 32-bit `sar`,
    /// while 64-bit `sar` takes them mod 64.
    Shl,
    Shr,
    Sar,
    MaskJump(MaskKind),
    SetRounding(RoundMode),
    ResetRounding,
    Enter,
    SaveRegs,
    LoadRegs,
}

/// Operand shape a pseudo-op accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `G = G op S`, S register or memory.
    Binary,
    /// `D = op S`, S register or memory. `Mov` additionally stores `[D] = S`.
    Unary,
    /// `G = op G`.
    InPlace,
    /// `G = G op S*T`, S register, T register or memory.
    Ternary,
    /// `G = G shift count`, count immediate or memory.
    Shift,
    /// Test S, branch to label.
    Branch,
    /// No operands.
    Nullary,
}

impl Op {
    /// Every pseudo-op, in vocabulary order.
    pub const ALL: &'static [Op] = &[
        Op::Mov,
        Op::And,
        Op::Andn,
        Op::Or,
        Op::Orn,
        Op::Xor,
        Op::Not,
        Op::Neg,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Min,
        Op::Max,
        Op::Sqrt,
        Op::RcpEstimate,
        Op::RcpRefine,
        Op::Rcp,
        Op::RsqEstimate,
        Op::RsqRefine,
        Op::Rsq,
        Op::Fma,
        Op::Fms,
        Op::CmpEq,
        Op::CmpNe,
        Op::CmpLt,
        Op::CmpLe,
        Op::CmpGt,
        Op::CmpGe,
        Op::Round(Rounding::Fixed(RoundMode::Zero)),
        Op::Round(Rounding::Fixed(RoundMode::Up)),
        Op::Round(Rounding::Fixed(RoundMode::Down)),
        Op::Round(Rounding::Fixed(RoundMode::Nearest)),
        Op::Round(Rounding::Current),
        Op::Convert(Rounding::Fixed(RoundMode::Zero)),
        Op::Convert(Rounding::Fixed(RoundMode::Up)),
        Op::Convert(Rounding::Fixed(RoundMode::Down)),
        Op::Convert(Rounding::Fixed(RoundMode::Nearest)),
        Op::Convert(Rounding::Current),
        Op::ConvertFromInt,
        Op::AddInt,
        Op::SubInt,
        Op::Shl,
        Op::Shr,
        Op::Sar,
        Op::MaskJump(MaskKind::None),
        Op::MaskJump(MaskKind::Full),
        Op::SetRounding(RoundMode::Nearest),
        Op::SetRounding(RoundMode::Down),
        Op::SetRounding(RoundMode::Up),
        Op::SetRounding(RoundMode::Zero),
        Op::ResetRounding,
        Op::Enter,
        Op::SaveRegs,
        Op::LoadRegs,
    ];

    /// Accepted operand shape.
    pub const fn form(self) -> Form {
        match self {
            Op::And
            | Op::Andn
            | Op::Or
            | Op::Orn
            | Op::Xor
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Min
            | Op::Max
            | Op::RcpRefine
            | Op::RsqRefine
            | Op::CmpEq
            | Op::CmpNe
            | Op::CmpLt
            | Op::CmpLe
            | Op::CmpGt
            | Op::CmpGe
            | Op::AddInt
            | Op::SubInt => Form::Binary,
            Op::Mov
            | Op::Sqrt
            | Op::RcpEstimate
            | Op::Rcp
            | Op::RsqEstimate
            | Op::Rsq
            | Op::Round(_)
            | Op::Convert(_)
            | Op::ConvertFromInt => Form::Unary,
            Op::Not | Op::Neg => Form::InPlace,
            Op::Fma | Op::Fms => Form::Ternary,
            Op::Shl | Op::Shr | Op::Sar => Form::Shift,
            Op::MaskJump(_) => Form::Branch,
            Op::SetRounding(_) | Op::ResetRounding | Op::Enter | Op::SaveRegs | Op::LoadRegs => {
                Form::Nullary
            }
        }
    }

    /// `true` when the operation overwrites its second source register.
    ///
    /// The refinement steps consume the original operand as a temporary.
    pub const fn destroys_source(self) -> bool {
        matches!(self, Op::RcpRefine | Op::RsqRefine | Op::Rcp | Op::Rsq)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Mov => "mov",
            Op::And => "and",
            Op::Andn => "andn",
            Op::Or => "or",
            Op::Orn => "orn",
            Op::Xor => "xor",
            Op::Not => "not",
            Op::Neg => "neg",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Min => "min",
            Op::Max => "max",
            Op::Sqrt => "sqrt",
            Op::RcpEstimate => "rcpe",
            Op::RcpRefine => "rcps",
            Op::Rcp => "rcp",
            Op::RsqEstimate => "rsqe",
            Op::RsqRefine => "rsqs",
            Op::Rsq => "rsq",
            Op::Fma => "fma",
            Op::Fms => "fms",
            Op::CmpEq => "ceq",
            Op::CmpNe => "cne",
            Op::CmpLt => "clt",
            Op::CmpLe => "cle",
            Op::CmpGt => "cgt",
            Op::CmpGe => "cge",
            Op::Round(Rounding::Fixed(m)) => return write!(f, "rn{}", m.suffix()),
            Op::Round(Rounding::Current) => "rnd",
            Op::Convert(Rounding::Fixed(m)) => return write!(f, "cv{}", m.suffix()),
            Op::Convert(Rounding::Current) => "cvt",
            Op::ConvertFromInt => "cvi",
            Op::AddInt => "addi",
            Op::SubInt => "subi",
            Op::Shl => "shl",
            Op::Shr => "shr",
            Op::Sar => "sar",
            Op::MaskJump(MaskKind::None) => "mkj.none",
            Op::MaskJump(MaskKind::Full) => "mkj.full",
            Op::SetRounding(m) => return write!(f, "fctrl.{}", m.suffix()),
            Op::ResetRounding => "fctrl.reset",
            Op::Enter => "enter",
            Op::SaveRegs => "sregs.save",
            Op::LoadRegs => "sregs.load",
        };
        f.write_str(name)
    }
}

// ─── Operands & pseudo-op instances ─────────────────────────────────────────

/// One pseudo-op operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Absent.
    #[default]
    None,
    /// Logical SIMD register.
    Reg(VReg),
    /// Memory at base + displacement.
    Mem(MemoryOperand),
    /// Unsigned immediate (shift counts).
    Imm(u32),
    /// Branch target.
    Label(Label),
}

impl From<VReg> for Operand {
    fn from(r: VReg) -> Self {
        Operand::Reg(r)
    }
}

impl From<MemoryOperand> for Operand {
    fn from(m: MemoryOperand) -> Self {
        Operand::Mem(m)
    }
}

impl From<Label> for Operand {
    fn from(l: Label) -> Self {
        Operand::Label(l)
    }
}

impl From<u32> for Operand {
    fn from(v: u32) -> Self {
        Operand::Imm(v)
    }
}

impl From<ShiftCount> for Operand {
    fn from(c: ShiftCount) -> Self {
        match c {
            ShiftCount::Imm(v) => Operand::Imm(v),
            ShiftCount::Mem(m) => Operand::Mem(m),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Mem(m) => write!(f, "{m}"),
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::Label(l) => write!(f, "{l}"),
        }
    }
}

/// A register or memory source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Src {
    Reg(VReg),
    Mem(MemoryOperand),
}

impl From<VReg> for Src {
    fn from(r: VReg) -> Self {
        Src::Reg(r)
    }
}

impl From<MemoryOperand> for Src {
    fn from(m: MemoryOperand) -> Self {
        Src::Mem(m)
    }
}

impl From<Src> for Operand {
    fn from(s: Src) -> Self {
        match s {
            Src::Reg(r) => Operand::Reg(r),
            Src::Mem(m) => Operand::Mem(m),
        }
    }
}

/// Shift count source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftCount {
    /// Immediate count.
    Imm(u32),
    /// Count read from the first element-sized slot at the address.
    Mem(MemoryOperand),
}

impl From<u32> for ShiftCount {
    fn from(v: u32) -> Self {
        ShiftCount::Imm(v)
    }
}

impl From<MemoryOperand> for ShiftCount {
    fn from(m: MemoryOperand) -> Self {
        ShiftCount::Mem(m)
    }
}

/// A pseudo-op with its operands in role order (destination first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PseudoOp {
    /// Operation.
    pub op: Op,
    /// Destination (`G` or `D`), or the tested source for `mkj`.
    pub dst: Operand,
    /// Second source (`S`), shift count, or branch label.
    pub src: Operand,
    /// Third source (`T`) for fused forms.
    pub third: Operand,
}

impl PseudoOp {
    /// Operation without operands.
    pub const fn nullary(op: Op) -> Self {
        Self {
            op,
            dst: Operand::None,
            src: Operand::None,
            third: Operand::None,
        }
    }

    /// Operation with destination and one source.
    pub fn binary(op: Op, dst: impl Into<Operand>, src: impl Into<Operand>) -> Self {
        Self {
            op,
            dst: dst.into(),
            src: src.into(),
            third: Operand::None,
        }
    }

    /// Operation with destination and two sources.
    pub fn ternary(
        op: Op,
        dst: impl Into<Operand>,
        src: impl Into<Operand>,
        third: impl Into<Operand>,
    ) -> Self {
        Self {
            op,
            dst: dst.into(),
            src: src.into(),
            third: third.into(),
        }
    }
}

/// Operands of a pseudo-op after shape checking, in role order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    /// `G, S`.
    Binary { g: VReg, s: Src },
    /// `mov [M], S`.
    Store { m: MemoryOperand, s: VReg },
    /// `D, S`.
    Unary { d: VReg, s: Src },
    /// `G`.
    InPlace { g: VReg },
    /// `G, S, T`.
    Ternary { g: VReg, s: VReg, t: Src },
    /// `G, count`.
    Shift { g: VReg, count: ShiftCount },
    /// `S, label`.
    Branch { s: VReg, target: Label },
    Nullary,
}

impl PseudoOp {
    /// Check operand kinds against the op's [`Form`].
    pub(crate) fn shape(&self) -> Result<Shape, EncodeError> {
        let invalid = |detail: &str| EncodeError::InvalidOperands {
            op: self.op,
            detail: String::from(detail),
        };
        let src = |o: &Operand| match *o {
            Operand::Reg(r) => Ok(Src::Reg(r)),
            Operand::Mem(m) => Ok(Src::Mem(m)),
            _ => Err(invalid("expected register or memory source")),
        };
        let reg = |o: &Operand, role: &str| match *o {
            Operand::Reg(r) => Ok(r),
            _ => Err(invalid(role)),
        };
        let none = |o: &Operand| match o {
            Operand::None => Ok(()),
            _ => Err(invalid("too many operands")),
        };

        let shape = match self.op.form() {
            Form::Binary => {
                none(&self.third)?;
                let g = reg(&self.dst, "destination must be a register")?;
                let s = src(&self.src)?;
                Shape::Binary { g, s }
            }
            Form::Unary => {
                none(&self.third)?;
                match (self.op, self.dst) {
                    (Op::Mov, Operand::Mem(m)) => {
                        let s = reg(&self.src, "store source must be a register")?;
                        Shape::Store { m, s }
                    }
                    _ => {
                        let d = reg(&self.dst, "destination must be a register")?;
                        Shape::Unary { d, s: src(&self.src)? }
                    }
                }
            }
            Form::InPlace => {
                none(&self.src)?;
                none(&self.third)?;
                Shape::InPlace {
                    g: reg(&self.dst, "operand must be a register")?,
                }
            }
            Form::Ternary => Shape::Ternary {
                g: reg(&self.dst, "destination must be a register")?,
                s: reg(&self.src, "second source must be a register")?,
                t: src(&self.third)?,
            },
            Form::Shift => {
                none(&self.third)?;
                let g = reg(&self.dst, "shifted operand must be a register")?;
                let count = match self.src {
                    Operand::Imm(v) => ShiftCount::Imm(v),
                    Operand::Mem(m) => ShiftCount::Mem(m),
                    _ => return Err(invalid("shift count must be an immediate or memory")),
                };
                Shape::Shift { g, count }
            }
            Form::Branch => {
                none(&self.third)?;
                let s = reg(&self.dst, "tested mask must be a register")?;
                let target = match self.src {
                    Operand::Label(l) => l,
                    _ => return Err(invalid("branch target must be a label")),
                };
                Shape::Branch { s, target }
            }
            Form::Nullary => {
                none(&self.dst)?;
                none(&self.src)?;
                none(&self.third)?;
                Shape::Nullary
            }
        };

        if self.op.destroys_source() {
            match shape {
                Shape::Binary { g, s: Src::Reg(s) } | Shape::Unary { d: g, s: Src::Reg(s) } => {
                    if g == s {
                        return Err(invalid("destination and consumed source must differ"));
                    }
                }
                _ => return Err(invalid("consumed source must be a register")),
            }
        }
        Ok(shape)
    }
}

impl fmt::Display for PseudoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        let mut first = true;
        for operand in [&self.dst, &self.src, &self.third] {
            if matches!(operand, Operand::None) {
                continue;
            }
            f.write_str(if first { " " } else { ", " })?;
            write!(f, "{operand}")?;
            first = false;
        }
        Ok(())
    }
}
