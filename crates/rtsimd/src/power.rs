//! Power VSX back end.
//!
//! Vector registers are addressed by VSR number (`vrN` is VSR `32 + N`).
//! Memory operands never appear inside an arithmetic instruction: the
//! address is computed into `TP` by [`addressing::resolve`]'s prelude and
//! the value staged through the memory temporary `v31` with an indexed
//! `lxv*` load. 32-bit Power profiles run every vector operation once per
//! half of a register pair, low half first.

use core::marker::PhantomData;

use crate::addressing::{self, POWER_TP};
use crate::encoder::{d_form, vx, x_form, xx1, xx2, xx3, CodeBuffer, FixupKind};
use crate::error::EncodeError;
use crate::ir::{Label, MaskKind, MemoryOperand, Op, PseudoOp, RoundMode, Rounding, Shape, ShiftCount, Src, VReg};
use crate::profile::{ContextSlot, ElemWidth, ExtLevel, IsaFamily, Profile};
use crate::save_restore::{self, Direction, Spill};
use crate::shim::{self, Shim};

/// Lower one pseudo-op for a Power profile.
pub(crate) fn lower<P: Profile>(buf: &mut CodeBuffer, op: &PseudoOp) -> Result<(), EncodeError> {
    Power::<P>::new(buf).lower(op)
}

// ─── Instruction words ──────────────────────────────────────────────────

/// Single/double precision variants of one VSX opcode.
#[derive(Clone, Copy)]
struct Fp(u32, u32);

const XVADD: Fp = Fp(0xF000_0200, 0xF000_0300);
const XVSUB: Fp = Fp(0xF000_0240, 0xF000_0340);
const XVMUL: Fp = Fp(0xF000_0280, 0xF000_0380);
const XVDIV: Fp = Fp(0xF000_02C0, 0xF000_03C0);
const XVMAX: Fp = Fp(0xF000_0600, 0xF000_0700);
const XVMIN: Fp = Fp(0xF000_0640, 0xF000_0740);
const XVMADDA: Fp = Fp(0xF000_0208, 0xF000_0308);
const XVNMSUBA: Fp = Fp(0xF000_0688, 0xF000_0788);
const XVNMSUBM: Fp = Fp(0xF000_06C8, 0xF000_07C8);
const XVCMPEQ: Fp = Fp(0xF000_0218, 0xF000_0318);
const XVCMPGT: Fp = Fp(0xF000_0258, 0xF000_0358);
const XVCMPGE: Fp = Fp(0xF000_0298, 0xF000_0398);
const XVSQRT: Fp = Fp(0xF000_022C, 0xF000_032C);
const XVRE: Fp = Fp(0xF000_0268, 0xF000_0368);
const XVRSQRTE: Fp = Fp(0xF000_0228, 0xF000_0328);
const XVNEG: Fp = Fp(0xF000_06E4, 0xF000_07E4);
const XVRIZ: Fp = Fp(0xF000_0264, 0xF000_0364);
const XVRIP: Fp = Fp(0xF000_02A4, 0xF000_03A4);
const XVRIM: Fp = Fp(0xF000_02E4, 0xF000_03E4);
const XVRIC: Fp = Fp(0xF000_02AC, 0xF000_03AC);
const XVCVZ: Fp = Fp(0xF000_0260, 0xF000_0760);
const XVCVI: Fp = Fp(0xF000_02E0, 0xF000_07E0);

const XXLAND: u32 = 0xF000_0410;
const XXLANDC: u32 = 0xF000_0450;
const XXLOR: u32 = 0xF000_0490;
const XXLXOR: u32 = 0xF000_04D0;
const XXLNOR: u32 = 0xF000_0510;
const XXLORC: u32 = 0xF000_0550;

const LXVD2X: u32 = 0x7C00_0698;
const STXVD2X: u32 = 0x7C00_0798;
const LXVW4X: u32 = 0x7C00_0618;
const STXVW4X: u32 = 0x7C00_0718;
const LXVDSX: u32 = 0x7C00_0298;

const VADDUWM: u32 = 0x1000_0080;
const VSUBUWM: u32 = 0x1000_0480;
const VADDUDM: u32 = 0x1000_00C0;
const VSUBUDM: u32 = 0x1000_04C0;
const VSLW: u32 = 0x1000_0184;
const VSRW: u32 = 0x1000_0284;
const VSRAW: u32 = 0x1000_0384;
const VSLD: u32 = 0x1000_05C4;
const VSRD: u32 = 0x1000_06C4;
const VSRAD: u32 = 0x1000_03C4;
const VSPLTISW: u32 = 0x1000_038C;
const VSPLTW: u32 = 0x1000_028C;
const VCMPEQUW_DOT: u32 = 0x1000_0486;

const ADDI: u32 = 0x3800_0000;
const LWZ: u32 = 0x8000_0000;
const LD: u32 = 0xE800_0000;
const STD: u32 = 0xF800_0000;
const ADD: u32 = 0x7C00_0214;
const SUBF: u32 = 0x7C00_0050;
const SLD: u32 = 0x7C00_0036;
const SRD: u32 = 0x7C00_0436;
const SRAD: u32 = 0x7C00_0634;
/// `rldicl TI, TI, 0, 58`: keep the low six bits.
const CLRLDI_TI_58: u32 = 0x7B39_06A0;
const BC_TRUE: u32 = 0x4180_0000;
const MTFSFI_7: u32 = 0xFF80_010C;

/// CR6 bits set by a recording vector compare.
const CR6_ALL: u32 = 24;
const CR6_NONE: u32 = 26;

/// GPR scratch for per-lane integer shims.
const TM: u8 = 24;
const TI: u8 = 25;

const fn vr(n: u8) -> u8 {
    32 + n
}

struct Power<'a, P> {
    buf: &'a mut CodeBuffer,
    _profile: PhantomData<P>,
}

impl<'a, P: Profile> Power<'a, P> {
    const PAIRED: bool = P::DESC.is_paired();
    const DP: bool = matches!(P::DESC.elem, ElemWidth::W64);
    const VSX2: bool = matches!(P::DESC.ext, ExtLevel::V2);
    const WIDE_GPR: bool = matches!(P::DESC.family, IsaFamily::Power64);
    const HALVES: usize = if Self::PAIRED { 2 } else { 1 };

    // Reserved registers; must agree with the profile's reserved table.
    const ONES: u8 = if Self::PAIRED { vr(15) } else { vr(25) };
    const PLUS_ONE: u8 = if Self::PAIRED { vr(14) } else { vr(26) };
    const MINUS_HALF: u8 = if Self::PAIRED { vr(30) } else { vr(27) };
    const TMP_C: u8 = if Self::PAIRED { 15 } else { vr(28) };
    const TMP_D: u8 = if Self::PAIRED { 31 } else { vr(29) };
    const MEM_TEMP: u8 = vr(31);

    const LOAD: u32 = if Self::PAIRED { LXVW4X } else { LXVD2X };
    const STORE: u32 = if Self::PAIRED { STXVW4X } else { STXVD2X };

    fn new(buf: &'a mut CodeBuffer) -> Self {
        Self {
            buf,
            _profile: PhantomData,
        }
    }

    fn lower(&mut self, op: &PseudoOp) -> Result<(), EncodeError> {
        let shape = op.shape()?;
        match shim::select(&P::DESC, op.op) {
            None => self.native(op.op, shape),
            Some(Shim::PairSplit) => {
                log::debug!("{}: '{}' split across register pair", P::DESC.id, op.op);
                self.native(op.op, shape)
            }
            Some(s) => {
                log::debug!("{}: '{}' expands via {} shim", P::DESC.id, op.op, s);
                self.shim(s, op.op, shape)
            }
        }
    }

    // ─── Operands ───────────────────────────────────────────────────

    const fn fp(op: Fp) -> u32 {
        if Self::DP {
            op.1
        } else {
            op.0
        }
    }

    fn word(&mut self, w: u32) {
        self.buf.emit_word(w);
    }

    /// VSR number of half `h` of a logical register.
    fn reg(&self, r: VReg, h: usize) -> Result<u8, EncodeError> {
        Ok(P::DESC.regs.pair(r, P::DESC.id)?.half(h))
    }

    /// Compute `m` into `TP`.
    fn addr(&mut self, m: &MemoryOperand) -> Result<(), EncodeError> {
        let a = addressing::resolve(&P::DESC, m)?;
        for w in a.prelude() {
            self.word(*w);
        }
        Ok(())
    }

    fn addr_ctx(&mut self, slot: ContextSlot) -> Result<(), EncodeError> {
        self.addr(&P::DESC.ctx(slot))
    }

    fn load_tp(&mut self, t: u8) {
        self.word(xx1(Self::LOAD, t, 0, POWER_TP));
    }

    fn store_tp(&mut self, s: u8) {
        self.word(xx1(Self::STORE, s, 0, POWER_TP));
    }

    /// Half `h` of a source: the register itself, or memory staged in `v31`.
    fn src(&mut self, s: Src, h: usize) -> Result<u8, EncodeError> {
        match s {
            Src::Reg(r) => self.reg(r, h),
            Src::Mem(m) => {
                self.addr(&m.offset(16 * h as i64))?;
                self.load_tp(Self::MEM_TEMP);
                Ok(Self::MEM_TEMP)
            }
        }
    }

    fn no_rule(op: Op) -> EncodeError {
        EncodeError::NoEncodingRule {
            op,
            profile: P::DESC.id,
        }
    }

    // ─── Native rules ───────────────────────────────────────────────

    fn native(&mut self, op: Op, shape: Shape) -> Result<(), EncodeError> {
        match (op, shape) {
            (Op::Mov, Shape::Unary { d, s }) => {
                for h in 0..Self::HALVES {
                    let d = self.reg(d, h)?;
                    match s {
                        Src::Reg(r) => {
                            let s = self.reg(r, h)?;
                            self.word(xx3(XXLOR, d, s, s));
                        }
                        Src::Mem(m) => {
                            self.addr(&m.offset(16 * h as i64))?;
                            self.load_tp(d);
                        }
                    }
                }
            }
            (Op::Mov, Shape::Store { m, s }) => {
                for h in 0..Self::HALVES {
                    let s = self.reg(s, h)?;
                    self.addr(&m.offset(16 * h as i64))?;
                    self.store_tp(s);
                }
            }
            (Op::Not, Shape::InPlace { g }) => {
                for h in 0..Self::HALVES {
                    let g = self.reg(g, h)?;
                    self.word(xx3(XXLNOR, g, g, g));
                }
            }
            (Op::Neg, Shape::InPlace { g }) => {
                for h in 0..Self::HALVES {
                    let g = self.reg(g, h)?;
                    self.word(xx2(Self::fp(XVNEG), g, g));
                }
            }
            (Op::AddInt | Op::SubInt, Shape::Binary { g, s }) => {
                let base = match (op, Self::PAIRED) {
                    (Op::AddInt, true) => VADDUWM,
                    (_, true) => VSUBUWM,
                    (Op::AddInt, false) => VADDUDM,
                    (_, false) => VSUBUDM,
                };
                for h in 0..Self::HALVES {
                    let s = self.src(s, h)?;
                    let g = self.reg(g, h)?;
                    self.word(vx(base, g, g, s));
                }
            }
            (_, Shape::Binary { g, s }) => {
                for h in 0..Self::HALVES {
                    let s = self.src(s, h)?;
                    let g = self.reg(g, h)?;
                    let w = Self::binary_word(op, g, s).ok_or_else(|| Self::no_rule(op))?;
                    self.word(w);
                }
            }
            (Op::Sqrt | Op::RcpEstimate | Op::RsqEstimate | Op::Round(_) | Op::ConvertFromInt, Shape::Unary { d, s })
            | (Op::Convert(Rounding::Fixed(RoundMode::Zero)), Shape::Unary { d, s }) => {
                let base = match op {
                    Op::Sqrt => Self::fp(XVSQRT),
                    Op::RcpEstimate => Self::fp(XVRE),
                    Op::RsqEstimate => Self::fp(XVRSQRTE),
                    Op::Round(r) => Self::fp(round_opcode(r)),
                    Op::ConvertFromInt => Self::fp(XVCVI),
                    _ => Self::fp(XVCVZ),
                };
                for h in 0..Self::HALVES {
                    let s = self.src(s, h)?;
                    let d = self.reg(d, h)?;
                    self.word(xx2(base, d, s));
                }
            }
            (Op::Fma | Op::Fms, Shape::Ternary { g, s, t }) => {
                let base = Self::fp(if op == Op::Fma { XVMADDA } else { XVNMSUBA });
                for h in 0..Self::HALVES {
                    let t = self.src(t, h)?;
                    let (g, s) = (self.reg(g, h)?, self.reg(s, h)?);
                    self.word(xx3(base, g, s, t));
                }
            }
            (Op::Shl | Op::Shr | Op::Sar, Shape::Shift { g, count }) => self.vector_shift(op, g, count)?,
            (Op::MaskJump(kind), Shape::Branch { s, target }) => self.mask_jump(kind, s, target)?,
            (Op::SetRounding(mode), Shape::Nullary) => {
                let rn = match mode {
                    RoundMode::Nearest => 0,
                    RoundMode::Zero => 1,
                    RoundMode::Up => 2,
                    RoundMode::Down => 3,
                };
                self.word(MTFSFI_7 | (rn << 12));
            }
            (Op::ResetRounding, Shape::Nullary) => self.word(MTFSFI_7),
            (Op::Enter, Shape::Nullary) => self.enter()?,
            (Op::SaveRegs, Shape::Nullary) => save_restore::emit(self, &P::DESC, Direction::Save)?,
            (Op::LoadRegs, Shape::Nullary) => save_restore::emit(self, &P::DESC, Direction::Load)?,
            _ => return Err(Self::no_rule(op)),
        }
        Ok(())
    }

    /// `G = G op S` for the two-operand VSX forms.
    fn binary_word(op: Op, g: u8, s: u8) -> Option<u32> {
        let w = match op {
            Op::And => xx3(XXLAND, g, g, s),
            Op::Andn => xx3(XXLANDC, g, s, g),
            Op::Or => xx3(XXLOR, g, g, s),
            Op::Orn if Self::VSX2 => xx3(XXLORC, g, s, g),
            Op::Xor => xx3(XXLXOR, g, g, s),
            Op::Add => xx3(Self::fp(XVADD), g, g, s),
            Op::Sub => xx3(Self::fp(XVSUB), g, g, s),
            Op::Mul => xx3(Self::fp(XVMUL), g, g, s),
            Op::Div => xx3(Self::fp(XVDIV), g, g, s),
            Op::Min => xx3(Self::fp(XVMIN), g, g, s),
            Op::Max => xx3(Self::fp(XVMAX), g, g, s),
            Op::CmpEq => xx3(Self::fp(XVCMPEQ), g, g, s),
            Op::CmpGt => xx3(Self::fp(XVCMPGT), g, g, s),
            Op::CmpGe => xx3(Self::fp(XVCMPGE), g, g, s),
            // operands swapped: G < S is S > G
            Op::CmpLt => xx3(Self::fp(XVCMPGT), g, s, g),
            Op::CmpLe => xx3(Self::fp(XVCMPGE), g, s, g),
            _ => return None,
        };
        Some(w)
    }

    fn vector_shift(&mut self, op: Op, g: VReg, count: ShiftCount) -> Result<(), EncodeError> {
        let base = match (op, Self::PAIRED) {
            (Op::Shl, true) => VSLW,
            (Op::Shr, true) => VSRW,
            (_, true) => VSRAW,
            (Op::Shl, false) => VSLD,
            (Op::Shr, false) => VSRD,
            (_, false) => VSRAD,
        };
        let v31 = Self::MEM_TEMP;
        match (count, Self::PAIRED) {
            (ShiftCount::Imm(v), true) => {
                let imm = shift_imm::<P>(v)?;
                self.word(VSPLTISW | (u32::from(v31 & 31) << 21) | ((u32::from(imm) & 31) << 16));
            }
            (ShiftCount::Mem(m), true) => {
                self.addr(&m)?;
                self.word(xx1(LXVW4X, v31, 0, POWER_TP));
                self.word(VSPLTW | (u32::from(v31 & 31) << 21) | (u32::from(v31 & 31) << 11));
            }
            (ShiftCount::Imm(v), false) => {
                // vspltisw cannot reach 32..63; splat through memory
                let imm = shift_imm::<P>(v)?;
                self.word(d_form(ADDI, TM, 0, imm as u16));
                self.word(d_form(STD, TM, P::DESC.context.num(), ContextSlot::Scr00.offset() as u16));
                self.addr_ctx(ContextSlot::Scr00)?;
                self.word(xx1(LXVDSX, v31, 0, POWER_TP));
            }
            (ShiftCount::Mem(m), false) => {
                self.addr(&m)?;
                self.word(xx1(LXVDSX, v31, 0, POWER_TP));
            }
        }
        for h in 0..Self::HALVES {
            let g = self.reg(g, h)?;
            self.word(vx(base, g, g, v31));
        }
        Ok(())
    }

    /// Branch when no lane (`None`) or every lane (`Full`) of S is set.
    /// Clobbers `v31` and CR6.
    fn mask_jump(&mut self, kind: MaskKind, s: VReg, target: Label) -> Result<(), EncodeError> {
        let probe = if Self::PAIRED {
            let (lo, hi) = (self.reg(s, 0)?, self.reg(s, 1)?);
            let merge = match kind {
                MaskKind::Full => XXLAND,
                MaskKind::None => XXLOR,
            };
            self.word(xx3(merge, Self::MEM_TEMP, lo, hi));
            Self::MEM_TEMP
        } else {
            self.reg(s, 0)?
        };
        self.word(vx(VCMPEQUW_DOT, Self::MEM_TEMP, probe, Self::ONES));
        let bi = match kind {
            MaskKind::None => CR6_NONE,
            MaskKind::Full => CR6_ALL,
        };
        let at = self.buf.len();
        self.word(BC_TRUE | (bi << 16));
        self.buf.add_fixup(at, target, FixupKind::PowerBc);
        Ok(())
    }

    /// Load the profile's constant registers from the context block.
    fn enter(&mut self) -> Result<(), EncodeError> {
        self.word(d_form(ADDI, 0, 0, 0));
        for r in P::DESC.regs.reserved {
            if let Some(slot) = r.init {
                self.addr_ctx(slot)?;
                self.load_tp(r.phys);
            }
        }
        Ok(())
    }

    // ─── Shims ──────────────────────────────────────────────────────

    fn shim(&mut self, shim: Shim, op: Op, shape: Shape) -> Result<(), EncodeError> {
        match (shim, op, shape) {
            (Shim::FusedRefine, Op::RcpRefine | Op::RsqRefine, Shape::Binary { g, s: Src::Reg(s) })
            | (Shim::FusedRefine, Op::Rcp | Op::Rsq, Shape::Unary { d: g, s: Src::Reg(s) }) => {
                let rsq = matches!(op, Op::RsqRefine | Op::Rsq);
                for h in 0..Self::HALVES {
                    let (g, s) = (self.reg(g, h)?, self.reg(s, h)?);
                    match op {
                        Op::Rcp => self.word(xx2(Self::fp(XVRE), g, s)),
                        Op::Rsq => self.word(xx2(Self::fp(XVRSQRTE), g, s)),
                        _ => {}
                    }
                    if rsq {
                        self.rsq_refine(g, s);
                    } else {
                        self.rcp_refine(g, s);
                    }
                }
            }
            (Shim::CompareNotEqual, Op::CmpNe, Shape::Binary { g, s }) => {
                for h in 0..Self::HALVES {
                    let s = self.src(s, h)?;
                    let g = self.reg(g, h)?;
                    self.word(xx3(Self::fp(XVCMPEQ), g, g, s));
                    self.word(xx3(XXLNOR, g, g, g));
                }
            }
            (Shim::LogicComplement, Op::Orn, Shape::Binary { g, s }) => {
                for h in 0..Self::HALVES {
                    if s == Src::Reg(g) {
                        let g = self.reg(g, h)?;
                        self.word(xx3(XXLOR, g, Self::ONES, Self::ONES));
                    } else {
                        let s = self.src(s, h)?;
                        let g = self.reg(g, h)?;
                        self.word(xx3(XXLNOR, g, g, g));
                        self.word(xx3(XXLOR, g, g, s));
                    }
                }
            }
            (Shim::ConvertWithMode, Op::Convert(r), Shape::Unary { d, s }) => {
                for h in 0..Self::HALVES {
                    let s = self.src(s, h)?;
                    let d = self.reg(d, h)?;
                    self.word(xx2(Self::fp(round_opcode(r)), d, s));
                    self.word(xx2(Self::fp(XVCVZ), d, d));
                }
            }
            (Shim::Int64Scalar, Op::AddInt | Op::SubInt, Shape::Binary { g, s }) => self.scalar_int(op, g, s)?,
            (Shim::Int64Scalar, Op::Shl | Op::Shr | Op::Sar, Shape::Shift { g, count }) => {
                self.scalar_shift(op, g, count)?;
            }
            _ => return Err(Self::no_rule(op)),
        }
        Ok(())
    }

    /// `G = G * (2 - S*G)`, S destroyed.
    fn rcp_refine(&mut self, g: u8, s: u8) {
        self.word(xx3(Self::fp(XVNMSUBM), s, g, Self::PLUS_ONE));
        self.word(xx3(Self::fp(XVMADDA), g, g, s));
    }

    /// `G = G + G * (1 - S*G*G) * 0.5`.
    fn rsq_refine(&mut self, g: u8, s: u8) {
        let (c, d) = (Self::TMP_C, Self::TMP_D);
        self.word(xx3(Self::fp(XVMUL), d, g, g));
        self.word(xx3(Self::fp(XVMUL), c, g, Self::MINUS_HALF));
        self.word(xx3(Self::fp(XVNMSUBM), d, s, Self::PLUS_ONE));
        self.word(xx3(Self::fp(XVNMSUBA), g, d, c));
    }

    /// Spill G to `SCR01`, walk its lanes through `TM`/`TI`, reload.
    fn scalar_lanes(&mut self, g: VReg, mut body: impl FnMut(&mut Self, i64)) -> Result<(), EncodeError> {
        let g = self.reg(g, 0)?;
        let ctx = P::DESC.context.num();
        let lanes = i64::from(P::DESC.lanes());
        for i in 0..lanes {
            let at = (ContextSlot::Scr01.offset() + 8 * i) as u16;
            self.word(d_form(LD, TM, ctx, at));
            body(self, i);
            self.word(d_form(STD, TM, ctx, at));
        }
        self.addr_ctx(ContextSlot::Scr01)?;
        self.load_tp(g);
        Ok(())
    }

    fn spill_scr01(&mut self, g: VReg) -> Result<(), EncodeError> {
        let g = self.reg(g, 0)?;
        self.addr_ctx(ContextSlot::Scr01)?;
        self.store_tp(g);
        Ok(())
    }

    fn scalar_int(&mut self, op: Op, g: VReg, s: Src) -> Result<(), EncodeError> {
        self.spill_scr01(g)?;
        // leave TP pointing at S's lanes
        match s {
            Src::Reg(r) => {
                let r = self.reg(r, 0)?;
                self.addr_ctx(ContextSlot::Scr02)?;
                self.store_tp(r);
            }
            Src::Mem(m) => self.addr(&m)?,
        }
        self.scalar_lanes(g, |e, i| {
            e.word(d_form(LD, TI, POWER_TP, (8 * i) as u16));
            let w = if op == Op::AddInt {
                x_form(ADD, TM, TM, TI)
            } else {
                x_form(SUBF, TM, TI, TM)
            };
            e.word(w);
        })
    }

    fn scalar_shift(&mut self, op: Op, g: VReg, count: ShiftCount) -> Result<(), EncodeError> {
        self.spill_scr01(g)?;
        match count {
            ShiftCount::Imm(v) => {
                let imm = shift_imm::<P>(v)?;
                self.word(d_form(ADDI, TI, 0, imm as u16));
            }
            ShiftCount::Mem(m) => {
                self.addr(&m)?;
                self.word(d_form(LD, TI, POWER_TP, 0));
                // sld/srd see seven bits; vsld/vsrd take the count mod 64
                self.word(CLRLDI_TI_58);
            }
        }
        let base = match op {
            Op::Shl => SLD,
            Op::Shr => SRD,
            _ => SRAD,
        };
        self.scalar_lanes(g, |e, _| e.word(x_form(base, TM, TM, TI)))
    }
}

impl<P: Profile> Spill for Power<'_, P> {
    fn load_area_pointer(&mut self) -> Result<(), EncodeError> {
        let load = if Self::WIDE_GPR { LD } else { LWZ };
        let (scratch, ctx) = (P::DESC.scratch.num(), P::DESC.context.num());
        self.word(d_form(load, scratch, ctx, ContextSlot::Regs.offset() as u16));
        Ok(())
    }

    fn transfer(&mut self, dir: Direction, phys: u8) -> Result<(), EncodeError> {
        let base = match dir {
            Direction::Save => Self::STORE,
            Direction::Load => Self::LOAD,
        };
        self.word(xx1(base, phys, 0, P::DESC.scratch.num()));
        Ok(())
    }

    fn advance(&mut self, bytes: i64) -> Result<(), EncodeError> {
        let imm = i16::try_from(bytes).map_err(|_| EncodeError::ImmediateOutOfRange {
            value: bytes,
            max: i64::from(i16::MAX),
        })?;
        let scratch = P::DESC.scratch.num();
        self.word(d_form(ADDI, scratch, scratch, imm as u16));
        Ok(())
    }
}

/// Round-to-integral opcode. Nearest uses the current mode, which is
/// round-to-nearest outside an `fctrl` block.
fn round_opcode(r: Rounding) -> Fp {
    match r {
        Rounding::Fixed(RoundMode::Zero) => XVRIZ,
        Rounding::Fixed(RoundMode::Up) => XVRIP,
        Rounding::Fixed(RoundMode::Down) => XVRIM,
        Rounding::Fixed(RoundMode::Nearest) | Rounding::Current => XVRIC,
    }
}

fn shift_imm<P: Profile>(v: u32) -> Result<u32, EncodeError> {
    let max = P::DESC.elem.bits() - 1;
    if v > max {
        return Err(EncodeError::ImmediateOutOfRange {
            value: i64::from(v),
            max: i64::from(max),
        });
    }
    Ok(v)
}
