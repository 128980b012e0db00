//! x86 / x86-64 AVX back end.
//!
//! Every logical register is a full `ymm` register. Arithmetic is the
//! destructive two-operand pseudo-op form mapped onto VEX three-operand
//! instructions with `vvvv = G`. 32-bit x86 uses the two-byte VEX prefix
//! whenever the instruction allows it; x86-64 always emits three bytes.
//!
//! Shims address the context block off `ebp/rbp`; see [`crate::shim`] for
//! the catalogue and what each one clobbers.

use core::marker::PhantomData;

use crate::addressing;
use crate::encoder::{emit_legacy, emit_vex, CodeBuffer, FixupKind, InstrBytes, Map, Pp, Rm, VexOp};
use crate::error::EncodeError;
use crate::ir::{MaskKind, MemoryOperand, Op, PseudoOp, RoundMode, Rounding, Shape, ShiftCount, Src, VReg};
use crate::profile::{ContextSlot, ElemWidth, IsaFamily, Profile};
use crate::save_restore::{self, Direction, Spill};
use crate::shim::{self, Shim};

/// Lower one pseudo-op for an x86 profile.
pub(crate) fn lower<P: Profile>(buf: &mut CodeBuffer, op: &PseudoOp) -> Result<(), EncodeError> {
    X86::<P>::new(buf).lower(op)
}

const RCX: u8 = 1;

struct X86<'a, P> {
    buf: &'a mut CodeBuffer,
    _profile: PhantomData<P>,
}

impl<'a, P: Profile> X86<'a, P> {
    const LONG: bool = matches!(P::DESC.family, IsaFamily::X86_64);
    const PD: bool = matches!(P::DESC.elem, ElemWidth::W64);

    fn new(buf: &'a mut CodeBuffer) -> Self {
        Self {
            buf,
            _profile: PhantomData,
        }
    }

    fn lower(&mut self, op: &PseudoOp) -> Result<(), EncodeError> {
        let shape = op.shape()?;
        match shim::select(&P::DESC, op.op) {
            Some(s) => {
                log::debug!("{}: '{}' expands via {} shim", P::DESC.id, op.op, s);
                self.shim(s, op.op, shape)
            }
            None => self.native(op.op, shape),
        }
    }

    // ─── Operands ───────────────────────────────────────────────────

    fn ymm(&self, r: VReg) -> Result<u8, EncodeError> {
        P::DESC.regs.phys(r, P::DESC.id)
    }

    fn mem(&self, m: &MemoryOperand) -> Result<Rm, EncodeError> {
        let a = addressing::resolve(&P::DESC, m)?;
        Ok(Rm::Mem {
            base: a.base,
            disp: a.disp32(),
            mode: a.mode,
        })
    }

    fn ctx(&self, slot: ContextSlot, delta: i64) -> Result<Rm, EncodeError> {
        self.mem(&P::DESC.ctx(slot).offset(delta))
    }

    fn src(&self, s: Src) -> Result<Rm, EncodeError> {
        match s {
            Src::Reg(r) => Ok(Rm::Reg(self.ymm(r)?)),
            Src::Mem(m) => self.mem(&m),
        }
    }

    // ─── Emission ───────────────────────────────────────────────────

    fn vex(&mut self, op: VexOp, l: bool, reg: u8, vvvv: u8, rm: Rm) {
        let mut b = InstrBytes::new();
        emit_vex(&mut b, Self::LONG, op, l, reg, vvvv, rm);
        self.buf.emit(&b);
    }

    fn vex_ib(&mut self, op: VexOp, l: bool, reg: u8, vvvv: u8, rm: Rm, imm: u8) {
        self.vex(op, l, reg, vvvv, rm);
        self.buf.emit(&[imm]);
    }

    fn legacy(&mut self, w: bool, opcode: &[u8], reg: u8, rm: Rm) {
        let mut b = InstrBytes::new();
        emit_legacy(&mut b, Self::LONG, w, opcode, reg, rm);
        self.buf.emit(&b);
    }

    fn legacy_imm(&mut self, w: bool, opcode: &[u8], reg: u8, rm: Rm, imm: &[u8]) {
        self.legacy(w, opcode, reg, rm);
        self.buf.emit(imm);
    }

    const fn fp(opcode: u8) -> VexOp {
        VexOp::new(if Self::PD { Pp::P66 } else { Pp::None }, Map::M0F, opcode)
    }

    const fn int(opcode: u8) -> VexOp {
        VexOp::new(Pp::P66, Map::M0F, opcode)
    }

    fn load(&mut self, d: u8, rm: Rm) {
        self.vex(Self::fp(0x28), true, d, 0, rm);
    }

    fn store(&mut self, rm: Rm, s: u8) {
        self.vex(Self::fp(0x29), true, s, 0, rm);
    }

    fn load128(&mut self, d: u8, rm: Rm) {
        self.vex(Self::fp(0x28), false, d, 0, rm);
    }

    fn store128(&mut self, rm: Rm, s: u8) {
        self.vex(Self::fp(0x29), false, s, 0, rm);
    }

    /// `G = G op rm` on full-width float/logic opcodes.
    fn arith(&mut self, opcode: u8, g: u8, rm: Rm) {
        self.vex(Self::fp(opcode), true, g, g, rm);
    }

    // ─── Native rules ───────────────────────────────────────────────

    fn native(&mut self, op: Op, shape: Shape) -> Result<(), EncodeError> {
        match (op, shape) {
            (Op::Mov, Shape::Unary { d, s }) => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.load(d, rm);
            }
            (Op::Mov, Shape::Store { m, s }) => {
                let (rm, s) = (self.mem(&m)?, self.ymm(s)?);
                self.store(rm, s);
            }
            (
                Op::And | Op::Andn | Op::Or | Op::Xor | Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Min | Op::Max,
                Shape::Binary { g, s },
            ) => {
                let (g, rm) = (self.ymm(g)?, self.src(s)?);
                self.arith(fp_opcode(op), g, rm);
            }
            (Op::Neg, Shape::InPlace { g }) => {
                let (g, sign) = (self.ymm(g)?, self.ctx(ContextSlot::Gpc04, 0)?);
                self.arith(0x57, g, sign);
            }
            (Op::Sqrt, Shape::Unary { d, s }) => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.vex(Self::fp(0x51), true, d, 0, rm);
            }
            (Op::RcpEstimate | Op::RsqEstimate, Shape::Unary { d, s }) if !Self::PD => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                let opcode = if op == Op::RcpEstimate { 0x53 } else { 0x52 };
                self.vex(Self::fp(opcode), true, d, 0, rm);
            }
            (Op::Fma | Op::Fms, Shape::Ternary { g, s, t }) => {
                let (g, s, rm) = (self.ymm(g)?, self.ymm(s)?, self.src(t)?);
                let opcode = if op == Op::Fma { 0xB8 } else { 0xBC };
                self.vex(VexOp::new(Pp::P66, Map::M0F38, opcode).w(Self::PD), true, g, s, rm);
            }
            (Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe, Shape::Binary { g, s }) => {
                let (g, rm) = (self.ymm(g)?, self.src(s)?);
                self.vex_ib(Self::fp(0xC2), true, g, g, rm, compare_predicate(op));
            }
            (Op::Round(r), Shape::Unary { d, s }) => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.round(d, rm, r);
            }
            (Op::Convert(Rounding::Fixed(RoundMode::Zero)), Shape::Unary { d, s }) if !Self::PD => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.vex(VexOp::new(Pp::PF3, Map::M0F, 0x5B), true, d, 0, rm);
            }
            (Op::Convert(Rounding::Current), Shape::Unary { d, s }) if !Self::PD => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.vex(VexOp::new(Pp::P66, Map::M0F, 0x5B), true, d, 0, rm);
            }
            (Op::ConvertFromInt, Shape::Unary { d, s }) if !Self::PD => {
                let (d, rm) = (self.ymm(d)?, self.src(s)?);
                self.vex(VexOp::new(Pp::None, Map::M0F, 0x5B), true, d, 0, rm);
            }
            (Op::AddInt | Op::SubInt, Shape::Binary { g, s }) => {
                let (g, rm) = (self.ymm(g)?, self.src(s)?);
                self.vex(Self::int(int_opcode(op, Self::PD)), true, g, g, rm);
            }
            (Op::Shl | Op::Shr | Op::Sar, Shape::Shift { g, count }) => {
                let g = self.ymm(g)?;
                self.shift(op, g, count, true)?;
            }
            (Op::MaskJump(kind), Shape::Branch { s, target }) => {
                let s = self.ymm(s)?;
                self.mask_jump(kind, s, target);
            }
            (Op::SetRounding(mode), Shape::Nullary) => {
                let image = self.ctx(ContextSlot::Fctrl, 4 * mxcsr_index(mode))?;
                self.vex(VexOp::new(Pp::None, Map::M0F, 0xAE), false, 2, 0, image);
            }
            (Op::ResetRounding, Shape::Nullary) => {
                let image = self.ctx(ContextSlot::Fctrl, 0)?;
                self.vex(VexOp::new(Pp::None, Map::M0F, 0xAE), false, 2, 0, image);
            }
            // x86 keeps its constants in the context block.
            (Op::Enter, Shape::Nullary) => {}
            (Op::SaveRegs, Shape::Nullary) => save_restore::emit(self, &P::DESC, Direction::Save)?,
            (Op::LoadRegs, Shape::Nullary) => save_restore::emit(self, &P::DESC, Direction::Load)?,
            _ => {
                return Err(EncodeError::NoEncodingRule {
                    op,
                    profile: P::DESC.id,
                })
            }
        }
        Ok(())
    }

    fn round(&mut self, d: u8, rm: Rm, r: Rounding) {
        let opcode = if Self::PD { 0x09 } else { 0x08 };
        let imm = match r {
            Rounding::Fixed(RoundMode::Nearest) => 0,
            Rounding::Fixed(RoundMode::Down) => 1,
            Rounding::Fixed(RoundMode::Up) => 2,
            Rounding::Fixed(RoundMode::Zero) => 3,
            Rounding::Current => 4,
        };
        self.vex_ib(VexOp::new(Pp::P66, Map::M0F3A, opcode), true, d, 0, rm, imm);
    }

    fn shift(&mut self, op: Op, g: u8, count: ShiftCount, l: bool) -> Result<(), EncodeError> {
        let (digit, by_mem) = match op {
            Op::Shl => (6, if Self::PD { 0xF3 } else { 0xF2 }),
            Op::Shr => (2, if Self::PD { 0xD3 } else { 0xD2 }),
            Op::Sar if !Self::PD => (4, 0xE2),
            _ => {
                return Err(EncodeError::NoEncodingRule {
                    op,
                    profile: P::DESC.id,
                })
            }
        };
        match count {
            ShiftCount::Imm(v) => {
                let imm = shift_imm::<P>(v)?;
                let by_imm = if Self::PD { 0x73 } else { 0x72 };
                self.vex_ib(Self::int(by_imm), l, digit, g, Rm::Reg(g), imm);
            }
            ShiftCount::Mem(m) => {
                let rm = self.mem(&m)?;
                self.vex(Self::int(by_mem), l, g, g, rm);
            }
        }
        Ok(())
    }

    fn mask_jump(&mut self, kind: MaskKind, s: u8, target: crate::ir::Label) {
        // vmovmskps/pd eax, S
        self.vex(Self::fp(0x50), true, P::DESC.scratch.num(), 0, Rm::Reg(s));
        let expect: u32 = match kind {
            MaskKind::None => 0,
            MaskKind::Full => (1u32 << P::DESC.lanes()) - 1,
        };
        // cmp eax, imm32
        self.buf.emit(&[0x3D]);
        self.buf.emit(&expect.to_le_bytes());
        // je rel32
        self.buf.emit(&[0x0F, 0x84, 0, 0, 0, 0]);
        let at = self.buf.len() - 4;
        self.buf.add_fixup(at, target, FixupKind::Rel32);
    }

    // ─── Shims ──────────────────────────────────────────────────────

    fn shim(&mut self, shim: Shim, op: Op, shape: Shape) -> Result<(), EncodeError> {
        match (shim, op, shape) {
            (Shim::LogicComplement, Op::Not, Shape::InPlace { g }) => {
                let (g, ones) = (self.ymm(g)?, self.ctx(ContextSlot::Gpc05, 0)?);
                self.arith(0x55, g, ones);
            }
            (Shim::LogicComplement, Op::Orn, Shape::Binary { g, s }) => {
                let ones = self.ctx(ContextSlot::Gpc05, 0)?;
                if s == Src::Reg(g) {
                    let g = self.ymm(g)?;
                    self.load(g, ones);
                } else {
                    let (g, rm) = (self.ymm(g)?, self.src(s)?);
                    self.arith(0x55, g, ones);
                    self.arith(0x56, g, rm);
                }
            }
            (Shim::NewtonRaphson, Op::RcpRefine, Shape::Binary { g, s: Src::Reg(s) }) => {
                let (g, s) = (self.ymm(g)?, self.ymm(s)?);
                self.rcp_refine(g, s);
            }
            (Shim::NewtonRaphson, Op::Rcp, Shape::Unary { d, s: Src::Reg(s) }) => {
                let (d, s) = (self.ymm(d)?, self.ymm(s)?);
                self.vex(Self::fp(0x53), true, d, 0, Rm::Reg(s));
                self.rcp_refine(d, s);
            }
            (Shim::NewtonRaphson, Op::RsqRefine, Shape::Binary { g, s: Src::Reg(s) }) => {
                let (g, s) = (self.ymm(g)?, self.ymm(s)?);
                self.rsq_refine(g, s)?;
            }
            (Shim::NewtonRaphson, Op::Rsq, Shape::Unary { d, s: Src::Reg(s) }) => {
                let (d, s) = (self.ymm(d)?, self.ymm(s)?);
                self.vex(Self::fp(0x52), true, d, 0, Rm::Reg(s));
                self.rsq_refine(d, s)?;
            }
            (Shim::DivideEstimate, Op::RcpEstimate | Op::Rcp, Shape::Unary { d, s }) => {
                self.divide_estimate(d, s, false)?;
            }
            (Shim::DivideEstimate, Op::RsqEstimate | Op::Rsq, Shape::Unary { d, s }) => {
                self.divide_estimate(d, s, true)?;
            }
            // The estimate is already exact.
            (Shim::DivideEstimate, Op::RcpRefine | Op::RsqRefine, Shape::Binary { .. }) => {}
            (Shim::UnfusedFma, Op::Fma | Op::Fms, Shape::Ternary { g, s, t }) => {
                self.unfused_fma(op == Op::Fms, g, s, t)?;
            }
            (Shim::ConvertWithMode, Op::Convert(r), Shape::Unary { d, s }) => {
                let (dp, rm) = (self.ymm(d)?, self.src(s)?);
                self.round(dp, rm, r);
                self.convert_zero(d, Src::Reg(d))?;
            }
            (Shim::X87Convert, Op::Convert(Rounding::Fixed(RoundMode::Zero)), Shape::Unary { d, s }) => {
                self.x87_truncate(d, s)?;
            }
            (Shim::X87Convert, Op::ConvertFromInt, Shape::Unary { d, s }) => {
                self.x87_from_int(d, s)?;
            }
            (Shim::IntSplit256, Op::AddInt | Op::SubInt, Shape::Binary { g, s }) => {
                self.split_int(int_opcode(op, Self::PD), g, s)?;
            }
            (Shim::IntSplit256, Op::Shl | Op::Shr | Op::Sar, Shape::Shift { g, count }) => {
                self.split_shift(op, g, count)?;
            }
            (Shim::Sar64Scalar, Op::Sar, Shape::Shift { g, count }) => {
                self.scalar_sar(g, count)?;
            }
            _ => {
                return Err(EncodeError::NoEncodingRule {
                    op,
                    profile: P::DESC.id,
                })
            }
        }
        Ok(())
    }

    /// `G = G * (2 - S*G)`, S destroyed.
    fn rcp_refine(&mut self, g: u8, s: u8) {
        self.arith(0x59, s, Rm::Reg(g));
        self.arith(0x59, s, Rm::Reg(g));
        self.arith(0x58, g, Rm::Reg(g));
        self.arith(0x5C, g, Rm::Reg(s));
    }

    /// `G = G * (3 - S*G*G) * 0.5`, S destroyed.
    fn rsq_refine(&mut self, g: u8, s: u8) -> Result<(), EncodeError> {
        let (three, minus_half) = (self.ctx(ContextSlot::Gpc03, 0)?, self.ctx(ContextSlot::Gpc02, 0)?);
        self.arith(0x59, s, Rm::Reg(g));
        self.arith(0x59, s, Rm::Reg(g));
        self.arith(0x5C, s, three);
        self.arith(0x59, s, minus_half);
        self.arith(0x59, g, Rm::Reg(s));
        Ok(())
    }

    /// Exact `1/S` or `1/sqrt(S)` by division from the `+1.0` constant.
    fn divide_estimate(&mut self, d: VReg, s: Src, sqrt: bool) -> Result<(), EncodeError> {
        let (dp, one, scr) = (self.ymm(d)?, self.ctx(ContextSlot::Gpc01, 0)?, self.ctx(ContextSlot::Scr01, 0)?);
        let divisor = if sqrt {
            let rm = self.src(s)?;
            self.vex(Self::fp(0x51), true, dp, 0, rm);
            self.store(scr, dp);
            scr
        } else if s == Src::Reg(d) {
            self.store(scr, dp);
            scr
        } else {
            self.src(s)?
        };
        self.load(dp, one);
        self.arith(0x5E, dp, divisor);
        Ok(())
    }

    /// Multiply then accumulate, rounding twice.
    fn unfused_fma(&mut self, subtract: bool, g: VReg, s: VReg, t: Src) -> Result<(), EncodeError> {
        let scr = self.ctx(ContextSlot::Scr01, 0)?;
        let (gp, sp, rm) = (self.ymm(g)?, self.ymm(s)?, self.src(t)?);
        if g == s {
            self.store(scr, gp);
            self.arith(0x59, gp, rm);
            if subtract {
                let sign = self.ctx(ContextSlot::Gpc04, 0)?;
                self.arith(0x57, gp, sign);
            }
            self.arith(0x58, gp, scr);
        } else {
            self.store(scr, sp);
            self.arith(0x59, sp, rm);
            self.arith(if subtract { 0x5C } else { 0x58 }, gp, Rm::Reg(sp));
            self.load(sp, scr);
        }
        Ok(())
    }

    fn convert_zero(&mut self, d: VReg, s: Src) -> Result<(), EncodeError> {
        if Self::PD {
            self.x87_truncate(d, s)
        } else {
            let (dp, rm) = (self.ymm(d)?, self.src(s)?);
            self.vex(VexOp::new(Pp::PF3, Map::M0F, 0x5B), true, dp, 0, rm);
            Ok(())
        }
    }

    /// Base of the per-lane x87 source: S itself when in memory, else S spilled to SCR01.
    fn lanes_from(&mut self, s: Src) -> Result<MemoryOperand, EncodeError> {
        match s {
            Src::Mem(m) => Ok(m),
            Src::Reg(r) => {
                let (scr, rp) = (self.ctx(ContextSlot::Scr01, 0)?, self.ymm(r)?);
                self.store(scr, rp);
                Ok(P::DESC.ctx(ContextSlot::Scr01))
            }
        }
    }

    fn x87_truncate(&mut self, d: VReg, s: Src) -> Result<(), EncodeError> {
        let src = self.lanes_from(s)?;
        for i in 0..i64::from(P::DESC.lanes()) {
            let lane = self.mem(&src.offset(8 * i))?;
            let out = self.ctx(ContextSlot::Scr01, 8 * i)?;
            // fld qword ; fisttp qword
            self.legacy(false, &[0xDD], 0, lane);
            self.legacy(false, &[0xDD], 1, out);
        }
        let (dp, scr) = (self.ymm(d)?, self.ctx(ContextSlot::Scr01, 0)?);
        self.load(dp, scr);
        Ok(())
    }

    /// int64 → f64 per lane through x87, with the x87 rounding control
    /// copied from MXCSR for the duration.
    fn x87_from_int(&mut self, d: VReg, s: Src) -> Result<(), EncodeError> {
        let saved_cw = self.ctx(ContextSlot::Scr00, 0)?;
        let cw = self.ctx(ContextSlot::Scr02, 0)?;
        self.legacy(false, &[0xD9], 7, saved_cw); // fnstcw
        self.vex(VexOp::new(Pp::None, Map::M0F, 0xAE), false, 3, 0, cw); // vstmxcsr
        self.legacy_imm(false, &[0xC1], 5, cw, &[3]); // shr dword, 3
        self.legacy_imm(false, &[0x81], 4, cw, &0x0C00u32.to_le_bytes()); // and dword
        self.legacy_imm(false, &[0x81], 1, cw, &0x037Fu32.to_le_bytes()); // or dword
        self.legacy(false, &[0xD9], 5, cw); // fldcw

        let src = self.lanes_from(s)?;
        for i in 0..i64::from(P::DESC.lanes()) {
            let lane = self.mem(&src.offset(8 * i))?;
            let out = self.ctx(ContextSlot::Scr01, 8 * i)?;
            // fild qword ; fstp qword
            self.legacy(false, &[0xDF], 5, lane);
            self.legacy(false, &[0xDD], 3, out);
        }
        self.legacy(false, &[0xD9], 5, saved_cw);

        let (dp, scr) = (self.ymm(d)?, self.ctx(ContextSlot::Scr01, 0)?);
        self.load(dp, scr);
        Ok(())
    }

    /// 256-bit integer op as two 128-bit ops. G is rebuilt in SCR01.
    fn split_int(&mut self, opcode: u8, g: VReg, s: Src) -> Result<(), EncodeError> {
        let gp = self.ymm(g)?;
        let lo = self.ctx(ContextSlot::Scr01, 0)?;
        let hi = self.ctx(ContextSlot::Scr01, 16)?;
        self.store(lo, gp);
        match s {
            Src::Reg(r) if r != g => {
                let sp = self.ymm(r)?;
                self.vex(Self::int(opcode), false, gp, gp, Rm::Reg(sp));
                self.store128(lo, gp);
                self.load128(gp, hi);
                self.swap_halves(sp);
                self.vex(Self::int(opcode), false, gp, gp, Rm::Reg(sp));
                self.swap_halves(sp);
            }
            _ => {
                let copy_lo = self.ctx(ContextSlot::Scr02, 0)?;
                let copy_hi = self.ctx(ContextSlot::Scr02, 16)?;
                if let Src::Mem(m) = s {
                    let rm = self.mem(&m)?;
                    self.load(gp, rm);
                }
                self.store(copy_lo, gp);
                self.load128(gp, lo);
                self.vex(Self::int(opcode), false, gp, gp, copy_lo);
                self.store128(lo, gp);
                self.load128(gp, hi);
                self.vex(Self::int(opcode), false, gp, gp, copy_hi);
            }
        }
        self.store128(hi, gp);
        self.load(gp, lo);
        Ok(())
    }

    /// vperm2f128 S, S, S, 1
    fn swap_halves(&mut self, s: u8) {
        self.vex_ib(VexOp::new(Pp::P66, Map::M0F3A, 0x06), true, s, s, Rm::Reg(s), 0x01);
    }

    fn split_shift(&mut self, op: Op, g: VReg, count: ShiftCount) -> Result<(), EncodeError> {
        let gp = self.ymm(g)?;
        let lo = self.ctx(ContextSlot::Scr01, 0)?;
        let hi = self.ctx(ContextSlot::Scr01, 16)?;
        self.store(lo, gp);
        self.shift(op, gp, count, false)?;
        self.store128(lo, gp);
        self.load128(gp, hi);
        self.shift(op, gp, count, false)?;
        self.store128(hi, gp);
        self.load(gp, lo);
        Ok(())
    }

    /// Arithmetic right shift of 64-bit lanes, one scalar `sar` per lane.
    fn scalar_sar(&mut self, g: VReg, count: ShiftCount) -> Result<(), EncodeError> {
        let gp = self.ymm(g)?;
        let scr = self.ctx(ContextSlot::Scr01, 0)?;
        self.store(scr, gp);
        match count {
            ShiftCount::Imm(v) => {
                let imm = shift_imm::<P>(v)?;
                for i in 0..i64::from(P::DESC.lanes()) {
                    let lane = self.ctx(ContextSlot::Scr01, 8 * i)?;
                    self.legacy_imm(true, &[0xC1], 7, lane, &[imm]);
                }
            }
            ShiftCount::Mem(m) => {
                // push moves rsp under an rsp-based count
                let m = if m.base.num() == 4 { m.offset(8) } else { m };
                let rm = self.mem(&m)?;
                self.buf.emit(&[0x51]); // push rcx
                self.legacy(true, &[0x8B], RCX, rm);
                for i in 0..i64::from(P::DESC.lanes()) {
                    let lane = self.ctx(ContextSlot::Scr01, 8 * i)?;
                    self.legacy(true, &[0xD3], 7, lane);
                }
                self.buf.emit(&[0x59]); // pop rcx
            }
        }
        self.load(gp, scr);
        Ok(())
    }
}

impl<P: Profile> Spill for X86<'_, P> {
    fn load_area_pointer(&mut self) -> Result<(), EncodeError> {
        let regs = self.ctx(ContextSlot::Regs, 0)?;
        self.legacy(Self::LONG, &[0x8B], P::DESC.scratch.num(), regs);
        Ok(())
    }

    fn transfer(&mut self, dir: Direction, phys: u8) -> Result<(), EncodeError> {
        let at = Rm::Mem {
            base: P::DESC.scratch.num(),
            disp: 0,
            mode: crate::ir::AddrMode::Inline,
        };
        match dir {
            Direction::Save => self.store(at, phys),
            Direction::Load => self.load(phys, at),
        }
        Ok(())
    }

    fn advance(&mut self, bytes: i64) -> Result<(), EncodeError> {
        let scratch = Rm::Reg(P::DESC.scratch.num());
        match i8::try_from(bytes) {
            Ok(imm) => self.legacy_imm(Self::LONG, &[0x83], 0, scratch, &[imm as u8]),
            Err(_) => {
                let imm = i32::try_from(bytes).map_err(|_| EncodeError::ImmediateOutOfRange {
                    value: bytes,
                    max: i64::from(i32::MAX),
                })?;
                self.legacy_imm(Self::LONG, &[0x81], 0, scratch, &imm.to_le_bytes());
            }
        }
        Ok(())
    }
}

// ─── Opcode tables ──────────────────────────────────────────────────────

fn fp_opcode(op: Op) -> u8 {
    match op {
        Op::And => 0x54,
        Op::Andn => 0x55,
        Op::Or => 0x56,
        Op::Xor => 0x57,
        Op::Add => 0x58,
        Op::Mul => 0x59,
        Op::Sub => 0x5C,
        Op::Min => 0x5D,
        Op::Div => 0x5E,
        _ => 0x5F,
    }
}

fn int_opcode(op: Op, quad: bool) -> u8 {
    match (op, quad) {
        (Op::AddInt, false) => 0xFE,
        (Op::AddInt, true) => 0xD4,
        (_, false) => 0xFA,
        (_, true) => 0xFB,
    }
}

/// `vcmpps` predicate. Only not-equal is true on a NaN lane, matching
/// the ordered `xvcmp*` compares on Power.
fn compare_predicate(op: Op) -> u8 {
    match op {
        Op::CmpEq => 0x00,
        Op::CmpLt => 0x01,
        Op::CmpLe => 0x02,
        Op::CmpNe => 0x04,
        Op::CmpGe => 0x1D,
        _ => 0x1E,
    }
}

/// Index of a rounding mode's MXCSR image in the `FCTRL` slot.
fn mxcsr_index(mode: RoundMode) -> i64 {
    match mode {
        RoundMode::Nearest => 0,
        RoundMode::Down => 1,
        RoundMode::Up => 2,
        RoundMode::Zero => 3,
    }
}

fn shift_imm<P: Profile>(v: u32) -> Result<u8, EncodeError> {
    let max = P::DESC.elem.bits() - 1;
    if v > max {
        return Err(EncodeError::ImmediateOutOfRange {
            value: i64::from(v),
            max: i64::from(max),
        });
    }
    Ok(v as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GpReg, Label, Operand, XMM0, XMM1, XMM2, XMM3, XMM8, XMM9};
    use crate::profile::*;
    use alloc::vec::Vec;

    fn enc<P: Profile>(op: PseudoOp) -> Vec<u8> {
        let mut buf = CodeBuffer::new();
        lower::<P>(&mut buf, &op).unwrap();
        buf.bytes().to_vec()
    }

    fn err<P: Profile>(op: PseudoOp) -> EncodeError {
        let mut buf = CodeBuffer::new();
        lower::<P>(&mut buf, &op).unwrap_err()
    }

    fn rbp(disp: i64) -> MemoryOperand {
        MemoryOperand::new(GpReg::EBP, disp)
    }

    // ─── Native rules ───────────────────────────────────────────────

    #[cfg(feature = "x86_64")]
    #[test]
    fn add_ps_rr_three_byte_prefix() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(Op::Add, XMM0, XMM1));
        assert_eq!(out, [0xC4, 0xE1, 0x7C, 0x58, 0xC1]);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn add_ps_rr_two_byte_prefix_on_x86() {
        let out = enc::<X86Avx1F32>(PseudoOp::binary(Op::Add, XMM2, XMM3));
        assert_eq!(out, [0xC5, 0xEC, 0x58, 0xD3]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn add_ps_memory_disp8_and_disp32() {
        let out = enc::<X64Avx2F32>(PseudoOp::binary(Op::Add, XMM0, rbp(0x40)));
        assert_eq!(out, [0xC4, 0xE1, 0x7C, 0x58, 0x45, 0x40]);
        let out = enc::<X64Avx2F32>(PseudoOp::binary(Op::Add, XMM0, rbp(0x80)));
        assert_eq!(out, [0xC4, 0xE1, 0x7C, 0x58, 0x85, 0x80, 0x00, 0x00, 0x00]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn extended_registers() {
        let out = enc::<X64Avx2F64>(PseudoOp::binary(Op::Mul, XMM9, XMM8));
        // vmulpd ymm9, ymm9, ymm8
        assert_eq!(out, [0xC4, 0x41, 0x35, 0x59, 0xC8]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn fma_native_on_avx2() {
        let out = enc::<X64Avx2F64>(PseudoOp::ternary(Op::Fma, XMM1, XMM2, XMM3));
        assert_eq!(out, [0xC4, 0xE2, 0xED, 0xB8, 0xCB]);
        let out = enc::<X64Avx2F32>(PseudoOp::ternary(Op::Fms, XMM1, XMM2, XMM3));
        assert_eq!(out, [0xC4, 0xE2, 0x6D, 0xBC, 0xCB]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn compare_predicates() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(Op::CmpLt, XMM0, XMM1));
        assert_eq!(out, [0xC4, 0xE1, 0x7C, 0xC2, 0xC1, 0x01]);
        let out = enc::<X64Avx1F32>(PseudoOp::binary(Op::CmpGt, XMM0, XMM1));
        assert_eq!(out[5], 0x1E);
        let out = enc::<X64Avx2F64>(PseudoOp::binary(Op::CmpGe, XMM0, XMM1));
        assert_eq!(out[5], 0x1D);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn round_toward_zero() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(
            Op::Round(Rounding::Fixed(RoundMode::Zero)),
            XMM0,
            XMM1,
        ));
        assert_eq!(out, [0xC4, 0xE3, 0x7D, 0x08, 0xC1, 0x03]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn integer_add_and_shift_on_avx2() {
        let out = enc::<X64Avx2F32>(PseudoOp::binary(Op::AddInt, XMM0, XMM1));
        assert_eq!(out, [0xC4, 0xE1, 0x7D, 0xFE, 0xC1]);
        let out = enc::<X64Avx2F32>(PseudoOp::binary(Op::Shl, XMM2, Operand::Imm(5)));
        assert_eq!(out, [0xC4, 0xE1, 0x6D, 0x72, 0xF2, 0x05]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn shift_count_out_of_range() {
        let e = err::<X64Avx2F32>(PseudoOp::binary(Op::Shr, XMM2, Operand::Imm(32)));
        assert_eq!(e, EncodeError::ImmediateOutOfRange { value: 32, max: 31 });
        assert!(matches!(
            err::<X64Avx2F64>(PseudoOp::binary(Op::Sar, XMM2, Operand::Imm(64))),
            EncodeError::ImmediateOutOfRange { max: 63, .. }
        ));
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn rounding_control() {
        let out = enc::<X64Avx1F32>(PseudoOp::nullary(Op::SetRounding(RoundMode::Zero)));
        assert_eq!(out, [0xC4, 0xE1, 0x78, 0xAE, 0x55, 0x0C]);
        let out = enc::<X64Avx1F32>(PseudoOp::nullary(Op::ResetRounding));
        assert_eq!(out, [0xC4, 0xE1, 0x78, 0xAE, 0x55, 0x00]);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn rounding_control_x86() {
        let out = enc::<X86Avx2F32>(PseudoOp::nullary(Op::SetRounding(RoundMode::Up)));
        assert_eq!(out, [0xC5, 0xF8, 0xAE, 0x55, 0x08]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn mask_jump_full() {
        let mut buf = CodeBuffer::new();
        let l = buf.new_label();
        lower::<X64Avx1F32>(&mut buf, &PseudoOp::binary(Op::MaskJump(MaskKind::Full), XMM0, l)).unwrap();
        buf.bind(l).unwrap();
        let out = buf.finish().unwrap();
        assert_eq!(
            out,
            [0xC4, 0xE1, 0x7C, 0x50, 0xC0, 0x3D, 0xFF, 0, 0, 0, 0x0F, 0x84, 0, 0, 0, 0]
        );
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn mask_jump_f64_lanes() {
        let out = enc::<X64Avx2F64>(PseudoOp::binary(Op::MaskJump(MaskKind::Full), XMM1, Label(0)));
        // vmovmskpd eax, ymm1 ; cmp eax, 0xF
        assert_eq!(&out[..10], &[0xC4, 0xE1, 0x7D, 0x50, 0xC1, 0x3D, 0x0F, 0, 0, 0]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn store_form() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(Op::Mov, rbp(0xC0), XMM1));
        assert_eq!(out, [0xC4, 0xE1, 0x7C, 0x29, 0x8D, 0xC0, 0, 0, 0]);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn enter_is_empty_on_x86() {
        assert!(enc::<X86Avx1F32>(PseudoOp::nullary(Op::Enter)).is_empty());
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn register_out_of_range() {
        let e = err::<X64Avx1F32>(PseudoOp::binary(Op::Add, VReg(16), XMM0));
        assert!(matches!(e, EncodeError::RegisterOutOfRange { reg: 16, limit: 16, .. }));
    }

    #[cfg(feature = "x86")]
    #[test]
    fn x86_has_eight_registers() {
        let e = err::<X86Avx1F32>(PseudoOp::binary(Op::Add, XMM8, XMM0));
        assert!(matches!(e, EncodeError::RegisterOutOfRange { reg: 8, limit: 8, .. }));
    }

    // ─── Shims ──────────────────────────────────────────────────────

    #[cfg(feature = "x86_64")]
    #[test]
    fn unfused_fma_on_avx1() {
        let out = enc::<X64Avx1F32>(PseudoOp::ternary(Op::Fma, XMM0, XMM1, XMM2));
        let expected: &[u8] = &[
            0xC4, 0xE1, 0x7C, 0x29, 0x8D, 0xC0, 0, 0, 0, // vmovaps [rbp+0xc0], ymm1
            0xC4, 0xE1, 0x74, 0x59, 0xCA, // vmulps ymm1, ymm1, ymm2
            0xC4, 0xE1, 0x7C, 0x58, 0xC1, // vaddps ymm0, ymm0, ymm1
            0xC4, 0xE1, 0x7C, 0x28, 0x8D, 0xC0, 0, 0, 0, // vmovaps ymm1, [rbp+0xc0]
        ];
        assert_eq!(out, expected);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn rcp_refine_sequence() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(Op::RcpRefine, XMM0, XMM1));
        let expected: &[u8] = &[
            0xC4, 0xE1, 0x74, 0x59, 0xC8, // vmulps ymm1, ymm1, ymm0
            0xC4, 0xE1, 0x74, 0x59, 0xC8, // vmulps ymm1, ymm1, ymm0
            0xC4, 0xE1, 0x7C, 0x58, 0xC0, // vaddps ymm0, ymm0, ymm0
            0xC4, 0xE1, 0x7C, 0x5C, 0xC1, // vsubps ymm0, ymm0, ymm1
        ];
        assert_eq!(out, expected);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn refine_is_empty_for_exact_f64_estimate() {
        assert!(enc::<X64Avx1F64>(PseudoOp::binary(Op::RsqRefine, XMM0, XMM1)).is_empty());
        assert!(!enc::<X64Avx1F64>(PseudoOp::binary(Op::RcpEstimate, XMM0, XMM1)).is_empty());
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn convert_with_mode_rounds_first() {
        let out = enc::<X64Avx1F32>(PseudoOp::binary(
            Op::Convert(Rounding::Fixed(RoundMode::Up)),
            XMM0,
            XMM1,
        ));
        let expected: &[u8] = &[
            0xC4, 0xE3, 0x7D, 0x08, 0xC1, 0x02, // vroundps ymm0, ymm1, 2
            0xC4, 0xE1, 0x7E, 0x5B, 0xC0, // vcvttps2dq ymm0, ymm0
        ];
        assert_eq!(out, expected);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn split_integer_add_on_avx1() {
        let out = enc::<X86Avx1F32>(PseudoOp::binary(Op::AddInt, XMM0, XMM1));
        let expected: &[u8] = &[
            0xC5, 0xFC, 0x29, 0x85, 0xC0, 0, 0, 0, // vmovaps [ebp+0xc0], ymm0
            0xC5, 0xF9, 0xFE, 0xC1, // vpaddd xmm0, xmm0, xmm1
            0xC5, 0xF8, 0x29, 0x85, 0xC0, 0, 0, 0, // vmovaps [ebp+0xc0], xmm0
            0xC5, 0xF8, 0x28, 0x85, 0xD0, 0, 0, 0, // vmovaps xmm0, [ebp+0xd0]
            0xC4, 0xE3, 0x75, 0x06, 0xC9, 0x01, // vperm2f128 ymm1, ymm1, ymm1, 1
            0xC5, 0xF9, 0xFE, 0xC1, // vpaddd xmm0, xmm0, xmm1
            0xC4, 0xE3, 0x75, 0x06, 0xC9, 0x01, // vperm2f128 ymm1, ymm1, ymm1, 1
            0xC5, 0xF8, 0x29, 0x85, 0xD0, 0, 0, 0, // vmovaps [ebp+0xd0], xmm0
            0xC5, 0xFC, 0x28, 0x85, 0xC0, 0, 0, 0, // vmovaps ymm0, [ebp+0xc0]
        ];
        assert_eq!(out, expected);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn scalar_sar_per_lane() {
        let out = enc::<X64Avx2F64>(PseudoOp::binary(Op::Sar, XMM0, Operand::Imm(3)));
        // store, 4 × sar qword [rbp+0xc0+8i], 3, reload
        assert_eq!(&out[9..17], &[0x48, 0xC1, 0xBD, 0xC0, 0, 0, 0, 0x03]);
        assert_eq!(out.len(), 9 + 4 * 8 + 9);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn not_and_orn() {
        let out = enc::<X86Avx1F32>(PseudoOp {
            op: Op::Not,
            dst: Operand::Reg(XMM1),
            src: Operand::None,
            third: Operand::None,
        });
        // vandnps ymm1, ymm1, [ebp+0xa0]
        assert_eq!(out, [0xC5, 0xF4, 0x55, 0x8D, 0xA0, 0, 0, 0]);
        let out = enc::<X86Avx1F32>(PseudoOp::binary(Op::Orn, XMM1, XMM1));
        // vmovaps ymm1, [ebp+0xa0]
        assert_eq!(out, [0xC5, 0xFC, 0x28, 0x8D, 0xA0, 0, 0, 0]);
    }

    #[cfg(feature = "x86_64")]
    #[test]
    fn save_area_walk() {
        let out = enc::<X64Avx1F32>(PseudoOp::nullary(Op::SaveRegs));
        assert_eq!(&out[..4], &[0x48, 0x8B, 0x45, 0x18]);
        assert_eq!(&out[4..9], &[0xC4, 0xE1, 0x7C, 0x29, 0x00]);
        assert_eq!(&out[9..13], &[0x48, 0x83, 0xC0, 0x20]);
        // 16 stores and 15 pointer bumps
        assert_eq!(out.len(), 4 + 16 * 5 + 15 * 4);
    }

    #[cfg(feature = "x86")]
    #[test]
    fn load_area_walk_x86() {
        let out = enc::<X86Avx1F32>(PseudoOp::nullary(Op::LoadRegs));
        assert_eq!(&out[..3], &[0x8B, 0x45, 0x18]);
        assert_eq!(&out[3..7], &[0xC5, 0xFC, 0x28, 0x00]);
        assert_eq!(&out[7..10], &[0x83, 0xC0, 0x20]);
        assert_eq!(&out[10..14], &[0xC5, 0xFC, 0x28, 0x08]);
    }
}
