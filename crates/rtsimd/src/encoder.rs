//! Byte-level emission shared by the family back ends.
//!
//! [`InstrBytes`] holds one x86 instruction on the stack while its prefix,
//! ModR/M and displacement are assembled; [`CodeBuffer`] accumulates the
//! output of a whole pseudo-op stream and patches branch fixups at the end.
//! The free functions below build x86 VEX/ModR/M fields and Power
//! instruction words.

// VEX helpers inherently take many small fields.
#![allow(clippy::too_many_arguments)]

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::EncodeError;
#[cfg(any(feature = "x86", feature = "x86_64"))]
use crate::ir::AddrMode;
use crate::ir::Label;

// ─── InstrBytes: stack-allocated instruction buffer ────────────────────

const INSTR_CAP: usize = 16;

/// Stack-allocated byte buffer for one x86 instruction (at most 15 bytes).
#[derive(Clone, Default)]
pub struct InstrBytes {
    data: [u8; INSTR_CAP],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; INSTR_CAP],
            len: 0,
        }
    }

    /// Append a single byte. Bytes past the capacity are dropped; no
    /// encoder in this crate produces an instruction that long.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        debug_assert!((self.len as usize) < INSTR_CAP, "InstrBytes overflow");
        if let Some(slot) = self.data.get_mut(self.len as usize) {
            *slot = byte;
            self.len += 1;
        }
    }

    /// Append a slice of bytes.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InstrBytes({:02X?})", &**self)
    }
}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

// ─── CodeBuffer: output stream with label fixups ───────────────────────

/// How a pending branch is patched once its label is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupKind {
    /// x86 `rel32` field at `at`, relative to the end of the field.
    Rel32,
    /// Power B-form conditional branch word at `at` (14-bit word displacement).
    PowerBc,
}

#[derive(Debug, Clone, Copy)]
struct Fixup {
    at: usize,
    label: Label,
    kind: FixupKind,
}

/// Largest forward byte displacement a Power conditional branch reaches.
pub const POWER_BC_MAX: i64 = 0x7FFC;

/// Output of a pseudo-op stream.
///
/// Power instruction words are stored big-endian.
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    labels: Vec<Option<usize>>,
    names: Vec<Option<String>>,
    fixups: Vec<Fixup>,
}

impl CodeBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes emitted so far (fixups not yet applied).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Current offset.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append raw bytes.
    #[inline]
    pub fn emit(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Append one Power instruction word.
    #[inline]
    pub fn emit_word(&mut self, word: u32) {
        self.bytes.extend_from_slice(&word.to_be_bytes());
    }

    /// Allocate a fresh, unbound label.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        self.names.push(None);
        Label((self.labels.len() - 1) as u32)
    }

    /// Allocate a label carrying a name for diagnostics.
    pub fn new_named_label(&mut self, name: &str) -> Label {
        let label = self.new_label();
        if let Some(slot) = self.names.last_mut() {
            *slot = Some(String::from(name));
        }
        label
    }

    /// Name used in diagnostics: the listing name or `.L<n>`.
    pub fn label_name(&self, label: Label) -> String {
        match self.names.get(label.0 as usize) {
            Some(Some(name)) => name.clone(),
            _ => format!("{label}"),
        }
    }

    /// Bind `label` to the current offset.
    ///
    /// # Errors
    ///
    /// [`EncodeError::DuplicateLabel`] when already bound,
    /// [`EncodeError::UndefinedLabel`] for a label this buffer never created.
    pub fn bind(&mut self, label: Label) -> Result<(), EncodeError> {
        let here = self.bytes.len();
        let name = self.label_name(label);
        match self.labels.get_mut(label.0 as usize) {
            Some(slot @ None) => {
                *slot = Some(here);
                Ok(())
            }
            Some(Some(_)) => Err(EncodeError::DuplicateLabel { label: name }),
            None => Err(EncodeError::UndefinedLabel { label: name }),
        }
    }

    /// Offset `label` is bound to, if bound.
    pub fn label_offset(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    /// Drop everything emitted at or after `len`, along with its fixups and
    /// label bindings.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
        self.fixups.retain(|f| f.at < len);
        for slot in &mut self.labels {
            if slot.is_some_and(|at| at > len) {
                *slot = None;
            }
        }
    }

    /// Record a branch to `label` whose field starts at offset `at`.
    pub(crate) fn add_fixup(&mut self, at: usize, label: Label, kind: FixupKind) {
        self.fixups.push(Fixup { at, label, kind });
    }

    /// Patch every recorded branch and return the final bytes.
    ///
    /// # Errors
    ///
    /// [`EncodeError::UndefinedLabel`] for a branch to an unbound label and
    /// [`EncodeError::BranchOutOfRange`] when the displacement does not fit.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodeError> {
        let fixups = core::mem::take(&mut self.fixups);
        if !fixups.is_empty() {
            log::debug!("patching {} label fixups", fixups.len());
        }
        for fixup in &fixups {
            let target = match self.labels.get(fixup.label.0 as usize) {
                Some(Some(offset)) => *offset as i64,
                _ => {
                    return Err(EncodeError::UndefinedLabel {
                        label: self.label_name(fixup.label),
                    })
                }
            };
            match fixup.kind {
                FixupKind::Rel32 => {
                    let disp = target - (fixup.at as i64 + 4);
                    let rel = i32::try_from(disp).map_err(|_| EncodeError::BranchOutOfRange {
                        label: self.label_name(fixup.label),
                        disp,
                        max: i64::from(i32::MAX),
                    })?;
                    self.patch(fixup.at, &rel.to_le_bytes());
                }
                FixupKind::PowerBc => {
                    let disp = target - fixup.at as i64;
                    if !(-0x8000..=POWER_BC_MAX).contains(&disp) {
                        return Err(EncodeError::BranchOutOfRange {
                            label: self.label_name(fixup.label),
                            disp,
                            max: POWER_BC_MAX,
                        });
                    }
                    let mut word = [0u8; 4];
                    if let Some(src) = self.bytes.get(fixup.at..fixup.at + 4) {
                        word.copy_from_slice(src);
                    }
                    let patched = u32::from_be_bytes(word) | (disp as u32 & 0xFFFC);
                    self.patch(fixup.at, &patched.to_be_bytes());
                }
            }
        }
        Ok(self.bytes)
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        if let Some(dst) = self.bytes.get_mut(at..at + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
    }
}

// ─── x86: VEX / ModR/M / SIB ────────────────────────────────────────────

/// VEX `pp` field: implied mandatory prefix.
#[cfg(any(feature = "x86", feature = "x86_64"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pp {
    None = 0,
    P66 = 1,
    PF3 = 2,
    PF2 = 3,
}

/// VEX `m-mmmm` field: implied escape bytes.
#[cfg(any(feature = "x86", feature = "x86_64"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Map {
    M0F = 1,
    M0F38 = 2,
    M0F3A = 3,
}

/// Fixed part of a VEX-encoded instruction.
#[cfg(any(feature = "x86", feature = "x86_64"))]
#[derive(Debug, Clone, Copy)]
pub(crate) struct VexOp {
    pub pp: Pp,
    pub map: Map,
    pub w: bool,
    pub opcode: u8,
}

#[cfg(any(feature = "x86", feature = "x86_64"))]
impl VexOp {
    pub(crate) const fn new(pp: Pp, map: Map, opcode: u8) -> Self {
        Self {
            pp,
            map,
            w: false,
            opcode,
        }
    }

    pub(crate) const fn w(self, w: bool) -> Self {
        Self { w, ..self }
    }
}

/// ModR/M `r/m` operand: a register or `[base + disp]`.
#[cfg(any(feature = "x86", feature = "x86_64"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rm {
    Reg(u8),
    Mem { base: u8, disp: i32, mode: AddrMode },
}

#[cfg(any(feature = "x86", feature = "x86_64"))]
impl Rm {
    fn ext(self) -> bool {
        match self {
            Rm::Reg(r) => r & 8 != 0,
            Rm::Mem { base, .. } => base & 8 != 0,
        }
    }
}

/// Build ModR/M byte.
#[inline]
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build a REX prefix byte.
#[inline]
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | (u8::from(w) << 3) | (u8::from(r) << 2) | (u8::from(x) << 1) | u8::from(b)
}

/// Emit ModR/M (+ SIB + displacement) for `[base + disp]`.
///
/// `Inline` uses mod=00 when `disp == 0` and the base allows it, else disp8;
/// `Wide` always carries disp32. `esp/rsp/r12` take a SIB byte,
/// `ebp/rbp/r13` never use mod=00.
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) fn emit_mem_modrm(buf: &mut InstrBytes, reg_field: u8, base: u8, disp: i32, mode: AddrMode) {
    let (mod_bits, disp_size) = match mode {
        AddrMode::Inline if disp == 0 && base & 7 != 5 => (0b00, 0),
        AddrMode::Inline => (0b01, 1),
        _ => (0b10, 4),
    };
    buf.push(modrm(mod_bits, reg_field, base));
    if base & 7 == 4 {
        // no index, base = rsp/r12
        buf.push(0x24);
    }
    match disp_size {
        1 => buf.push(disp as i8 as u8),
        4 => buf.extend_from_slice(&disp.to_le_bytes()),
        _ => {}
    }
}

#[cfg(any(feature = "x86", feature = "x86_64"))]
fn emit_rm(buf: &mut InstrBytes, reg_field: u8, rm: Rm) {
    match rm {
        Rm::Reg(r) => buf.push(modrm(0b11, reg_field, r)),
        Rm::Mem { base, disp, mode } => emit_mem_modrm(buf, reg_field, base, disp, mode),
    }
}

/// Emit a VEX-encoded instruction.
///
/// `long_mode` selects the three-byte prefix unconditionally (x86-64);
/// 32-bit x86 uses the two-byte form whenever map, W and B allow it.
/// `vvvv` is the non-destructive source, `l` selects 256-bit length.
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) fn emit_vex(
    buf: &mut InstrBytes,
    long_mode: bool,
    op: VexOp,
    l: bool,
    reg: u8,
    vvvv: u8,
    rm: Rm,
) {
    let r = reg & 8 != 0;
    let b = rm.ext();
    let tail = (u8::from(op.w) << 7) | (((!vvvv) & 0x0F) << 3) | (u8::from(l) << 2) | op.pp as u8;
    if !long_mode && op.map == Map::M0F && !op.w && !b {
        buf.push(0xC5);
        buf.push((u8::from(!r) << 7) | (tail & 0x7F));
    } else {
        buf.push(0xC4);
        buf.push((u8::from(!r) << 7) | 0x40 | (u8::from(!b) << 5) | op.map as u8);
        buf.push(tail);
    }
    buf.push(op.opcode);
    emit_rm(buf, reg, rm);
}

/// Emit a legacy (non-VEX) instruction: optional REX, opcode, ModR/M.
#[cfg(any(feature = "x86", feature = "x86_64"))]
pub(crate) fn emit_legacy(buf: &mut InstrBytes, long_mode: bool, w: bool, opcode: &[u8], reg_field: u8, rm: Rm) {
    let r = reg_field & 8 != 0;
    let b = rm.ext();
    if long_mode && (w || r || b) {
        buf.push(rex(w, r, false, b));
    }
    buf.extend_from_slice(opcode);
    emit_rm(buf, reg_field, rm);
}

// ─── Power: instruction word fields ─────────────────────────────────────

/// XX3-form: `T = A op B` on 64-entry VSR numbers.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn xx3(base: u32, t: u8, a: u8, b: u8) -> u32 {
    base | ((t as u32 & 31) << 21)
        | ((a as u32 & 31) << 16)
        | ((b as u32 & 31) << 11)
        | ((a as u32 >> 5) << 2)
        | ((b as u32 >> 5) << 1)
        | (t as u32 >> 5)
}

/// XX2-form: `T = op B`.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn xx2(base: u32, t: u8, b: u8) -> u32 {
    base | ((t as u32 & 31) << 21) | ((b as u32 & 31) << 11) | ((b as u32 >> 5) << 1) | (t as u32 >> 5)
}

/// XX1-form VSX load/store: `T <-> [RA|0 + RB]`.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn xx1(base: u32, t: u8, ra: u8, rb: u8) -> u32 {
    base | ((t as u32 & 31) << 21) | ((ra as u32) << 16) | ((rb as u32) << 11) | (t as u32 >> 5)
}

/// VA/VX-form on VMX registers, given as VSR numbers 32..63.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn vx(base: u32, t: u8, a: u8, b: u8) -> u32 {
    base | ((t as u32 & 31) << 21) | ((a as u32 & 31) << 16) | ((b as u32 & 31) << 11)
}

/// D-form: `op RT, RA, imm16`.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn d_form(base: u32, rt: u8, ra: u8, imm: u16) -> u32 {
    base | ((rt as u32) << 21) | ((ra as u32) << 16) | imm as u32
}

/// X-form on GPRs: `op RT, RA, RB`.
#[inline]
#[cfg(feature = "power")]
pub(crate) const fn x_form(base: u32, rt: u8, ra: u8, rb: u8) -> u32 {
    base | ((rt as u32) << 21) | ((ra as u32) << 16) | ((rb as u32) << 11)
}
