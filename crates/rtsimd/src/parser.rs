//! Pseudo-op listing parser.
//!
//! A listing is line-oriented: `mnemonic operand, operand, ...`, several
//! statements per line separated by `;`, `#` to end of line is a comment,
//! and `name:` binds a label. Operands are vector registers `x0..x15`,
//! memory `[base + disp]`, decimal or hex immediates, and label names.
//!
//! Memory bases are GPRs by ISA number (`r5`), x86 names (`ebp`, `rbp`,
//! `r13`), or `ctx` for the profile's context register; a context slot name
//! (`SCR01`, `GPC04`, ...) may stand in for a displacement.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::EncodeError;
use crate::ir::{GpReg, MemoryOperand, Op, VReg};
use crate::profile::ContextSlot;

/// One operand as written in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOperand {
    Reg(VReg),
    Mem(MemoryOperand),
    Imm(u32),
    /// Branch target by name; resolved by the assembler.
    Label(String),
}

/// One listing statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `name:`
    Label {
        name: String,
        line: u32,
    },
    /// A pseudo-op and its operands in role order.
    Op {
        op: Op,
        operands: Vec<ListingOperand>,
        line: u32,
    },
}

/// Zero-allocation ASCII-lowercase into a caller-provided stack buffer.
/// Inputs longer than `buf` are truncated.
#[inline]
fn to_lower_buf<'b>(s: &str, buf: &'b mut [u8]) -> &'b str {
    let len = s.len().min(buf.len());
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf[..len].make_ascii_lowercase();
    core::str::from_utf8(&buf[..len]).unwrap_or("")
}

/// Pseudo-op for a mnemonic, case-insensitive.
pub fn parse_mnemonic(name: &str) -> Option<Op> {
    let mut buf = [0u8; 16];
    if name.len() > buf.len() {
        return None;
    }
    let lower = to_lower_buf(name, &mut buf);
    Op::ALL.iter().copied().find(|op| op.to_string() == lower)
}

/// Parse a listing. `context` is the register `ctx` stands for.
///
/// # Errors
///
/// [`EncodeError::Syntax`] for malformed operands or labels and
/// [`EncodeError::UnknownMnemonic`] for names outside the vocabulary.
pub fn parse(source: &str, context: GpReg) -> Result<Vec<Statement>, EncodeError> {
    let mut out = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        let code = raw.split('#').next().unwrap_or("");
        for stmt in code.split(';') {
            parse_statement(stmt, line, context, &mut out)?;
        }
    }
    Ok(out)
}

fn syntax(msg: impl Into<String>, line: u32) -> EncodeError {
    EncodeError::Syntax { msg: msg.into(), line }
}

fn parse_statement(stmt: &str, line: u32, context: GpReg, out: &mut Vec<Statement>) -> Result<(), EncodeError> {
    let mut rest = stmt.trim();

    // leading `name:` definitions
    while let Some(colon) = rest.find(':') {
        let (head, tail) = rest.split_at(colon);
        let head = head.trim();
        if head.is_empty() || !head.bytes().all(is_ident_byte) {
            break;
        }
        if !head.bytes().next().is_some_and(is_ident_start) {
            return Err(syntax(alloc::format!("invalid label name '{head}'"), line));
        }
        out.push(Statement::Label {
            name: head.to_string(),
            line,
        });
        rest = tail[1..].trim_start();
    }
    if rest.is_empty() {
        return Ok(());
    }

    let (mnemonic, args) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    let op = parse_mnemonic(mnemonic).ok_or_else(|| EncodeError::UnknownMnemonic {
        mnemonic: mnemonic.to_string(),
        line,
    })?;

    let mut operands = Vec::new();
    if !args.is_empty() {
        for arg in split_operands(args) {
            operands.push(parse_operand(arg.trim(), line, context)?);
        }
    }
    if operands.len() > 3 {
        return Err(syntax(alloc::format!("'{op}' takes at most three operands"), line));
    }
    out.push(Statement::Op { op, operands, line });
    Ok(())
}

/// Split on commas outside brackets.
fn split_operands(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'.'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn parse_operand(text: &str, line: u32, context: GpReg) -> Result<ListingOperand, EncodeError> {
    if text.is_empty() {
        return Err(syntax("empty operand", line));
    }
    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| syntax(alloc::format!("unterminated memory operand '{text}'"), line))?;
        return parse_memory(inner, line, context).map(ListingOperand::Mem);
    }
    if let Some(r) = parse_vreg(text) {
        return Ok(ListingOperand::Reg(r));
    }
    if let Some(v) = parse_number(text) {
        return u32::try_from(v)
            .map(ListingOperand::Imm)
            .map_err(|_| syntax(alloc::format!("immediate '{text}' out of range"), line));
    }
    if text.bytes().next().is_some_and(is_ident_start) && text.bytes().all(is_ident_byte) {
        return Ok(ListingOperand::Label(text.to_string()));
    }
    Err(syntax(alloc::format!("unrecognized operand '{text}'"), line))
}

fn parse_vreg(text: &str) -> Option<VReg> {
    let digits = text.strip_prefix('x').or_else(|| text.strip_prefix('X'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(VReg)
}

/// Decimal or `0x` hex, optional leading `-`, `_` separators allowed.
pub(crate) fn parse_number(text: &str) -> Option<i64> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(b) => (true, b),
        None => (false, text),
    };
    let mut digits = [0u8; 32];
    let mut len = 0;
    for b in body.bytes().filter(|&b| b != b'_') {
        *digits.get_mut(len)? = b;
        len += 1;
    }
    let body = core::str::from_utf8(&digits[..len]).ok()?;
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse().ok()?
    } else {
        return None;
    };
    Some(if neg { -value } else { value })
}

const X86_GPRS: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];

fn parse_gpr(text: &str, context: GpReg) -> Option<GpReg> {
    let mut buf = [0u8; 8];
    if text.len() > buf.len() {
        return None;
    }
    let lower = to_lower_buf(text, &mut buf);
    if lower == "ctx" {
        return Some(context);
    }
    if let Some(tail) = lower.strip_prefix('e').or_else(|| lower.strip_prefix('r')) {
        if let Some(n) = X86_GPRS.iter().position(|r| *r == tail) {
            return Some(GpReg(n as u8));
        }
    }
    let digits = lower.strip_prefix('r')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(GpReg)
}

fn parse_memory(inner: &str, line: u32, context: GpReg) -> Result<MemoryOperand, EncodeError> {
    let mut base = None;
    let mut disp: i64 = 0;
    let mut sign = 1i64;
    let mut term_start = 0;
    let bytes = inner.as_bytes();

    let mut apply = |term: &str, sign: i64| -> Result<(), EncodeError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(syntax(alloc::format!("malformed address '[{inner}]'"), line));
        }
        if let Some(r) = parse_gpr(term, context) {
            if base.is_some() || sign < 0 {
                return Err(syntax(alloc::format!("address '[{inner}]' needs exactly one base"), line));
            }
            base = Some(r);
        } else {
            let v = ContextSlot::from_name(term)
                .map(ContextSlot::offset)
                .or_else(|| parse_number(term))
                .ok_or_else(|| syntax(alloc::format!("unrecognized address term '{term}'"), line))?;
            disp = v
                .checked_mul(sign)
                .and_then(|v| disp.checked_add(v))
                .ok_or_else(|| syntax(alloc::format!("displacement in '[{inner}]' overflows"), line))?;
        }
        Ok(())
    };

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'+' || b == b'-') && i > 0 {
            apply(&inner[term_start..i], sign)?;
            sign = if b == b'-' { -1 } else { 1 };
            term_start = i + 1;
        }
    }
    apply(&inner[term_start..], sign)?;

    let base = base.ok_or_else(|| syntax(alloc::format!("address '[{inner}]' has no base register"), line))?;
    Ok(MemoryOperand::new(base, disp))
}
