//! Helpers shared by the integration tests.

#![allow(dead_code)]

use rtsimd::{Form, Op};

/// A listing exercising `op` with register operands in its accepted shape.
///
/// Branches jump to a label bound in front of them so the listing is
/// self-contained.
pub fn sample_listing(op: Op) -> String {
    match op.form() {
        Form::Binary | Form::Unary => format!("{op} x1, x2"),
        Form::InPlace => format!("{op} x1"),
        Form::Ternary => format!("{op} x1, x2, x3"),
        Form::Shift => format!("{op} x1, 3"),
        Form::Branch => format!("top: {op} x1, top"),
        Form::Nullary => format!("{op}"),
    }
}

/// Same as [`sample_listing`] with the last source in memory, where the
/// shape allows one.
pub fn sample_listing_mem(op: Op) -> Option<String> {
    let mem = "[ctx + 0x200]";
    match op.form() {
        Form::Binary if !op.destroys_source() => Some(format!("{op} x1, {mem}")),
        Form::Unary if !op.destroys_source() => Some(format!("{op} x1, {mem}")),
        Form::Ternary => Some(format!("{op} x1, x2, {mem}")),
        Form::Shift => Some(format!("{op} x1, {mem}")),
        _ => None,
    }
}

/// Route the encoder's `log` output to the test harness (`RUST_LOG=trace`).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
