//! Property-based tests using proptest.
//!
//! Invariants checked over random inputs: the listing front end never
//! panics, encoding is deterministic, displacement classification has a
//! single threshold per family, and a pseudo-op's encoding does not depend
//! on what was emitted before it.

mod common;

use common::sample_listing;
use proptest::prelude::*;
use rtsimd::{addressing, assemble, classify, AddrMode, EncodeError, IsaFamily, Op, ProfileId};

// ── Strategies ──────────────────────────────────────────────────────────

/// Arbitrary ASCII text.
fn arb_listing_input() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\0', '\x7f'), 0..256).prop_map(|v| v.into_iter().collect())
}

fn arb_profile() -> impl Strategy<Value = ProfileId> {
    prop::sample::select(ProfileId::ALL.into_iter().filter(|id| id.is_enabled()).collect::<Vec<_>>())
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop::sample::select(Op::ALL.to_vec())
}

/// Short listings assembled from valid statements.
fn arb_valid_listing() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_op(), 1..12).prop_map(|ops| {
        ops.into_iter()
            .map(sample_listing)
            .enumerate()
            // labels must stay unique across statements
            .map(|(i, s)| s.replace("top", &format!("l{i}")))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// ── Robustness ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// The front end must never panic on arbitrary input, only Ok/Err.
    #[test]
    fn no_panic_on_arbitrary_input(input in arb_listing_input(), id in arb_profile()) {
        let _ = assemble(&input, id);
    }

    #[test]
    fn no_panic_on_mangled_statements(
        op in arb_op(),
        a in 0u8..40,
        b in 0u8..40,
        disp in any::<i64>(),
        id in arb_profile(),
    ) {
        for src in [
            format!("{op} x{a}, x{b}"),
            format!("{op} x{a}, [ctx + {disp}]"),
            format!("{op} [r{b} + {disp}], x{a}"),
            format!("{op} x{a}, {disp}"),
        ] {
            let _ = assemble(&src, id);
        }
    }
}

// ── Determinism ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn deterministic(listing in arb_valid_listing(), id in arb_profile()) {
        let r1 = assemble(&listing, id).unwrap();
        let r2 = assemble(&listing, id).unwrap();
        prop_assert_eq!(r1, r2);
    }

    /// Each statement encodes the same bytes alone as inside a listing,
    /// except for branch displacements.
    #[test]
    fn encoding_is_context_free(ops in prop::collection::vec(arb_op(), 1..8), id in arb_profile()) {
        let ops: Vec<Op> = ops.into_iter().filter(|op| op.form() != rtsimd::Form::Branch).collect();
        let mut joined = Vec::new();
        for &op in &ops {
            joined.extend_from_slice(assemble(&sample_listing(op), id).unwrap().bytes());
        }
        let listing: Vec<String> = ops.iter().map(|&op| sample_listing(op)).collect();
        let whole = assemble(&listing.join("\n"), id).unwrap();
        prop_assert_eq!(whole.bytes(), &joined[..]);
    }
}

// ── Addressing thresholds ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn x86_single_threshold(disp in -0x1000i64..0x1000) {
        for family in [IsaFamily::X86, IsaFamily::X86_64] {
            let mode = classify(family, disp);
            let want = if disp.abs() < addressing::X86_INLINE_LIMIT { AddrMode::Inline } else { AddrMode::Wide };
            prop_assert_eq!(mode, want);
        }
    }

    #[test]
    fn power_modes_are_monotonic(a in 0i64..0x8000_0000, b in 0i64..0x8000_0000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |m: AddrMode| match m {
            AddrMode::Inline => 0,
            AddrMode::Indexed16 => 1,
            _ => 2,
        };
        prop_assert!(rank(classify(IsaFamily::Power64, lo)) <= rank(classify(IsaFamily::Power64, hi)));
    }

    /// On Power the prelude length is the mode: 1, 2 or 3 instructions.
    #[test]
    fn power_prelude_matches_mode(slot in 0i64..0x07FF_0000, id in prop::sample::select(vec![
        ProfileId::P64Vsx1F64,
        ProfileId::P64Vsx2F64,
        ProfileId::P32Vsx1F32x2,
        ProfileId::P32Vsx2F32x2,
    ])) {
        prop_assume!(id.is_enabled());
        let disp = slot * 16;
        let code = assemble(&format!("mov x0, [r7 + {disp:#x}]"), id).unwrap();
        let words_per_half = match classify(id.desc().family, disp) {
            AddrMode::Inline => 2,
            AddrMode::Indexed16 => 3,
            _ => 4,
        };
        let halves = if id.desc().is_paired() { 2 } else { 1 };
        // the high half sits 16 bytes further and may cross into the next mode
        prop_assume!(classify(id.desc().family, disp) == classify(id.desc().family, disp + 16) || halves == 1);
        prop_assert_eq!(code.bytes().len(), 4 * words_per_half * halves);
    }

    #[test]
    fn power_rejects_unaligned(disp in 0i64..0x10_0000, id in prop::sample::select(vec![
        ProfileId::P64Vsx1F64,
        ProfileId::P32Vsx2F32x2,
    ])) {
        prop_assume!(id.is_enabled() && disp % 16 != 0);
        let is_misaligned = matches!(
            assemble(&format!("add x0, [ctx + {disp:#x}]"), id),
            Err(EncodeError::MisalignedDisplacement { .. })
        );
        prop_assert!(is_misaligned);
    }
}
