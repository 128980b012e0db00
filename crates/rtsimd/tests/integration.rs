//! Integration tests for the public API: exact encodings, coverage of the
//! whole vocabulary on every profile, and error reporting.

mod common;

use common::{sample_listing, sample_listing_mem};
use rtsimd::*;

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn enabled() -> impl Iterator<Item = ProfileId> {
    ProfileId::ALL.into_iter().filter(|id| id.is_enabled())
}

// ─── Exact encodings ──────────────────────────────────────────────────────────

#[cfg(feature = "x86_64")]
#[test]
fn packed_add_three_byte_prefix() {
    let code = assemble("add x0, x1", ProfileId::X64Avx2F32).unwrap();
    // C4: three-byte VEX, E1: R̄X̄B̄ all set + map 0F, 7C: vvvv = ~0, L = 256
    assert_eq!(code.bytes(), &[0xC4, 0xE1, 0x7C, 0x58, 0xC1]);

    let high = assemble("add x8, x9", ProfileId::X64Avx1F32).unwrap();
    assert_eq!(high.bytes(), &[0xC4, 0x41, 0x3C, 0x58, 0xC1]);
}

#[cfg(feature = "x86")]
#[test]
fn packed_add_two_byte_prefix_on_x86() {
    let code = assemble("add x0, x1", ProfileId::X86Avx1F32).unwrap();
    assert_eq!(code.bytes(), &[0xC5, 0xFC, 0x58, 0xC1]);
}

#[cfg(feature = "power")]
#[test]
fn pair_add_is_two_half_operations() {
    for id in [ProfileId::P32Vsx1F32x2, ProfileId::P32Vsx2F32x2] {
        let code = assemble("add x0, x1", id).unwrap();
        // xvaddsp vs32, vs32, vs33 then xvaddsp vs48, vs48, vs49
        assert_eq!(words(code.bytes()), [0xF000_0A07, 0xF210_8A07], "{id}");
    }
    let code = assemble("add x0, x1", ProfileId::P64Vsx2F64).unwrap();
    assert_eq!(words(code.bytes()), [0xF000_0B07]);
}

#[cfg(feature = "power")]
#[test]
fn power_short_and_extended_addressing() {
    let id = ProfileId::P64Vsx1F64;
    const LXVD2X_VS32_TP: u32 = 0x7C00_DE99;

    let short = assemble("mov x0, [ctx + 0x10]", id).unwrap();
    // addi r27, r5, 0x10
    assert_eq!(words(short.bytes()), [0x3B65_0010, LXVD2X_VS32_TP]);

    let long = assemble("mov x0, [ctx + 0x10000]", id).unwrap();
    // oris r26, r0, 1 ; ori r26, r26, 0 ; add r27, r5, r26
    assert_eq!(words(long.bytes()), [0x641A_0001, 0x635A_0000, 0x7F65_D214, LXVD2X_VS32_TP]);
}

#[cfg(feature = "power")]
#[test]
fn power_threshold_boundary() {
    let id = ProfileId::P64Vsx2F64;
    let len = |disp: u32| assemble(&format!("mov x0, [ctx + {disp:#x}]"), id).unwrap().len() / 4;
    assert_eq!(len(0x7FE0), 2);
    assert_eq!(len(0x7FF0), 3);
    assert_eq!(len(0xFFF0), 3);
    assert_eq!(len(0x1_0000), 4);

    assert_eq!(classify(IsaFamily::Power64, 0x7FE0), AddrMode::Inline);
    assert_eq!(classify(IsaFamily::Power64, 0x7FF0), AddrMode::Indexed16);
    assert_eq!(classify(IsaFamily::Power32, 0x1_0000), AddrMode::Indexed32);
}

#[cfg(feature = "x86_64")]
#[test]
fn x86_threshold_boundary() {
    let id = ProfileId::X64Avx2F32;
    let short = assemble("add x0, [rbx + 0x7F]", id).unwrap();
    assert_eq!(short.bytes(), &[0xC4, 0xE1, 0x7C, 0x58, 0x43, 0x7F]);
    let long = assemble("add x0, [rbx + 0x80]", id).unwrap();
    assert_eq!(long.bytes(), &[0xC4, 0xE1, 0x7C, 0x58, 0x83, 0x80, 0x00, 0x00, 0x00]);
    assert!(classify(IsaFamily::X86_64, 0x80).is_extended());
    assert!(!classify(IsaFamily::X86_64, -0x7F).is_extended());
}

// ─── Vocabulary coverage ──────────────────────────────────────────────────────

#[test]
fn every_op_lowers_on_every_profile() {
    common::init_logging();
    for id in enabled() {
        for &op in Op::ALL {
            let src = sample_listing(op);
            let code = assemble(&src, id).unwrap_or_else(|e| panic!("{id}: `{src}`: {e}"));
            let empty_ok = op == Op::Enter && id.desc().family.is_x86();
            assert_eq!(code.is_empty(), empty_ok, "{id}: `{src}`");
            if !id.desc().family.is_x86() {
                assert_eq!(code.len() % 4, 0, "{id}: `{src}`");
            }

            if let Some(src) = sample_listing_mem(op) {
                assemble(&src, id).unwrap_or_else(|e| panic!("{id}: `{src}`: {e}"));
            }
        }
    }
}

#[test]
fn every_mnemonic_round_trips_through_display() {
    for &op in Op::ALL {
        let name = op.to_string();
        assert_eq!(parser::parse_mnemonic(&name), Some(op), "{name}");
        assert_eq!(parser::parse_mnemonic(&name.to_uppercase()), Some(op), "{name}");
    }
    assert_eq!(parser::parse_mnemonic("vaddps"), None);
}

#[test]
fn encoding_is_deterministic() {
    for id in enabled() {
        for &op in Op::ALL {
            let src = sample_listing(op);
            let a = assemble(&src, id).unwrap();
            let b = assemble(&src, id).unwrap();
            assert_eq!(a, b, "{id}: `{src}`");
        }
    }
}

#[test]
fn builder_matches_listing() {
    fn check<P: Profile>() {
        let mut asm = Assembler::<P>::new();
        asm.enter()
            .unwrap()
            .mov(XMM1, MemoryOperand::new(P::DESC.context, 0x200))
            .unwrap()
            .fma(XMM1, XMM2, XMM3)
            .unwrap()
            .sar(XMM1, 5)
            .unwrap()
            .cmp_le(XMM1, XMM2)
            .unwrap()
            .round(Rounding::Fixed(RoundMode::Down), XMM4, XMM1)
            .unwrap()
            .store(MemoryOperand::new(P::DESC.context, 0x220), XMM4)
            .unwrap();
        let built = asm.finish().unwrap();

        let listing = "enter\nmov x1, [ctx + 0x200]\nfma x1, x2, x3\nsar x1, 5\ncle x1, x2\nrnm x4, x1\nmov [ctx + 0x220], x4";
        let parsed = assemble_for::<P>(listing).unwrap();
        assert_eq!(built.bytes(), parsed.bytes(), "{}", P::DESC.id);
    }
    #[cfg(feature = "x86")]
    check::<X86Avx2F32>();
    #[cfg(feature = "x86_64")]
    {
        check::<X64Avx1F32>();
        check::<X64Avx2F64>();
    }
    #[cfg(feature = "power")]
    {
        check::<P64Vsx1F64>();
        check::<P32Vsx2F32x2>();
    }
}

#[test]
fn labels_resolve_forward_and_backward() {
    common::init_logging();
    for id in enabled() {
        let code = assemble("top: add x0, x1\nmkj.none x0, done\nmkj.full x0, top\ndone:", id).unwrap();
        let done = code.label_offset("done").unwrap();
        assert_eq!(done, code.len(), "{id}");
        assert_eq!(code.label_offset("top"), Some(0), "{id}");
    }
}

#[test]
fn statements_share_lines_and_skip_comments() {
    for id in enabled() {
        let a = assemble("add x0, x1 ; sub x2, x3   # trailing\n\n# only a comment\n", id).unwrap();
        let b = assemble("add x0, x1\nsub x2, x3", id).unwrap();
        assert_eq!(a.bytes(), b.bytes(), "{id}");
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[cfg(feature = "x86")]
#[test]
fn register_outside_file() {
    let err = assemble("add x8, x0", ProfileId::X86Avx1F32).unwrap_err();
    assert_eq!(
        err,
        EncodeError::RegisterOutOfRange {
            reg: 8,
            limit: 8,
            profile: ProfileId::X86Avx1F32
        }
    );
    let err = assemble("mov x0, [r8]", ProfileId::X86Avx1F32).unwrap_err();
    assert!(matches!(err, EncodeError::BaseRegisterOutOfRange { reg: 8, limit: 8, .. }), "{err}");
}

#[cfg(feature = "power")]
#[test]
fn pair_file_has_fourteen_registers() {
    let id = ProfileId::P32Vsx1F32x2;
    assert!(assemble("add x13, x0", id).is_ok());
    assert!(matches!(
        assemble("add x14, x0", id),
        Err(EncodeError::RegisterOutOfRange { reg: 14, limit: 14, .. })
    ));
}

#[cfg(feature = "power")]
#[test]
fn power_displacement_errors() {
    let id = ProfileId::P64Vsx2F64;
    assert!(matches!(
        assemble("add x0, [ctx + 0x80000000]", id),
        Err(EncodeError::DisplacementOutOfRange { min: 0, max: 0x7FFF_FFF0, .. })
    ));
    assert!(matches!(
        assemble("add x0, [ctx - 0x10]", id),
        Err(EncodeError::DisplacementOutOfRange { disp: -0x10, .. })
    ));
    assert!(matches!(
        assemble("add x0, [ctx + 0x18]", id),
        Err(EncodeError::MisalignedDisplacement { disp: 0x18, align: 16, .. })
    ));
}

#[cfg(feature = "x86_64")]
#[test]
fn x86_displacement_capacity() {
    assert!(assemble("add x0, [rax + 0x7FFFFFFF]", ProfileId::X64Avx2F32).is_ok());
    assert!(matches!(
        assemble("add x0, [rax + 0x80000000]", ProfileId::X64Avx2F32),
        Err(EncodeError::DisplacementOutOfRange { .. })
    ));
}

#[test]
fn shift_count_limited_by_element_width() {
    for id in enabled() {
        let max = id.desc().elem.bits() - 1;
        assert!(assemble(&format!("shl x1, {max}"), id).is_ok(), "{id}");
        assert_eq!(
            assemble(&format!("shl x1, {}", max + 1), id).unwrap_err(),
            EncodeError::ImmediateOutOfRange {
                value: i64::from(max + 1),
                max: i64::from(max)
            },
            "{id}"
        );
    }
}

#[test]
fn operand_shape_errors() {
    for id in enabled() {
        for src in ["add [ctx + 0x40], x1", "fma x1, x2", "not x1, x2", "mkj.full x1, x2", "enter x1", "shl x1, x2"] {
            assert!(
                matches!(assemble(src, id), Err(EncodeError::InvalidOperands { .. })),
                "{id}: `{src}`"
            );
        }
    }
}

#[test]
fn listing_errors_carry_line_numbers() {
    for id in enabled() {
        assert_eq!(
            assemble("add x0, x1\nfrob x1", id).unwrap_err(),
            EncodeError::UnknownMnemonic {
                mnemonic: "frob".into(),
                line: 2
            }
        );
        assert!(matches!(
            assemble("\n\nadd x1, x2, x3, x4", id),
            Err(EncodeError::Syntax { line: 3, .. })
        ));
        assert_eq!(
            assemble("mkj.none x0, nowhere", id).unwrap_err(),
            EncodeError::UndefinedLabel { label: "nowhere".into() }
        );
        assert_eq!(
            assemble("a: add x0, x1\na:", id).unwrap_err(),
            EncodeError::DuplicateLabel { label: "a".into() }
        );
    }
}

#[cfg(feature = "power")]
#[test]
fn power_branch_range() {
    let id = ProfileId::P64Vsx2F64;
    let near = format!("mkj.none x1, far\n{}far:", "add x1, x2\n".repeat(8000));
    assert!(assemble(&near, id).is_ok());
    let too_far = format!("mkj.none x1, far\n{}far:", "add x1, x2\n".repeat(8200));
    assert!(matches!(
        assemble(&too_far, id),
        Err(EncodeError::BranchOutOfRange { ref label, .. }) if label == "far"
    ));
}

#[test]
fn unsupported_profile_tuples() {
    let cases = [
        (IsaFamily::Power64, ExtLevel::V1, 256, ElemWidth::W64, "128-bit"),
        (IsaFamily::Power64, ExtLevel::V2, 128, ElemWidth::W32, "fp64"),
        (IsaFamily::Power32, ExtLevel::V1, 128, ElemWidth::W32, "register pairs"),
        (IsaFamily::X86, ExtLevel::V2, 256, ElemWidth::W64, "fp32"),
        (IsaFamily::X86_64, ExtLevel::V1, 512, ElemWidth::W32, "256-bit"),
    ];
    for (family, ext, bits, elem, needle) in cases {
        let spec = ProfileSpec { family, ext, bits, elem };
        match spec.resolve() {
            Err(EncodeError::UnsupportedProfile { reason, .. }) => {
                assert!(reason.contains(needle), "{reason}");
            }
            other => panic!("{spec:?} resolved to {other:?}"),
        }
    }
}

#[test]
fn every_profile_resolves_from_its_spec() {
    for id in enabled() {
        assert_eq!(id.spec().resolve(), Ok(id));
        assert_eq!(ProfileId::from_name(id.name()), Some(id));
        assert_eq!(id.desc().id, id);
    }
}

// ─── Save area ────────────────────────────────────────────────────────────────

#[test]
fn save_area_covers_register_file_and_reserved() {
    for id in enabled() {
        let desc = id.desc();
        let slots = layout(desc);
        let pairs = if desc.is_paired() { 2 } else { 1 };
        assert_eq!(slots.len(), desc.regs.count as usize * pairs + desc.regs.reserved.len(), "{id}");
        assert_eq!(area_size(desc), slots.iter().map(|s| s.bytes).sum::<i64>(), "{id}");
        for s in &slots {
            assert_eq!(s.offset % 16, 0, "{id}: slot alignment");
        }
    }
}

#[cfg(feature = "target-x64-avx2-f32")]
#[test]
fn build_time_target_alias() {
    let code = Assembler::<Target>::new().add(XMM0, XMM1).unwrap().profile();
    assert_eq!(code, ProfileId::X64Avx2F32);
}
