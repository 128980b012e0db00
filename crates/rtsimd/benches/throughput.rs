//! Performance benchmarks for `rtsimd`.
//!
//! Measures:
//! - Single pseudo-op latency (per profile)
//! - Listing throughput (bytes of listing text per second)
//! - Shim-heavy listings, where one pseudo-op expands to many instructions
//! - Extended addressing preludes
//! - Register file save/restore
//! - Typed builder versus listing front end
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use rtsimd::{assemble, Assembler, GpReg, MemoryOperand, ProfileId, X64Avx2F32, XMM0, XMM1, XMM2};

fn enabled() -> impl Iterator<Item = ProfileId> {
    ProfileId::ALL.into_iter().filter(|id| id.is_enabled())
}

// ─── Single Pseudo-Op Latency ───────────────────────────────────────────────

fn bench_single_op(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_op");

    for id in enabled() {
        group.bench_function(format!("{id}/add_reg"), |b| {
            b.iter(|| assemble(black_box("add x0, x1"), id).unwrap())
        });
        group.bench_function(format!("{id}/fma_mem"), |b| {
            b.iter(|| assemble(black_box("fma x0, x1, [ctx + 0x200]"), id).unwrap())
        });
    }

    group.finish();
}

// ─── Listing Throughput ─────────────────────────────────────────────────────

/// A block of `n` arithmetic statements with no labels.
fn gen_kernel(n: usize) -> String {
    let mut s = String::with_capacity(n * 24);
    for i in 0..n {
        let (a, b) = (i % 8, (i + 3) % 8);
        match i % 6 {
            0 => s.push_str(&format!("mov x{a}, [ctx + {:#x}]\n", 0x200 + 0x20 * (i % 64))),
            1 => s.push_str(&format!("mul x{a}, x{b}\n")),
            2 => s.push_str(&format!("add x{a}, x{b}\n")),
            3 => s.push_str(&format!("fma x{a}, x{b}, x{}\n", (i + 5) % 8)),
            4 => s.push_str(&format!("max x{a}, x{b}\n")),
            _ => s.push_str(&format!("mov [ctx + {:#x}], x{a}\n", 0x200 + 0x20 * (i % 64))),
        }
    }
    s
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    for n in [100, 1000] {
        let src = gen_kernel(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        for id in [ProfileId::X64Avx2F32, ProfileId::P64Vsx2F64, ProfileId::P32Vsx2F32x2] {
            if !id.is_enabled() {
                continue;
            }
            group.bench_function(format!("{id}/{n}"), |b| {
                b.iter(|| assemble(black_box(&src), id).unwrap())
            });
        }
    }

    group.finish();
}

// ─── Shims ──────────────────────────────────────────────────────────────────

/// Statements that lower to compatibility shims on first-generation
/// profiles and to single instructions on second-generation ones.
const SHIM_HEAVY: &str = "
    enter
    addi x0, x1
    subi x2, [ctx + 0x200]
    shl x3, 7
    sar x4, [ctx + 0x220]
    fma x5, x6, x7
    rcp x1, x2
    rsq x3, x4
    cvz x5, x6
    cvt x6, x7
    orn x0, x1
    not x2
";

fn bench_shims(c: &mut Criterion) {
    let mut group = c.benchmark_group("shims");

    for id in enabled() {
        group.bench_function(id.name(), |b| b.iter(|| assemble(black_box(SHIM_HEAVY), id).unwrap()));
    }

    group.finish();
}

// ─── Addressing ─────────────────────────────────────────────────────────────

fn bench_addressing(c: &mut Criterion) {
    let mut group = c.benchmark_group("addressing");

    let short = "mov x0, [ctx + 0x40]\n".repeat(64);
    let indexed16 = "mov x0, [ctx + 0x8000]\n".repeat(64);
    let indexed32 = "mov x0, [ctx + 0x123450]\n".repeat(64);

    for id in [ProfileId::X64Avx2F64, ProfileId::P64Vsx1F64] {
        if !id.is_enabled() {
            continue;
        }
        group.bench_function(format!("{id}/inline"), |b| b.iter(|| assemble(black_box(&short), id).unwrap()));
        group.bench_function(format!("{id}/indexed16"), |b| {
            b.iter(|| assemble(black_box(&indexed16), id).unwrap())
        });
        group.bench_function(format!("{id}/indexed32"), |b| {
            b.iter(|| assemble(black_box(&indexed32), id).unwrap())
        });
    }

    group.finish();
}

// ─── Save / Restore ─────────────────────────────────────────────────────────

fn bench_save_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_restore");

    for id in enabled() {
        group.bench_function(id.name(), |b| {
            b.iter(|| assemble(black_box("enter\nsregs.save\nsregs.load"), id).unwrap())
        });
    }

    group.finish();
}

// ─── Builder vs Listing ─────────────────────────────────────────────────────

fn bench_builder_vs_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("api_comparison");

    let source = "mov x0, [ctx + 0x200]\nmul x0, x1\nadd x0, x2\nmov [ctx + 0x220], x0";

    group.bench_function("listing", |b| {
        b.iter(|| assemble(black_box(source), ProfileId::X64Avx2F32).unwrap())
    });

    group.bench_function("builder", |b| {
        b.iter(|| {
            let mut asm = Assembler::<X64Avx2F32>::new();
            asm.mov(XMM0, MemoryOperand::new(GpReg::EBP, 0x200)).unwrap();
            asm.mul(XMM0, XMM1).unwrap();
            asm.add(XMM0, XMM2).unwrap();
            asm.store(MemoryOperand::new(GpReg::EBP, 0x220), XMM0).unwrap();
            black_box(asm.finish().unwrap())
        })
    });

    group.bench_function("builder_emit", |b| {
        b.iter(|| {
            let mut asm = Assembler::<X64Avx2F32>::new();
            asm.emit(black_box(source)).unwrap();
            black_box(asm.finish().unwrap())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_op,
    bench_throughput,
    bench_shims,
    bench_addressing,
    bench_save_restore,
    bench_builder_vs_listing,
);
criterion_main!(benches);
