//! x86 targets, from the bare ISA up to AVX2.
//!
//! Each level adds intrinsics on top of the previous one and inherits every
//! rule it does not override. Scalar operations on SSE levels go through a
//! single-lane register (`_mm_set_ss` ... `_mm_cvtss_f32`) so that the same
//! instruction is used for scalar and vector code.
//!
//! From AVX on, 256-bit generic vectors are promoted to `__m256*` registers;
//! the load and store conversions below join promoted code to memory.

use super::{TargetBuilder, TargetDescriptor};
use crate::codegen::language::Language;
use crate::codegen::template::{Template, TemplateArg};
use crate::core::error::CodegenResult;
use crate::ir::{Format, OpKind, RegisterFormat, Specifier};
use crate::isel::{GuardedRules, RuleTable, TypeSignature};

const XMM: &str = "xmmintrin.h";
const EMM: &str = "emmintrin.h";
const TMM: &str = "tmmintrin.h";
const SMM: &str = "smmintrin.h";
const IMM: &str = "immintrin.h";

/// Cycle counter read, serialized by `cpuid`.
const READ_TIMESTAMP: &str = r#"{{
    uint32_t cycles_hi = 0, cycles_lo = 0;
    asm volatile (
        "cpuid\n\t"
        "rdtsc\n\t"
        "mov %%edx, %0\n\t"
        "mov %%eax, %1\n\t"
        : "=r" (cycles_hi), "=r" (cycles_lo)
        :: "%rax", "%rbx", "%rcx", "%rdx");
    {r} = ((uint64_t) cycles_hi << 32) | cycles_lo;
}}
"#;

fn reg(format: RegisterFormat) -> Format {
    Format::Register(format)
}

/// Template for `op` applied to `arity` scalars moved into single-lane
/// registers by `set`, the result being read back by `get`.
fn scalar_in_register(op: &str, arity: usize, set: &str, get: &str, lane: RegisterFormat) -> Template {
    let lanes = (0..arity)
        .map(|i| {
            Template::nest(
                Template::call(set)
                    .args(vec![TemplateArg::Operand(i)])
                    .output(reg(lane)),
            )
        })
        .collect();
    Template::call(get).of(vec![Template::call(op).args(lanes).output(reg(lane))])
}

fn ss(op: &str, arity: usize) -> Template {
    scalar_in_register(op, arity, "_mm_set_ss", "_mm_cvtss_f32", RegisterFormat::M128V1Float32)
}

fn sd(op: &str, arity: usize) -> Template {
    scalar_in_register(op, arity, "_mm_set_sd", "_mm_cvtsd_f64", RegisterFormat::M128V1Float64)
}

fn vector_binary(format: RegisterFormat, intrinsic: &str, header: &str) -> (TypeSignature, Template) {
    (TypeSignature::uniform(reg(format), 2), Template::call(intrinsic).header(header))
}

fn add_all(table: &mut RuleTable, kind: OpKind, entries: Vec<(TypeSignature, Template)>) {
    let group = entries
        .into_iter()
        .fold(GuardedRules::always(), |group, (sig, template)| group.template(sig, template));
    table.add(kind, group);
}

fn x86_table() -> RuleTable {
    let mut table = RuleTable::new();
    table.insert(
        OpKind::SpecificOperation,
        Specifier::ReadTimeStamp,
        GuardedRules::always().template(
            TypeSignature::exact(Format::UINT64, &[]),
            Template::pattern(READ_TIMESTAMP).header("stdint.h").writes_result(),
        ),
    );
    table
}

fn sse_table() -> RuleTable {
    use RegisterFormat::*;
    let mut table = RuleTable::new();
    let b32 = |arity| TypeSignature::uniform(Format::Binary32, arity);
    for (kind, scalar, packed) in [
        (OpKind::Addition, "_mm_add_ss", "_mm_add_ps"),
        (OpKind::Subtraction, "_mm_sub_ss", "_mm_sub_ps"),
        (OpKind::Multiplication, "_mm_mul_ss", "_mm_mul_ps"),
    ] {
        add_all(
            &mut table,
            kind,
            vec![
                (b32(2), ss(scalar, 2).header(XMM)),
                vector_binary(M128V1Float32, scalar, XMM),
                vector_binary(M128V4Float32, packed, XMM),
            ],
        );
    }
    for (kind, scalar) in [(OpKind::Min, "_mm_min_ss"), (OpKind::Max, "_mm_max_ss")] {
        add_all(&mut table, kind, vec![(b32(2), ss(scalar, 2).header(XMM))]);
    }
    add_all(
        &mut table,
        OpKind::FastReciprocal,
        vec![(b32(1), ss("_mm_rcp_ss", 1).header(XMM))],
    );
    add_all(
        &mut table,
        OpKind::Conversion,
        vec![
            (
                TypeSignature::exact(reg(M128V1Float32), &[Format::Binary32]),
                Template::call("_mm_set_ss").header(XMM),
            ),
            (
                TypeSignature::exact(Format::Binary32, &[reg(M128V1Float32)]),
                Template::call("_mm_cvtss_f32").header(XMM),
            ),
            (
                TypeSignature::exact(reg(M128V4Float32), &[Format::v4float32()]),
                Template::pattern("_mm_load_ps(GET_VEC_FIELD_ADDR({0}))")
                    .header(XMM)
                    .header("ml_vector_lib.h"),
            ),
            (
                TypeSignature::exact(Format::v4float32(), &[reg(M128V4Float32)]),
                Template::pattern("_mm_store_ps(GET_VEC_FIELD_ADDR({r}), {0});")
                    .header(XMM)
                    .header("ml_vector_lib.h")
                    .writes_result(),
            ),
        ],
    );
    add_all(
        &mut table,
        OpKind::NearestInteger,
        vec![(
            TypeSignature::exact(Format::INT32, &[Format::Binary32]),
            Template::pattern("_mm_cvt_ss2si(_mm_set_ss({0}))").header(XMM),
        )],
    );
    table
}

fn sse2_table() -> RuleTable {
    use RegisterFormat::*;
    let mut table = RuleTable::new();
    let b64 = |arity| TypeSignature::uniform(Format::Binary64, arity);
    for (kind, scalar, packed, int) in [
        (OpKind::Addition, "_mm_add_sd", "_mm_add_pd", "_mm_add_epi32"),
        (OpKind::Subtraction, "_mm_sub_sd", "_mm_sub_pd", "_mm_sub_epi32"),
    ] {
        add_all(
            &mut table,
            kind,
            vec![
                (b64(2), sd(scalar, 2).header(EMM)),
                vector_binary(M128V1Float64, scalar, EMM),
                vector_binary(M128V2Float64, packed, EMM),
                vector_binary(M128V4Int32, int, EMM),
            ],
        );
    }
    add_all(
        &mut table,
        OpKind::Multiplication,
        vec![
            (b64(2), sd("_mm_mul_sd", 2).header(EMM)),
            vector_binary(M128V1Float64, "_mm_mul_sd", EMM),
            vector_binary(M128V2Float64, "_mm_mul_pd", EMM),
        ],
    );
    for (kind, scalar) in [(OpKind::Min, "_mm_min_sd"), (OpKind::Max, "_mm_max_sd")] {
        add_all(&mut table, kind, vec![(b64(2), sd(scalar, 2).header(EMM))]);
    }
    add_all(
        &mut table,
        OpKind::Conversion,
        vec![
            (
                TypeSignature::exact(reg(M128V1Float64), &[Format::Binary64]),
                Template::call("_mm_set_sd").header(EMM),
            ),
            (
                TypeSignature::exact(Format::Binary64, &[reg(M128V1Float64)]),
                Template::call("_mm_cvtsd_f64").header(EMM),
            ),
        ],
    );
    add_all(
        &mut table,
        OpKind::NearestInteger,
        vec![(
            TypeSignature::exact(Format::INT32, &[Format::Binary64]),
            Template::pattern("_mm_cvtsd_si32(_mm_set_sd({0}))").header(EMM),
        )],
    );
    table
}

fn ssse3_table() -> RuleTable {
    let mut table = RuleTable::new();
    let v4i32 = |arity| TypeSignature::uniform(reg(RegisterFormat::M128V4Int32), arity);
    add_all(
        &mut table,
        OpKind::Negation,
        vec![(
            v4i32(1),
            Template::pattern("_mm_sign_epi32({0}, _mm_set1_epi32(-1))").header(TMM),
        )],
    );
    add_all(&mut table, OpKind::Abs, vec![(v4i32(1), Template::call("_mm_abs_epi32").header(TMM))]);
    table
}

fn sse41_table() -> RuleTable {
    let mut table = RuleTable::new();
    let round = |set: &str, op: &str, get: &str| {
        Template::pattern(&format!(
            "{get}({op}({set}({{0}}), {set}({{0}}), _MM_FROUND_TO_NEAREST_INT))"
        ))
        .header(SMM)
    };
    add_all(
        &mut table,
        OpKind::NearestInteger,
        vec![
            (
                TypeSignature::uniform(Format::Binary32, 1),
                round("_mm_set_ss", "_mm_round_ss", "_mm_cvtss_f32"),
            ),
            (
                TypeSignature::uniform(Format::Binary64, 1),
                round("_mm_set_sd", "_mm_round_sd", "_mm_cvtsd_f64"),
            ),
        ],
    );
    add_all(
        &mut table,
        OpKind::Multiplication,
        vec![vector_binary(RegisterFormat::M128V4Int32, "_mm_mullo_epi32", SMM)],
    );
    table
}

fn avx_table() -> RuleTable {
    use RegisterFormat::*;
    let mut table = RuleTable::new();
    for (kind, single, double) in [
        (OpKind::Addition, "_mm256_add_ps", "_mm256_add_pd"),
        (OpKind::Subtraction, "_mm256_sub_ps", "_mm256_sub_pd"),
        (OpKind::Multiplication, "_mm256_mul_ps", "_mm256_mul_pd"),
    ] {
        add_all(
            &mut table,
            kind,
            vec![
                vector_binary(M256V8Float32, single, IMM),
                vector_binary(M256V4Float64, double, IMM),
            ],
        );
    }
    let mut memory = Vec::new();
    for (register, generic, load, store) in [
        (
            M256V8Float32,
            Format::vector(Format::Binary32, 8),
            "_mm256_load_ps(GET_VEC_FIELD_ADDR({0}))",
            "_mm256_store_ps(GET_VEC_FIELD_ADDR({r}), {0});",
        ),
        (
            M256V4Float64,
            Format::vector(Format::Binary64, 4),
            "_mm256_load_pd(GET_VEC_FIELD_ADDR({0}))",
            "_mm256_store_pd(GET_VEC_FIELD_ADDR({r}), {0});",
        ),
        (
            M256V8Int32,
            Format::vector(Format::INT32, 8),
            "_mm256_load_si256((__m256i const *) GET_VEC_FIELD_ADDR({0}))",
            "_mm256_store_si256((__m256i *) GET_VEC_FIELD_ADDR({r}), {0});",
        ),
    ] {
        memory.push((
            TypeSignature::exact(reg(register), &[generic.clone()]),
            Template::pattern(load).header(IMM).header("ml_vector_lib.h"),
        ));
        memory.push((
            TypeSignature::exact(generic, &[reg(register)]),
            Template::pattern(store)
                .header(IMM)
                .header("ml_vector_lib.h")
                .writes_result(),
        ));
    }
    add_all(&mut table, OpKind::Conversion, memory);
    table
}

/// Generic 256-bit vectors and the AVX registers they are promoted to.
fn m256_promotions() -> [(Format, RegisterFormat); 3] {
    [
        (Format::vector(Format::Binary64, 4), RegisterFormat::M256V4Float64),
        (Format::vector(Format::Binary32, 8), RegisterFormat::M256V8Float32),
        (Format::vector(Format::INT32, 8), RegisterFormat::M256V8Int32),
    ]
}

fn avx2_table() -> RuleTable {
    use RegisterFormat::*;
    let mut table = RuleTable::new();
    add_all(
        &mut table,
        OpKind::FusedMultiplyAdd,
        vec![
            (TypeSignature::uniform(Format::Binary32, 3), ss("_mm_fmadd_ss", 3).header(IMM)),
            (TypeSignature::uniform(Format::Binary64, 3), sd("_mm_fmadd_sd", 3).header(IMM)),
            (
                TypeSignature::uniform(reg(M256V8Float32), 3),
                Template::call("_mm256_fmadd_ps").header(IMM),
            ),
            (
                TypeSignature::uniform(reg(M256V4Float64), 3),
                Template::call("_mm256_fmadd_pd").header(IMM),
            ),
        ],
    );
    add_all(
        &mut table,
        OpKind::Addition,
        vec![vector_binary(M256V8Int32, "_mm256_add_epi32", IMM)],
    );
    add_all(
        &mut table,
        OpKind::Multiplication,
        vec![vector_binary(M256V8Int32, "_mm256_mullo_epi32", IMM)],
    );
    table
}

/// The x86 family, each target extending the one before it. `x86_sse3` only
/// adds a flag and is a sibling of `x86_ssse3`.
pub fn descriptors(generic: &TargetDescriptor) -> CodegenResult<Vec<TargetDescriptor>> {
    let x86 = TargetBuilder::new("x86", "x86 without SIMD extensions")
        .extends(generic)
        .table(Language::C, x86_table())
        .build()?;
    let sse = TargetBuilder::new("x86_sse", "x86 with SSE")
        .extends(&x86)
        .flag("-msse")
        .table(Language::C, sse_table())
        .build()?;
    let sse2 = TargetBuilder::new("x86_sse2", "x86 with SSE2")
        .extends(&sse)
        .flag("-msse2")
        .table(Language::C, sse2_table())
        .build()?;
    let sse3 = TargetBuilder::new("x86_sse3", "x86 with SSE3")
        .extends(&sse2)
        .flag("-msse3")
        .build()?;
    let ssse3 = TargetBuilder::new("x86_ssse3", "x86 with SSSE3")
        .extends(&sse2)
        .flag("-mssse3")
        .table(Language::C, ssse3_table())
        .build()?;
    let sse41 = TargetBuilder::new("x86_sse41", "x86 with SSE4.1")
        .extends(&ssse3)
        .flag("-msse4.1")
        .table(Language::C, sse41_table())
        .build()?;
    let avx = m256_promotions()
        .into_iter()
        .fold(
            TargetBuilder::new("x86_avx", "x86 with AVX")
                .extends(&sse41)
                .flag("-mavx")
                .table(Language::C, avx_table()),
            |builder, (generic, register)| builder.promote(generic, reg(register)),
        )
        .build()?;
    let avx2 = TargetBuilder::new("x86_avx2", "x86 with AVX2 and FMA")
        .extends(&avx)
        .flag("-mfma")
        .flag("-mavx2")
        .table(Language::C, avx2_table())
        .build()?;
    Ok(vec![x86, sse, sse2, sse3, ssse3, sse41, avx, avx2])
}
