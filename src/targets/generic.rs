//! Portable C99 target.
//!
//! Arithmetic, comparisons and bit logic map to C operators, the libm
//! entry points cover fused multiply-add, absolute value and rounding, and
//! bit-level reinterpretation goes through the support library. Min/max and
//! division by a power of two are rewritten into cheaper operations.

use super::{TargetBuilder, TargetDescriptor};
use crate::codegen::language::Language;
use crate::codegen::template::Template;
use crate::core::error::CodegenResult;
use crate::ir::{ConstValue, Format, FormatClass, NodeId, OpGraph, OpKind, Payload, Specifier};
use crate::isel::{FormatMatcher, GuardedRules, RuleTable, TypeSignature};

const SUPPORT_LIB: &str = "ml_support_lib.h";

pub fn descriptor() -> CodegenResult<TargetDescriptor> {
    TargetBuilder::new("generic", "Portable C99 without instruction-set extensions")
        .flag("-std=c99")
        .table(Language::C, rule_table())
        .build()
}

fn binary(class: FormatClass) -> TypeSignature {
    TypeSignature::classes(class, &[class, class])
}

fn unary(class: FormatClass) -> TypeSignature {
    TypeSignature::classes(class, &[class])
}

fn libm(name: &str) -> Template {
    Template::call(name).header("math.h").library("m")
}

fn support(name: &str) -> Template {
    Template::call(name).header(SUPPORT_LIB)
}

fn arithmetic(table: &mut RuleTable, kind: OpKind, op: &str) {
    table.add(
        kind,
        GuardedRules::always()
            .template(binary(FormatClass::FloatingPoint), Template::infix(op))
            .template(binary(FormatClass::Integer), Template::infix(op))
            .template(binary(FormatClass::Vector), Template::infix(op)),
    );
}

fn bit_logic(table: &mut RuleTable, kind: OpKind, op: &str) {
    table.add(kind, GuardedRules::always().template(binary(FormatClass::Integer), Template::infix(op)));
}

/// Divisor is a non-zero constant whose magnitude is a power of two, so its
/// reciprocal is exact.
pub fn is_power_of_two_divisor(graph: &OpGraph, id: NodeId) -> bool {
    let Some(&divisor) = graph.node(id).operands.get(1) else {
        return false;
    };
    match graph.node(divisor).payload {
        Payload::Constant(ConstValue::Float(v)) => {
            v != 0.0 && v.is_finite() && v.abs().log2().fract() == 0.0
        }
        _ => false,
    }
}

fn multiply_by_reciprocal(graph: &mut OpGraph, id: NodeId) -> CodegenResult<NodeId> {
    let node = graph.node(id);
    let (dividend, divisor, format) = (node.operands[0], node.operands[1], node.format.clone());
    let value = graph.node(divisor).payload.clone();
    let divisor_format = graph.node(divisor).format.clone();
    let reciprocal = match value {
        Payload::Constant(ConstValue::Float(v)) => 1.0 / v,
        _ => 1.0,
    };
    let constant = graph.constant(ConstValue::Float(reciprocal), divisor_format);
    Ok(graph.op(OpKind::Multiplication, &[dividend, constant], format))
}

/// `min(a, b)` as `a < b ? a : b`, `max` with `>`.
fn select_rewrite(
    predicate: Specifier,
) -> impl Fn(&mut OpGraph, NodeId) -> CodegenResult<NodeId> + 'static {
    move |graph, id| {
        let node = graph.node(id);
        let (a, b, format) = (node.operands[0], node.operands[1], node.format.clone());
        let cmp = graph.op_with(OpKind::Comparison, predicate, &[a, b], Format::Bool);
        Ok(graph.op(OpKind::Select, &[cmp, a, b], format))
    }
}

fn comparison_signature(class: FormatClass) -> TypeSignature {
    TypeSignature::new(Format::Bool, vec![class.into(), class.into()])
}

pub fn rule_table() -> RuleTable {
    let mut table = RuleTable::new();

    arithmetic(&mut table, OpKind::Addition, "+");
    arithmetic(&mut table, OpKind::Subtraction, "-");
    arithmetic(&mut table, OpKind::Multiplication, "*");
    table.add(
        OpKind::Division,
        GuardedRules::when("power-of-two constant divisor", is_power_of_two_divisor)
            .rewrite(binary(FormatClass::FloatingPoint), multiply_by_reciprocal),
    );
    arithmetic(&mut table, OpKind::Division, "/");

    table.add(
        OpKind::Negation,
        GuardedRules::always()
            .template(unary(FormatClass::FloatingPoint), Template::prefix("-"))
            .template(unary(FormatClass::Integer), Template::prefix("-")),
    );
    table.add(
        OpKind::FusedMultiplyAdd,
        GuardedRules::always()
            .template(TypeSignature::uniform(Format::Binary32, 3), libm("fmaf"))
            .template(TypeSignature::uniform(Format::Binary64, 3), libm("fma")),
    );
    table.add(
        OpKind::FastReciprocal,
        GuardedRules::always()
            .template(TypeSignature::uniform(Format::Binary32, 1), Template::pattern("(1.0f / {0})"))
            .template(TypeSignature::uniform(Format::Binary64, 1), Template::pattern("(1.0 / {0})")),
    );
    for (kind, predicate) in [(OpKind::Min, Specifier::Less), (OpKind::Max, Specifier::Greater)] {
        table.add(
            kind,
            GuardedRules::always()
                .rewrite(binary(FormatClass::FloatingPoint), select_rewrite(predicate))
                .rewrite(binary(FormatClass::Integer), select_rewrite(predicate)),
        );
    }
    table.add(
        OpKind::Abs,
        GuardedRules::always()
            .template(TypeSignature::uniform(Format::Binary32, 1), libm("fabsf"))
            .template(TypeSignature::uniform(Format::Binary64, 1), libm("fabs"))
            .template(TypeSignature::uniform(Format::INT32, 1), Template::call("abs").header("stdlib.h"))
            .template(TypeSignature::uniform(Format::INT64, 1), Template::call("llabs").header("stdlib.h")),
    );

    bit_logic(&mut table, OpKind::BitLogicAnd, "&");
    bit_logic(&mut table, OpKind::BitLogicOr, "|");
    bit_logic(&mut table, OpKind::BitLogicXor, "^");
    bit_logic(&mut table, OpKind::LeftShift, "<<");
    bit_logic(&mut table, OpKind::RightShift, ">>");
    table.add(
        OpKind::BitLogicNot,
        GuardedRules::always().template(unary(FormatClass::Integer), Template::prefix("~")),
    );

    for (predicate, op) in [
        (Specifier::Less, "<"),
        (Specifier::LessOrEqual, "<="),
        (Specifier::Equal, "=="),
        (Specifier::NotEqual, "!="),
        (Specifier::Greater, ">"),
        (Specifier::GreaterOrEqual, ">="),
    ] {
        table.insert(
            OpKind::Comparison,
            predicate,
            GuardedRules::always()
                .template(comparison_signature(FormatClass::FloatingPoint), Template::infix(op))
                .template(comparison_signature(FormatClass::Integer), Template::infix(op)),
        );
    }

    table.add(
        OpKind::Select,
        GuardedRules::always().template(
            TypeSignature::new(
                FormatClass::Any,
                vec![Format::Bool.into(), FormatClass::Any.into(), FormatClass::Any.into()],
            ),
            Template::pattern("({0} ? {1} : {2})"),
        ),
    );
    table.add(
        OpKind::Conversion,
        GuardedRules::always().template(unary(FormatClass::Any), Template::pattern("(({t}) {0})")),
    );
    let encodings = [
        (Format::UINT32, Format::Binary32, "float_to_32b_encoding", "float_from_32b_encoding"),
        (Format::INT32, Format::Binary32, "float_to_32b_encoding", "float_from_32b_encoding"),
        (Format::UINT64, Format::Binary64, "double_to_64b_encoding", "double_from_64b_encoding"),
        (Format::INT64, Format::Binary64, "double_to_64b_encoding", "double_from_64b_encoding"),
    ];
    let mut casts = GuardedRules::always();
    for (int, float, to_bits, from_bits) in encodings {
        casts = casts
            .template(TypeSignature::exact(int.clone(), &[float.clone()]), support(to_bits))
            .template(TypeSignature::exact(float, &[int]), support(from_bits));
    }
    table.add(OpKind::TypeCast, casts);

    table.add(
        OpKind::NearestInteger,
        GuardedRules::always()
            .template(
                TypeSignature::exact(Format::INT32, &[Format::Binary32]),
                Template::pattern("((int32_t) nearbyintf({0}))").header("math.h").library("m"),
            )
            .template(
                TypeSignature::exact(Format::INT64, &[Format::Binary64]),
                Template::pattern("((int64_t) nearbyint({0}))").header("math.h").library("m"),
            )
            .template(TypeSignature::uniform(Format::Binary32, 1), libm("nearbyintf"))
            .template(TypeSignature::uniform(Format::Binary64, 1), libm("nearbyint")),
    );
    table.add(
        OpKind::TableLoad,
        GuardedRules::always().template(
            TypeSignature::new(
                FormatClass::Any,
                vec![FormatClass::TableBacked.into(), FormatClass::Integer.into()],
            ),
            Template::pattern("{0}[{1}]"),
        ),
    );
    table.add(
        OpKind::ExponentExtraction,
        GuardedRules::always()
            .template(
                TypeSignature::new(FormatClass::Integer, vec![FormatMatcher::Exact(Format::Binary32)]),
                support("ml_exp_extraction_dirty_fp32"),
            )
            .template(
                TypeSignature::new(FormatClass::Integer, vec![FormatMatcher::Exact(Format::Binary64)]),
                support("ml_exp_extraction_dirty_fp64"),
            ),
    );
    table.add(
        OpKind::ExponentInsertion,
        GuardedRules::always()
            .template(
                TypeSignature::new(Format::Binary32, vec![FormatClass::Integer.into()]),
                support("ml_exp_insertion_fp32"),
            )
            .template(
                TypeSignature::new(Format::Binary64, vec![FormatClass::Integer.into()]),
                support("ml_exp_insertion_fp64"),
            ),
    );

    table
}
