//! HDL target: arithmetic on `std_logic_vector` signals through
//! `ieee.numeric_std` conversions.

use super::{TargetBuilder, TargetDescriptor};
use crate::codegen::language::Language;
use crate::codegen::template::Template;
use crate::core::error::CodegenResult;
use crate::ir::{Format, FormatClass, OpKind, Specifier};
use crate::isel::{GuardedRules, RuleTable, TypeSignature};

pub fn descriptor() -> CodegenResult<TargetDescriptor> {
    TargetBuilder::new("vhdl", "Synthesizable VHDL on std_logic_vector signals")
        .table(Language::Vhdl, rule_table())
        .build()
}

fn logic_binary() -> TypeSignature {
    TypeSignature::classes(
        FormatClass::LogicVector,
        &[FormatClass::LogicVector, FormatClass::LogicVector],
    )
}

fn logic_unary() -> TypeSignature {
    TypeSignature::classes(FormatClass::LogicVector, &[FormatClass::LogicVector])
}

fn single(table: &mut RuleTable, kind: OpKind, signature: TypeSignature, template: Template) {
    table.add(kind, GuardedRules::always().template(signature, template));
}

pub fn rule_table() -> RuleTable {
    let mut table = RuleTable::new();

    single(
        &mut table,
        OpKind::Addition,
        logic_binary(),
        Template::pattern("std_logic_vector(unsigned({0}) + unsigned({1}))"),
    );
    single(
        &mut table,
        OpKind::Subtraction,
        logic_binary(),
        Template::pattern("std_logic_vector(unsigned({0}) - unsigned({1}))"),
    );
    single(
        &mut table,
        OpKind::Multiplication,
        logic_binary(),
        Template::pattern("std_logic_vector(resize(unsigned({0}) * unsigned({1}), {w}))"),
    );
    single(
        &mut table,
        OpKind::Negation,
        logic_unary(),
        Template::pattern("std_logic_vector(-signed({0}))"),
    );
    for (kind, op) in [
        (OpKind::BitLogicAnd, "and"),
        (OpKind::BitLogicOr, "or"),
        (OpKind::BitLogicXor, "xor"),
    ] {
        single(&mut table, kind, logic_binary(), Template::infix(op));
    }
    single(&mut table, OpKind::BitLogicNot, logic_unary(), Template::prefix("not "));
    for (kind, function) in [(OpKind::LeftShift, "shift_left"), (OpKind::RightShift, "shift_right")] {
        single(
            &mut table,
            kind,
            logic_binary(),
            Template::pattern(&format!(
                "std_logic_vector({function}(unsigned({{0}}), to_integer(unsigned({{1}}))))"
            )),
        );
    }

    // Conditional assignments are statements, so their value lives in a signal.
    for (predicate, op) in [
        (Specifier::Less, "<"),
        (Specifier::LessOrEqual, "<="),
        (Specifier::Equal, "="),
        (Specifier::NotEqual, "/="),
        (Specifier::Greater, ">"),
        (Specifier::GreaterOrEqual, ">="),
    ] {
        table.insert(
            OpKind::Comparison,
            predicate,
            GuardedRules::always().template(
                TypeSignature::new(
                    Format::Bool,
                    vec![FormatClass::LogicVector.into(), FormatClass::LogicVector.into()],
                ),
                Template::pattern(&format!("'1' when unsigned({{0}}) {op} unsigned({{1}}) else '0'"))
                    .materialized(),
            ),
        );
    }
    single(
        &mut table,
        OpKind::Select,
        TypeSignature::new(
            FormatClass::Any,
            vec![Format::Bool.into(), FormatClass::Any.into(), FormatClass::Any.into()],
        ),
        Template::pattern("{1} when {0} = '1' else {2}").materialized(),
    );
    single(
        &mut table,
        OpKind::Conversion,
        logic_unary(),
        Template::pattern("std_logic_vector(resize(unsigned({0}), {w}))"),
    );
    single(
        &mut table,
        OpKind::TableLoad,
        TypeSignature::new(
            FormatClass::Any,
            vec![FormatClass::TableBacked.into(), FormatClass::LogicVector.into()],
        ),
        Template::pattern("{0}(to_integer(unsigned({1})))"),
    );

    table
}
