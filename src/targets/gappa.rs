//! Verification-script target: exact operations wrapped in the rounding
//! operator of the result format.

use super::{TargetBuilder, TargetDescriptor};
use crate::codegen::language::Language;
use crate::codegen::template::Template;
use crate::core::error::CodegenResult;
use crate::ir::{FormatClass, OpKind};
use crate::isel::{GuardedRules, RuleTable, TypeSignature};

pub fn descriptor() -> CodegenResult<TargetDescriptor> {
    TargetBuilder::new("gappa", "Gappa scripts for numerical error bounds")
        .table(Language::Gappa, rule_table())
        .build()
}

const NUMERIC: [FormatClass; 3] = [FormatClass::FloatingPoint, FormatClass::FixedPoint, FormatClass::Integer];

fn rounded(table: &mut RuleTable, kind: OpKind, arity: usize, pattern: &str) {
    let group = NUMERIC.iter().fold(GuardedRules::always(), |group, &class| {
        group.template(TypeSignature::classes(class, &vec![class; arity]), Template::pattern(pattern))
    });
    table.add(kind, group);
}

pub fn rule_table() -> RuleTable {
    let mut table = RuleTable::new();
    rounded(&mut table, OpKind::Addition, 2, "{t}({0} + {1})");
    rounded(&mut table, OpKind::Subtraction, 2, "{t}({0} - {1})");
    rounded(&mut table, OpKind::Multiplication, 2, "{t}({0} * {1})");
    rounded(&mut table, OpKind::Division, 2, "{t}({0} / {1})");
    rounded(&mut table, OpKind::FusedMultiplyAdd, 3, "{t}({0} * {1} + {2})");
    rounded(&mut table, OpKind::FastReciprocal, 1, "{t}(1 / {0})");
    rounded(&mut table, OpKind::Negation, 1, "-{0}");
    rounded(&mut table, OpKind::Abs, 1, "|{0}|");
    table.add(
        OpKind::Conversion,
        GuardedRules::always().template(
            TypeSignature::classes(FormatClass::Any, &[FormatClass::Any]),
            Template::pattern("{t}({0})"),
        ),
    );
    table.add(
        OpKind::NearestInteger,
        GuardedRules::always().template(
            TypeSignature::classes(FormatClass::Any, &[FormatClass::FloatingPoint]),
            Template::pattern("int<ne>({0})"),
        ),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gappa_table_is_lint_clean() {
        let table = rule_table();
        assert!(table.lint().is_empty());
        assert_eq!(table.groups(OpKind::Addition, crate::ir::Specifier::None).unwrap()[0].entries().len(), 3);
    }
}
