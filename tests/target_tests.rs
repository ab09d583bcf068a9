//! Integration tests for target descriptors and the registry.

use mlgen::codegen::{Language, Template};
use mlgen::core::CodegenError;
use mlgen::ir::{Format, FormatClass, OpGraph, OpKind};
use mlgen::isel::{GuardedRules, InstructionSelector, RuleAction, RuleTable, TypeSignature};
use mlgen::targets::{TargetBuilder, TargetRegistry};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_table(callee: &str) -> RuleTable {
    let mut table = RuleTable::new();
    table.add(
        OpKind::Addition,
        GuardedRules::always().template(
            TypeSignature::classes(FormatClass::Any, &[FormatClass::Any, FormatClass::Any]),
            Template::call(callee),
        ),
    );
    table
}

fn selected_call(registry: &TargetRegistry, target: &str, format: Format) -> String {
    let table = registry.get(target).unwrap().rule_table(Language::C).unwrap();
    let selector = InstructionSelector::new(table, target);
    let mut g = OpGraph::new();
    let a = g.variable("a", format.clone());
    let sum = g.op(OpKind::Addition, &[a, a], format);
    match selector.select(&g, sum).unwrap() {
        RuleAction::Template(template) => format!("{:?}", template.shape()),
        RuleAction::Rewrite(_) => "rewrite".to_string(),
    }
}

#[test]
fn test_builtin_targets_are_registered_in_order() {
    init();
    let registry = TargetRegistry::with_builtins().unwrap();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        [
            "generic",
            "x86",
            "x86_sse",
            "x86_sse2",
            "x86_sse3",
            "x86_ssse3",
            "x86_sse41",
            "x86_avx",
            "x86_avx2",
            "vhdl",
            "gappa",
        ]
    );
}

#[test]
fn test_flags_accumulate_along_the_chain() {
    init();
    let registry = TargetRegistry::with_builtins().unwrap();
    let flags = |name: &str| registry.get(name).unwrap().get_compiler_flags().join(" ");
    assert_eq!(flags("generic"), "-std=c99");
    assert_eq!(flags("x86_sse2"), "-std=c99 -msse -msse2");
    assert_eq!(flags("x86_sse41"), "-std=c99 -msse -msse2 -mssse3 -msse4.1");
    assert_eq!(flags("x86_avx2"), "-std=c99 -msse -msse2 -mssse3 -msse4.1 -mavx -mfma -mavx2");
    assert!(registry.get("vhdl").unwrap().get_compiler_flags().is_empty());
}

#[test]
fn test_derived_target_overrides_then_inherits() {
    init();
    let registry = TargetRegistry::with_builtins().unwrap();
    assert_eq!(selected_call(&registry, "generic", Format::Binary32), "Infix(\"+\")");
    assert_eq!(selected_call(&registry, "x86", Format::Binary32), "Infix(\"+\")");
    assert_eq!(selected_call(&registry, "x86_sse", Format::Binary32), "Call(\"_mm_cvtss_f32\")");
    // No SSE rule for doubles before SSE2.
    assert_eq!(selected_call(&registry, "x86_sse", Format::Binary64), "Infix(\"+\")");
    assert_eq!(selected_call(&registry, "x86_sse2", Format::Binary64), "Call(\"_mm_cvtsd_f64\")");
    assert_eq!(selected_call(&registry, "x86_sse2", Format::INT32), "Infix(\"+\")");
}

#[test]
fn test_registry_last_registration_wins() {
    init();
    let mut registry = TargetRegistry::new();
    registry.register(
        TargetBuilder::new("custom", "first")
            .table(Language::C, add_table("first_add"))
            .build()
            .unwrap(),
    );
    registry.register(
        TargetBuilder::new("custom", "second")
            .table(Language::C, add_table("second_add"))
            .build()
            .unwrap(),
    );
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("custom").unwrap().description(), "second");
    assert_eq!(selected_call(&registry, "custom", Format::INT32), "Call(\"second_add\")");
}

#[test]
fn test_unknown_target_and_missing_language() {
    init();
    let registry = TargetRegistry::with_builtins().unwrap();
    assert!(matches!(
        registry.get("x86_avx512"),
        Err(CodegenError::UnknownTarget { .. })
    ));
    let err = registry.get("vhdl").unwrap().rule_table(Language::C).unwrap_err();
    assert_eq!(err.to_string(), "Target vhdl has no rule table for c");
}

#[test]
fn test_default_language_follows_tables() {
    init();
    let registry = TargetRegistry::with_builtins().unwrap();
    assert_eq!(registry.get("x86_avx").unwrap().default_language(), Some(Language::C));
    assert_eq!(registry.get("vhdl").unwrap().default_language(), Some(Language::Vhdl));
    assert_eq!(registry.get("gappa").unwrap().default_language(), Some(Language::Gappa));
}

#[test]
fn test_strict_build_rejects_shadowed_entries() {
    init();
    let mut table = add_table("any_add");
    table.add(
        OpKind::Addition,
        GuardedRules::always().template(TypeSignature::uniform(Format::Binary32, 2), Template::infix("+")),
    );
    let err = TargetBuilder::new("strict", "")
        .table(Language::C, table.clone())
        .strict(true)
        .build()
        .unwrap_err();
    assert!(matches!(err, CodegenError::UnreachableRule { .. }));

    // Non-strict mode only warns.
    let target = TargetBuilder::new("lenient", "").table(Language::C, table).build().unwrap();
    assert_eq!(target.rule_table(Language::C).unwrap().rule_count(), 2);
}
