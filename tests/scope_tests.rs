//! Integration tests for scoped code buffers and name allocation.

use mlgen::codegen::{Language, NestedScopeStack, ScopeConfig};
use mlgen::core::CodegenError;
use mlgen::ir::{ConstValue, Entity, Format};
use mlgen::symbols::SymbolCategory;
use hashbrown::HashSet;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn c_scopes() -> NestedScopeStack {
    NestedScopeStack::new(Language::C, ScopeConfig::default())
}

#[test]
fn test_constant_names_follow_counter() {
    init();
    let mut scopes = c_scopes();
    let names: Vec<String> = (0..3)
        .map(|_| {
            scopes
                .declare_constant_value(ConstValue::Float(1.0), Format::Binary32, "cst")
                .unwrap()
        })
        .collect();
    assert_eq!(names, ["cst", "cst0", "cst1"]);
}

#[test]
fn test_nested_variable_is_declared_once_and_freed() {
    init();
    let mut scopes = c_scopes();
    scopes.append("void f(void) ");
    scopes.open_scope();
    let x = scopes.declare_temporary("x", Format::Binary32).unwrap();
    assert_eq!(x, "x");
    scopes.append("x = 1.0f;\n");
    scopes.close_scope().unwrap();

    assert!(scopes.current().symbols().is_free("x"));
    let protected = scopes.alloc_entity(Entity::Protected { format: Format::INT32 });
    scopes.declare_protected("x", protected).unwrap();

    let text = scopes.finish(false).unwrap();
    assert_eq!(text.matches("float x;").count(), 1, "{text}");
    assert_eq!(text, "void f(void) {\n    float x;\n    \n    x = 1.0f;\n}\n");
}

#[test]
fn test_static_constant_stays_taken_after_close() {
    init();
    let config = ScopeConfig { static_constants: true, ..ScopeConfig::default() };
    let mut scopes = NestedScopeStack::new(Language::C, config);
    scopes.append("void f(void) ");
    scopes.open_scope();
    let name = scopes
        .declare_constant_value(ConstValue::Float(0.5), Format::Binary64, "x")
        .unwrap();
    assert_eq!(name, "x");
    scopes.close_scope().unwrap();

    assert!(!scopes.current().symbols().is_free("x"));
    assert_eq!(scopes.get_free_name("x"), "x0");

    let text = scopes.finish(false).unwrap();
    assert!(text.starts_with("const double x = 0.5;\n"), "{text}");
}

#[test]
fn test_table_is_deduplicated_across_scopes() {
    init();
    for static_tables in [true, false] {
        let config = ScopeConfig { static_tables, ..ScopeConfig::default() };
        let mut scopes = NestedScopeStack::new(Language::C, config);
        let table = scopes.alloc_entity(Entity::Table {
            values: vec![ConstValue::Float(1.0), ConstValue::Float(2.0)],
            storage: Format::Binary32,
        });
        let outer = scopes.declare_table_entity(table, "table").unwrap();
        assert!(!outer.reused);

        scopes.append("void f(void) ");
        scopes.open_scope();
        scopes.open_scope();
        let inner = scopes.declare_table_entity(table, "table").unwrap();
        assert!(inner.reused);
        assert_eq!(inner.name, outer.name);
        scopes.close_scope().unwrap();
        scopes.close_scope().unwrap();

        let text = scopes.finish(false).unwrap();
        assert_eq!(text.matches("static const float table[2]").count(), 1, "{text}");
    }
}

#[test]
fn test_equal_tables_are_distinct_entities() {
    init();
    let mut scopes = c_scopes();
    let values = vec![ConstValue::Int(1), ConstValue::Int(2)];
    let a = scopes.alloc_entity(Entity::Table { values: values.clone(), storage: Format::INT32 });
    let b = scopes.alloc_entity(Entity::Table { values, storage: Format::INT32 });
    let first = scopes.declare_table_entity(a, "table").unwrap();
    let second = scopes.declare_table_entity(b, "table").unwrap();
    assert_eq!(first.name, "table");
    assert_eq!(second.name, "table0");
    assert!(!second.reused);
}

#[test]
fn test_scope_lifo_discipline() {
    init();
    let mut scopes = c_scopes();
    assert_eq!(scopes.depth(), 1);
    scopes.append("a;\n");
    scopes.open_scope();
    scopes.append("b;\n");
    scopes.open_scope();
    scopes.append("c;\n");
    assert_eq!(scopes.depth(), 3);
    scopes.close_scope().unwrap();
    scopes.append("d;\n");
    scopes.close_scope().unwrap();
    assert_eq!(scopes.depth(), 1);

    let err = scopes.close_scope().unwrap_err();
    assert!(matches!(err, CodegenError::InvalidScopeNesting { .. }));

    let text = scopes.finish(false).unwrap();
    assert_eq!(text, "a;\n{\n    b;\n    {\n        c;\n    }\n    d;\n}\n");
}

#[test]
fn test_finish_rejects_open_scopes() {
    init();
    let mut scopes = c_scopes();
    scopes.open_scope();
    assert!(matches!(
        scopes.finish(true),
        Err(CodegenError::InvalidScopeNesting { .. })
    ));
}

#[test]
fn test_generated_names_are_unique_in_the_chain() {
    init();
    let mut scopes = c_scopes();
    let mut seen = HashSet::new();
    for depth in 0..4 {
        for _ in 0..3 {
            let name = scopes.declare_temporary("tmp", Format::INT32).unwrap();
            assert!(seen.insert(name.clone()), "{name} handed out twice at depth {depth}");
        }
        scopes.open_scope();
    }
    for _ in 0..4 {
        scopes.close_scope().unwrap();
    }
    assert_eq!(seen.len(), 12);
}

#[test]
fn test_names_are_free_across_categories() {
    init();
    let mut scopes = c_scopes();
    let function = scopes.alloc_entity(Entity::Function { result: Format::Void, args: Vec::new() });
    scopes.declare_function("tmp", function).unwrap();
    let name = scopes.declare_temporary("tmp", Format::Binary32).unwrap();
    assert_eq!(name, "tmp0");
    assert!(!scopes.current().symbols().is_free("tmp"));
    assert_eq!(SymbolCategory::Function.name(), "function");
}

#[test]
fn test_uniquifier_prefixes_generated_names() {
    init();
    let config = ScopeConfig { uniquifier: "exp_".to_string(), ..ScopeConfig::default() };
    let mut scopes = NestedScopeStack::new(Language::C, config);
    assert_eq!(scopes.declare_temporary("tmp", Format::Binary32).unwrap(), "exp_tmp");
    assert_eq!(scopes.declare_temporary("tmp", Format::Binary32).unwrap(), "exp_tmp0");
}

#[test]
fn test_headers_merge_into_root() {
    init();
    let mut scopes = c_scopes();
    scopes.add_header("stdint.h");
    scopes.open_scope();
    scopes.add_header("math.h");
    scopes.add_header("stdint.h");
    scopes.close_scope().unwrap();
    let text = scopes.finish(true).unwrap();
    assert!(text.starts_with("#include <stdint.h>\n#include <math.h>\n"), "{text}");
}
