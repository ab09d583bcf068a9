// This module holds target descriptors and the registry that names them. A descriptor
// carries, per output language, the rule table the instruction selector interprets, plus
// the compiler flags the emitted source needs. Descriptors form a hierarchy: a derived
// target's own tables are linted on their own, then layered over the parent's so its
// entries are tried first on shared (kind, specifier) keys, its flags extend the
// parent's and its register promotions override the parent's for the same format. The registry is an explicit object owned by the driver (no import-time side
// effects); registering an existing name replaces the entry and logs a warning. Shipped
// targets: the generic C target, the x86 SIMD family, an HDL target and a
// verification-script target.

//! Target descriptors and the target registry.

pub mod gappa;
pub mod generic;
pub mod vhdl;
pub mod x86;

use crate::codegen::language::Language;
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::Format;
use crate::isel::{PromotionTable, RuleTable};
use hashbrown::HashMap;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    name: String,
    parent: Option<String>,
    description: String,
    flags: Vec<String>,
    tables: HashMap<Language, RuleTable>,
    promotions: PromotionTable,
}

impl TargetDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Flags of every ancestor followed by this target's own.
    pub fn get_compiler_flags(&self) -> &[String] {
        &self.flags
    }

    /// Generic formats this target keeps in native registers.
    pub fn promotions(&self) -> &PromotionTable {
        &self.promotions
    }

    pub fn rule_table(&self, language: Language) -> CodegenResult<&RuleTable> {
        self.tables.get(&language).ok_or_else(|| CodegenError::MissingRuleTable {
            target: self.name.clone(),
            language: language.name().to_string(),
        })
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.tables.keys().copied().collect();
        languages.sort();
        languages
    }

    pub fn default_language(&self) -> Option<Language> {
        self.languages().into_iter().next()
    }
}

pub struct TargetBuilder<'p> {
    name: String,
    description: String,
    parent: Option<&'p TargetDescriptor>,
    flags: Vec<String>,
    tables: Vec<(Language, RuleTable)>,
    promotions: PromotionTable,
    strict: bool,
}

impl<'p> TargetBuilder<'p> {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parent: None,
            flags: Vec::new(),
            tables: Vec::new(),
            promotions: PromotionTable::new(),
            strict: false,
        }
    }

    pub fn extends(mut self, parent: &'p TargetDescriptor) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }

    pub fn table(mut self, language: Language, table: RuleTable) -> Self {
        self.tables.push((language, table));
        self
    }

    pub fn promote(mut self, from: Format, register: Format) -> Self {
        self.promotions.insert(from, register);
        self
    }

    /// Reject unreachable rule entries instead of warning about them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> CodegenResult<TargetDescriptor> {
        let mut tables: HashMap<Language, RuleTable> = match self.parent {
            Some(parent) => parent.tables.clone(),
            None => HashMap::new(),
        };
        for (language, table) in self.tables {
            let findings = table.lint();
            if let Some(first) = findings.first() {
                if self.strict {
                    return Err(CodegenError::UnreachableRule {
                        reason: format!("{} ({}): {}", self.name, language, first),
                    });
                }
                for finding in &findings {
                    log::warn!("{} ({}): unreachable rule {}", self.name, language, finding);
                }
            }
            let composed = match tables.get(&language) {
                Some(inherited) => table.compose_over(inherited),
                None => table,
            };
            tables.insert(language, composed);
        }

        let mut flags: Vec<String> = self
            .parent
            .map(|parent| parent.flags.clone())
            .unwrap_or_default();
        flags.extend(self.flags);
        let promotions = match self.parent {
            Some(parent) => self.promotions.compose_over(&parent.promotions),
            None => self.promotions,
        };

        Ok(TargetDescriptor {
            name: self.name,
            parent: self.parent.map(|p| p.name.clone()),
            description: self.description,
            flags,
            tables,
            promotions,
        })
    }
}

/// Targets selectable by name.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: IndexMap<String, TargetDescriptor>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every shipped target.
    pub fn with_builtins() -> CodegenResult<Self> {
        let mut registry = Self::new();
        let generic = generic::descriptor()?;
        let x86_family = x86::descriptors(&generic)?;
        registry.register(generic);
        for target in x86_family {
            registry.register(target);
        }
        registry.register(vhdl::descriptor()?);
        registry.register(gappa::descriptor()?);
        Ok(registry)
    }

    /// Register `target` under its name; an existing entry is replaced.
    pub fn register(&mut self, target: TargetDescriptor) {
        if self.targets.contains_key(&target.name) {
            log::warn!("Target {} registered again, replacing the previous definition", target.name);
        } else {
            log::debug!("Registered target {}", target.name);
        }
        self.targets.insert(target.name.clone(), target);
    }

    pub fn get(&self, name: &str) -> CodegenResult<&TargetDescriptor> {
        self.targets
            .get(name)
            .ok_or_else(|| CodegenError::UnknownTarget { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::template::Template;
    use crate::ir::{FormatClass, OpKind, RegisterFormat};
    use crate::isel::{GuardedRules, TypeSignature};

    fn add_table(template: Template) -> RuleTable {
        let mut table = RuleTable::new();
        table.add(
            OpKind::Addition,
            GuardedRules::always().template(
                TypeSignature::classes(
                    FormatClass::FloatingPoint,
                    &[FormatClass::FloatingPoint, FormatClass::FloatingPoint],
                ),
                template,
            ),
        );
        table
    }

    #[test]
    fn test_flags_accumulate() {
        let base = TargetBuilder::new("base", "").flag("-O2").build().unwrap();
        let child = TargetBuilder::new("child", "").extends(&base).flag("-mfoo").build().unwrap();
        let grandchild = TargetBuilder::new("grandchild", "")
            .extends(&child)
            .flag("-mbar")
            .build()
            .unwrap();
        assert_eq!(grandchild.get_compiler_flags(), ["-O2", "-mfoo", "-mbar"]);
        assert_eq!(grandchild.parent(), Some("child"));
    }

    #[test]
    fn test_missing_rule_table() {
        let target = TargetBuilder::new("hdl_only", "")
            .table(Language::Vhdl, add_table(Template::infix("+")))
            .build()
            .unwrap();
        assert!(target.rule_table(Language::Vhdl).is_ok());
        assert!(matches!(
            target.rule_table(Language::C),
            Err(CodegenError::MissingRuleTable { .. })
        ));
        assert_eq!(target.default_language(), Some(Language::Vhdl));
    }

    #[test]
    fn test_child_inherits_parent_tables() {
        let base = TargetBuilder::new("base", "")
            .table(Language::C, add_table(Template::infix("+")))
            .build()
            .unwrap();
        let child = TargetBuilder::new("child", "")
            .extends(&base)
            .table(Language::C, add_table(Template::call("add")))
            .build()
            .unwrap();
        let table = child.rule_table(Language::C).unwrap();
        assert_eq!(table.rule_count(), 2);
    }

    #[test]
    fn test_strict_build_rejects_unreachable_rules() {
        let mut table = add_table(Template::infix("+"));
        table.add(
            OpKind::Addition,
            GuardedRules::always()
                .template(TypeSignature::uniform(Format::Binary32, 2), Template::call("dead")),
        );
        let lenient = TargetBuilder::new("lenient", "").table(Language::C, table.clone()).build();
        assert!(lenient.is_ok());
        let strict = TargetBuilder::new("strict", "")
            .table(Language::C, table)
            .strict(true)
            .build();
        assert!(matches!(strict, Err(CodegenError::UnreachableRule { .. })));
    }

    #[test]
    fn test_child_inherits_parent_promotions() {
        let v8 = Format::vector(Format::Binary32, 8);
        let v4 = Format::vector(Format::Binary64, 4);
        let base = TargetBuilder::new("base", "")
            .promote(v8.clone(), Format::v4float32())
            .promote(v4.clone(), Format::Register(RegisterFormat::M256V4Float64))
            .build()
            .unwrap();
        let child = TargetBuilder::new("child", "")
            .extends(&base)
            .promote(v8.clone(), Format::Register(RegisterFormat::M256V8Float32))
            .build()
            .unwrap();
        assert_eq!(child.promotions().len(), 2);
        assert_eq!(
            child.promotions().get(&v8),
            Some(&Format::Register(RegisterFormat::M256V8Float32))
        );
        assert_eq!(
            child.promotions().get(&v4),
            Some(&Format::Register(RegisterFormat::M256V4Float64))
        );
        assert!(TargetBuilder::new("plain", "").build().unwrap().promotions().is_empty());
    }

    #[test]
    fn test_registry_last_registration_wins() {
        let mut registry = TargetRegistry::new();
        registry.register(TargetBuilder::new("t", "first").build().unwrap());
        registry.register(TargetBuilder::new("u", "other").build().unwrap());
        registry.register(TargetBuilder::new("t", "second").build().unwrap());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("t").unwrap().description(), "second");
        assert!(matches!(registry.get("nope"), Err(CodegenError::UnknownTarget { .. })));
    }
}
