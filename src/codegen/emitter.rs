//! Declaration emitters, one per output language.

use super::language::Language;
use crate::ir::{ConstValue, Entity, Format};
use crate::symbols::SymbolEmitter;

pub struct CEmitter;

impl SymbolEmitter for CEmitter {
    fn declaration(&self, name: &str, entity: &Entity) -> String {
        match entity {
            Entity::Constant { value, format } => format!(
                "const {} {} = {};\n",
                format.c_name(),
                name,
                Language::C.literal(*value, format)
            ),
            Entity::Variable { format } | Entity::Signal { format } => {
                format!("{} {};\n", format.c_name(), name)
            }
            Entity::Table { values, storage } => format!(
                "static const {} {}[{}] = {{{}}};\n",
                storage.c_name(),
                name,
                values.len(),
                table_values(Language::C, values, storage)
            ),
            Entity::Function { result, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|(arg, format)| format!("{} {}", format.c_name(), arg))
                    .collect();
                let args = if args.is_empty() { "void".to_string() } else { args.join(", ") };
                format!("{} {}({});\n", result.c_name(), name, args)
            }
            Entity::Component { .. } | Entity::Protected { .. } => String::new(),
        }
    }
}

pub struct VhdlEmitter;

impl SymbolEmitter for VhdlEmitter {
    fn declaration(&self, name: &str, entity: &Entity) -> String {
        match entity {
            Entity::Constant { value, format } => format!(
                "constant {} : {} := {};\n",
                name,
                format.vhdl_name(),
                Language::Vhdl.literal(*value, format)
            ),
            Entity::Signal { format } => format!("signal {} : {};\n", name, format.vhdl_name()),
            Entity::Variable { format } => format!("variable {} : {};\n", name, format.vhdl_name()),
            Entity::Table { values, storage } => format!(
                "type {name}_type is array (0 to {}) of {};\nconstant {name} : {name}_type := ({});\n",
                values.len().saturating_sub(1),
                storage.vhdl_name(),
                table_values(Language::Vhdl, values, storage),
            ),
            Entity::Component { ports } => {
                let ports: Vec<String> = ports
                    .iter()
                    .map(|port| {
                        let dir = if port.output { "out" } else { "in" };
                        format!("{} : {} {}", port.name, dir, port.format.vhdl_name())
                    })
                    .collect();
                format!(
                    "component {}\n    port (\n        {}\n    );\nend component;\n",
                    name,
                    ports.join(";\n        ")
                )
            }
            Entity::Function { .. } | Entity::Protected { .. } => String::new(),
        }
    }
}

/// Verification scripts only bind constants; everything else is either an
/// input bound by a hypothesis or defined by the body itself.
pub struct GappaEmitter;

impl SymbolEmitter for GappaEmitter {
    fn declaration(&self, name: &str, entity: &Entity) -> String {
        match entity {
            Entity::Constant { value, format } => {
                format!("{} = {};\n", name, Language::Gappa.literal(*value, format))
            }
            _ => String::new(),
        }
    }
}

pub fn emitter_for(language: Language) -> Box<dyn SymbolEmitter> {
    match language {
        Language::C => Box::new(CEmitter),
        Language::Vhdl => Box::new(VhdlEmitter),
        Language::Gappa => Box::new(GappaEmitter),
    }
}

fn table_values(language: Language, values: &[ConstValue], storage: &Format) -> String {
    values
        .iter()
        .map(|v| language.literal(*v, storage))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Port;

    #[test]
    fn test_c_declarations() {
        let cst = Entity::Constant { value: ConstValue::Float(0.5), format: Format::Binary32 };
        assert_eq!(CEmitter.declaration("cst", &cst), "const float cst = 0.5f;\n");

        let var = Entity::Variable { format: Format::INT32 };
        assert_eq!(CEmitter.declaration("k", &var), "int32_t k;\n");

        let table = Entity::Table {
            values: vec![ConstValue::Float(1.0), ConstValue::Float(2.0)],
            storage: Format::Binary64,
        };
        assert_eq!(
            CEmitter.declaration("log_table", &table),
            "static const double log_table[2] = {1.0, 2.0};\n"
        );

        let func = Entity::Function {
            result: Format::Binary32,
            args: vec![("x".to_string(), Format::Binary32)],
        };
        assert_eq!(CEmitter.declaration("my_exp", &func), "float my_exp(float x);\n");
        assert_eq!(CEmitter.declaration("x", &Entity::Protected { format: Format::Binary32 }), "");
    }

    #[test]
    fn test_vhdl_declarations() {
        let sig = Entity::Signal { format: Format::LogicVector(8) };
        assert_eq!(VhdlEmitter.declaration("s", &sig), "signal s : std_logic_vector(7 downto 0);\n");

        let comp = Entity::Component {
            ports: vec![
                Port { name: "a".to_string(), format: Format::Bool, output: false },
                Port { name: "r".to_string(), format: Format::Bool, output: true },
            ],
        };
        assert_eq!(
            VhdlEmitter.declaration("adder", &comp),
            "component adder\n    port (\n        a : in std_logic;\n        r : out std_logic\n    );\nend component;\n"
        );
    }

    #[test]
    fn test_gappa_declarations() {
        let cst = Entity::Constant { value: ConstValue::Float(0.25), format: Format::Binary64 };
        assert_eq!(GappaEmitter.declaration("c", &cst), "c = 0.25;\n");
        assert_eq!(GappaEmitter.declaration("x", &Entity::Variable { format: Format::Binary64 }), "");
    }
}
