//! Output languages and their lexical conventions.

use crate::ir::{ConstValue, Format};
use indexmap::IndexSet;
use std::fmt;

/// Textual output language of a generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    C,
    Vhdl,
    Gappa,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::C, Language::Vhdl, Language::Gappa];

    pub const fn name(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Vhdl => "vhdl",
            Language::Gappa => "gappa",
        }
    }

    pub fn from_name(name: &str) -> Option<Language> {
        Self::ALL.into_iter().find(|l| l.name().eq_ignore_ascii_case(name))
    }

    /// Token appended when a nested block opens (HDL blocks only indent).
    pub const fn block_open(self) -> &'static str {
        match self {
            Language::C => "{\n",
            Language::Vhdl | Language::Gappa => "",
        }
    }

    pub const fn block_close(self) -> &'static str {
        match self {
            Language::C => "}\n",
            Language::Vhdl | Language::Gappa => "",
        }
    }

    /// Text closing one block and reopening the next, e.g. `} else {`.
    pub fn block_link(self, transition: &str) -> Option<String> {
        match self {
            Language::C => Some(format!("}} {transition} {{\n")),
            Language::Vhdl => Some(format!("{transition}\n")),
            Language::Gappa => None,
        }
    }

    pub fn comment(self, text: &str) -> String {
        match self {
            Language::C => format!("/* {text} */\n"),
            Language::Vhdl => format!("-- {text}\n"),
            Language::Gappa => format!("# {text}\n"),
        }
    }

    /// Assignment statement; HDL signals use the concurrent form.
    pub fn assignment(self, lhs: &str, rhs: &str, signal: bool) -> String {
        match self {
            Language::Vhdl if signal => format!("{lhs} <= {rhs};\n"),
            Language::Vhdl => format!("{lhs} := {rhs};\n"),
            Language::C | Language::Gappa => format!("{lhs} = {rhs};\n"),
        }
    }

    /// Type spelling used for declarations and the `{t}` template placeholder.
    /// Verification scripts spell a format through its rounding operator.
    pub fn type_name(self, format: &Format) -> String {
        match self {
            Language::C => format.c_name(),
            Language::Vhdl => format.vhdl_name(),
            Language::Gappa => match format {
                Format::Binary16 => "float<ieee_16,ne>".to_string(),
                Format::Binary32 => "float<ieee_32,ne>".to_string(),
                Format::Binary64 => "float<ieee_64,ne>".to_string(),
                Format::Fixed { frac, .. } => format!("fixed<-{frac},dn>"),
                Format::Int { .. } => "int<dn>".to_string(),
                _ => String::new(),
            },
        }
    }

    /// Header block: comments, then library and include clauses.
    pub fn header_code(
        self,
        comments: &[String],
        headers: &IndexSet<String>,
        libraries: &IndexSet<String>,
    ) -> String {
        let mut result = String::new();
        match self {
            Language::C => {
                if !comments.is_empty() {
                    result.push_str("/**\n");
                    for comment in comments {
                        result.push_str(&format!(" * {}\n", comment.replace('\n', "\n * ")));
                    }
                    result.push_str("**/\n");
                }
                for header in headers {
                    result.push_str(&format!("#include <{header}>\n"));
                }
            }
            Language::Vhdl => {
                if !comments.is_empty() {
                    result.push_str("--\n");
                    for comment in comments {
                        result.push_str(&format!("-- {}\n", comment.replace('\n', "\n-- ")));
                    }
                    result.push_str("--\n");
                }
                for library in libraries {
                    result.push_str(&format!("library {library};\n"));
                }
                for header in headers {
                    result.push_str(&format!("use {header};\n"));
                }
            }
            Language::Gappa => {
                for comment in comments {
                    result.push_str(&format!("# {}\n", comment.replace('\n', "\n# ")));
                }
            }
        }
        result
    }

    /// Literal spelling of `value` stored in `format`.
    pub fn literal(self, value: ConstValue, format: &Format) -> String {
        match self {
            Language::C => c_literal(value, format),
            Language::Vhdl => vhdl_literal(value, format),
            Language::Gappa => decimal(value.as_f64()),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shortest decimal spelling; integral values drop the fraction.
pub fn decimal(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value)
    } else {
        format!("{:?}", value)
    }
}

fn c_float(value: f64, suffix: &str) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value < 0.0 { "-INFINITY".to_string() } else { "INFINITY".to_string() }
    } else if suffix.is_empty() {
        format!("{value:?}")
    } else {
        format!("{:?}{suffix}", value as f32)
    }
}

fn c_literal(value: ConstValue, format: &Format) -> String {
    match format {
        Format::Binary16 | Format::Binary32 => c_float(value.as_f64(), "f"),
        Format::Binary64 => c_float(value.as_f64(), ""),
        Format::Bool => {
            if value.as_f64() != 0.0 { "1".to_string() } else { "0".to_string() }
        }
        Format::Int { signed, bits } => {
            let raw = match value {
                ConstValue::Int(v) => v,
                other => other.as_f64() as i64,
            };
            match (*signed, *bits) {
                (true, 64) => format!("{raw}ll"),
                (true, _) => format!("{raw}"),
                (false, 64) => format!("{}ull", raw as u64),
                (false, bits) => format!("{}u", (raw as u64) & ((1u64 << bits) - 1)),
            }
        }
        Format::Fixed { signed, .. } => {
            let bits = value.to_bits(format);
            if *signed {
                format!("{}", bits as i64)
            } else {
                format!("{}u", bits)
            }
        }
        Format::Vector { element, lanes } => lanes_literal(value, element, *lanes),
        Format::Register(reg) => lanes_literal(value, &reg.element(), reg.lanes()),
        Format::Table { storage, .. } => c_literal(value, storage),
        Format::Void | Format::LogicVector(_) => format!("{}", value.to_bits(format)),
    }
}

fn lanes_literal(value: ConstValue, element: &Format, lanes: u8) -> String {
    let lane = c_literal(value, element);
    let all: Vec<&str> = (0..lanes).map(|_| lane.as_str()).collect();
    format!("{{{}}}", all.join(", "))
}

fn vhdl_literal(value: ConstValue, format: &Format) -> String {
    if let Format::Bool = format {
        return if value.as_f64() != 0.0 { "'1'".to_string() } else { "'0'".to_string() };
    }
    if let Format::Table { storage, .. } = format {
        return vhdl_literal(value, storage);
    }
    let width = format.bit_size().clamp(1, 64) as usize;
    let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
    format!("\"{:0width$b}\"", value.to_bits(format) & mask, width = width)
}
