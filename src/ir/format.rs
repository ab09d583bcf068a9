//! Semantic formats carried by operation-graph nodes.
//!
//! A [`Format`] is the type of a value: an IEEE binary format, a machine
//! integer, a fixed-point number, a generic vector, a target register
//! format (x86 `__m128`/`__m256` families), an HDL logic vector or a
//! table of values. Rule tables match operand and result formats either
//! exactly or through a [`FormatClass`].

use std::fmt;

/// x86 SIMD register formats. Several logical layouts share one C type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterFormat {
    M128V1Float32,
    M128V4Float32,
    M128V1Float64,
    M128V2Float64,
    M128V1Int32,
    M128V4Int32,
    M128V1Int64,
    M128V2Int64,
    M256V8Float32,
    M256V4Float64,
    M256V8Int32,
    M256V4Int64,
}

impl RegisterFormat {
    const ALL: [RegisterFormat; 12] = [
        RegisterFormat::M128V1Float32,
        RegisterFormat::M128V4Float32,
        RegisterFormat::M128V1Float64,
        RegisterFormat::M128V2Float64,
        RegisterFormat::M128V1Int32,
        RegisterFormat::M128V4Int32,
        RegisterFormat::M128V1Int64,
        RegisterFormat::M128V2Int64,
        RegisterFormat::M256V8Float32,
        RegisterFormat::M256V4Float64,
        RegisterFormat::M256V8Int32,
        RegisterFormat::M256V4Int64,
    ];

    /// C type used for the register.
    pub const fn c_name(self) -> &'static str {
        use RegisterFormat::*;
        match self {
            M128V1Float32 | M128V4Float32 => "__m128",
            M128V1Float64 | M128V2Float64 => "__m128d",
            M128V1Int32 | M128V4Int32 | M128V1Int64 | M128V2Int64 => "__m128i",
            M256V8Float32 => "__m256",
            M256V4Float64 => "__m256d",
            M256V8Int32 | M256V4Int64 => "__m256i",
        }
    }

    /// Name used in the textual graph format.
    pub const fn name(self) -> &'static str {
        use RegisterFormat::*;
        match self {
            M128V1Float32 => "m128_v1float32",
            M128V4Float32 => "m128_v4float32",
            M128V1Float64 => "m128_v1float64",
            M128V2Float64 => "m128_v2float64",
            M128V1Int32 => "m128_v1int32",
            M128V4Int32 => "m128_v4int32",
            M128V1Int64 => "m128_v1int64",
            M128V2Int64 => "m128_v2int64",
            M256V8Float32 => "m256_v8float32",
            M256V4Float64 => "m256_v4float64",
            M256V8Int32 => "m256_v8int32",
            M256V4Int64 => "m256_v4int64",
        }
    }

    pub const fn bit_size(self) -> u32 {
        use RegisterFormat::*;
        match self {
            M256V8Float32 | M256V4Float64 | M256V8Int32 | M256V4Int64 => 256,
            _ => 128,
        }
    }

    /// Number of meaningful lanes in the register.
    pub const fn lanes(self) -> u8 {
        use RegisterFormat::*;
        match self {
            M128V1Float32 | M128V1Float64 | M128V1Int32 | M128V1Int64 => 1,
            M128V2Float64 | M128V2Int64 => 2,
            M128V4Float32 | M128V4Int32 | M256V4Float64 | M256V4Int64 => 4,
            M256V8Float32 | M256V8Int32 => 8,
        }
    }

    pub fn element(self) -> Format {
        use RegisterFormat::*;
        match self {
            M128V1Float32 | M128V4Float32 | M256V8Float32 => Format::Binary32,
            M128V1Float64 | M128V2Float64 | M256V4Float64 => Format::Binary64,
            M128V1Int32 | M128V4Int32 | M256V8Int32 => Format::INT32,
            M128V1Int64 | M128V2Int64 | M256V4Int64 => Format::INT64,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

/// Type of a value in the operation graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    Void,
    Bool,
    Binary16,
    Binary32,
    Binary64,
    Int { signed: bool, bits: u8 },
    Fixed { signed: bool, integer: u16, frac: u16 },
    Vector { element: Box<Format>, lanes: u8 },
    Register(RegisterFormat),
    LogicVector(u32),
    Table { storage: Box<Format>, size: u32 },
}

impl Format {
    pub const INT32: Format = Format::Int { signed: true, bits: 32 };
    pub const INT64: Format = Format::Int { signed: true, bits: 64 };
    pub const UINT32: Format = Format::Int { signed: false, bits: 32 };
    pub const UINT64: Format = Format::Int { signed: false, bits: 64 };

    pub fn vector(element: Format, lanes: u8) -> Format {
        Format::Vector { element: Box::new(element), lanes }
    }

    pub fn v4float32() -> Format {
        Format::vector(Format::Binary32, 4)
    }

    pub fn table(storage: Format, size: u32) -> Format {
        Format::Table { storage: Box::new(storage), size }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Format::Binary16 | Format::Binary32 | Format::Binary64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Format::Int { .. })
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Format::Fixed { .. })
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Format::Vector { .. } | Format::Register(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Format::Table { .. })
    }

    /// Widest fixed-point format accepted by [`Format::parse`].
    pub const MAX_FIXED_WIDTH: u32 = 64;

    /// Total storage width in bits (0 for void and tables).
    pub fn bit_size(&self) -> u32 {
        match self {
            Format::Void | Format::Table { .. } => 0,
            Format::Bool => 1,
            Format::Binary16 => 16,
            Format::Binary32 => 32,
            Format::Binary64 => 64,
            Format::Int { bits, .. } => *bits as u32,
            Format::Fixed { integer, frac, .. } => u32::from(*integer) + u32::from(*frac),
            Format::Vector { element, lanes } => element.bit_size() * *lanes as u32,
            Format::Register(reg) => reg.bit_size(),
            Format::LogicVector(width) => *width,
        }
    }

    /// Width of the explicit mantissa field for IEEE formats.
    pub fn field_size(&self) -> Option<u32> {
        match self {
            Format::Binary16 => Some(10),
            Format::Binary32 => Some(23),
            Format::Binary64 => Some(52),
            _ => None,
        }
    }

    /// Number of fractional bits for fixed-point formats.
    pub fn frac_size(&self) -> Option<u32> {
        match self {
            Format::Fixed { frac, .. } => Some(*frac as u32),
            Format::Int { .. } => Some(0),
            _ => None,
        }
    }

    /// C type name; tables resolve to their storage type.
    pub fn c_name(&self) -> String {
        match self {
            Format::Void => "void".to_string(),
            Format::Bool => "int".to_string(),
            Format::Binary16 => "_Float16".to_string(),
            Format::Binary32 => "float".to_string(),
            Format::Binary64 => "double".to_string(),
            Format::Int { signed, bits } => {
                format!("{}int{}_t", if *signed { "" } else { "u" }, bits)
            }
            Format::Fixed { signed, integer, frac } => {
                let bits = match u32::from(*integer) + u32::from(*frac) {
                    0..=8 => 8,
                    9..=16 => 16,
                    17..=32 => 32,
                    _ => 64,
                };
                format!("{}int{}_t", if *signed { "" } else { "u" }, bits)
            }
            Format::Vector { element, lanes } => {
                let scalar = match element.as_ref() {
                    Format::Binary32 => "float".to_string(),
                    Format::Binary64 => "double".to_string(),
                    Format::Int { signed, bits } => {
                        let base = if *bits > 32 { "long" } else { "int" };
                        format!("{}{base}", if *signed { "" } else { "u" })
                    }
                    other => other.c_name(),
                };
                format!("ml_{scalar}{lanes}_t")
            }
            Format::Register(reg) => reg.c_name().to_string(),
            Format::LogicVector(_) => "uint64_t".to_string(),
            Format::Table { storage, .. } => storage.c_name(),
        }
    }

    /// VHDL type name.
    pub fn vhdl_name(&self) -> String {
        match self {
            Format::Bool => "std_logic".to_string(),
            Format::Table { storage, .. } => storage.vhdl_name(),
            other => format!("std_logic_vector({} downto 0)", other.bit_size().max(1) - 1),
        }
    }

    /// Parse the textual name produced by `Display` (tables excluded).
    pub fn parse(text: &str) -> Option<Format> {
        let text = text.trim();
        let simple = match text {
            "void" => Some(Format::Void),
            "bool" => Some(Format::Bool),
            "binary16" => Some(Format::Binary16),
            "binary32" => Some(Format::Binary32),
            "binary64" => Some(Format::Binary64),
            _ => None,
        };
        if simple.is_some() {
            return simple;
        }
        if let Some(reg) = RegisterFormat::from_name(text) {
            return Some(Format::Register(reg));
        }
        if let Some(width) = text.strip_prefix("slv") {
            return width.parse().ok().filter(|w| *w > 0).map(Format::LogicVector);
        }
        for (prefix, signed) in [("sfix", true), ("ufix", false)] {
            if let Some(rest) = text.strip_prefix(prefix) {
                let (integer, frac) = rest.split_once('.')?;
                let (integer, frac): (u16, u16) = (integer.parse().ok()?, frac.parse().ok()?);
                // fixed-point values are carried in at most 64 bits
                if !(1..=Format::MAX_FIXED_WIDTH).contains(&(u32::from(integer) + u32::from(frac))) {
                    return None;
                }
                return Some(Format::Fixed { signed, integer, frac });
            }
        }
        if let Some(rest) = text.strip_prefix('v') {
            let split = rest.find(|c: char| !c.is_ascii_digit())?;
            let lanes: u8 = rest[..split].parse().ok()?;
            let element = match &rest[split..] {
                "float32" => Format::Binary32,
                "float64" => Format::Binary64,
                scalar => Format::parse(scalar).filter(|f| f.is_integer())?,
            };
            return Some(Format::vector(element, lanes));
        }
        for (prefix, signed) in [("uint", false), ("int", true)] {
            if let Some(bits) = text.strip_prefix(prefix) {
                let bits: u8 = bits.parse().ok()?;
                if matches!(bits, 8 | 16 | 32 | 64) {
                    return Some(Format::Int { signed, bits });
                }
                return None;
            }
        }
        None
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Void => write!(f, "void"),
            Format::Bool => write!(f, "bool"),
            Format::Binary16 => write!(f, "binary16"),
            Format::Binary32 => write!(f, "binary32"),
            Format::Binary64 => write!(f, "binary64"),
            Format::Int { signed, bits } => {
                write!(f, "{}int{}", if *signed { "" } else { "u" }, bits)
            }
            Format::Fixed { signed, integer, frac } => {
                write!(f, "{}fix{}.{}", if *signed { "s" } else { "u" }, integer, frac)
            }
            Format::Vector { element, lanes } => match element.as_ref() {
                Format::Binary32 => write!(f, "v{lanes}float32"),
                Format::Binary64 => write!(f, "v{lanes}float64"),
                other => write!(f, "v{lanes}{other}"),
            },
            Format::Register(reg) => write!(f, "{}", reg.name()),
            Format::LogicVector(width) => write!(f, "slv{width}"),
            Format::Table { storage, size } => write!(f, "table<{storage},{size}>"),
        }
    }
}

/// Structural format classes used by rule signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatClass {
    Any,
    FloatingPoint,
    Integer,
    FixedPoint,
    Vector,
    TableBacked,
    LogicVector,
}

impl FormatClass {
    pub fn matches(self, format: &Format) -> bool {
        match self {
            FormatClass::Any => true,
            FormatClass::FloatingPoint => format.is_float(),
            FormatClass::Integer => format.is_integer(),
            FormatClass::FixedPoint => format.is_fixed(),
            FormatClass::Vector => format.is_vector(),
            FormatClass::TableBacked => format.is_table(),
            FormatClass::LogicVector => {
                matches!(format, Format::LogicVector(_) | Format::Int { .. } | Format::Fixed { .. })
            }
        }
    }

    /// True when every format accepted by `other` is also accepted by `self`.
    pub fn includes(self, other: FormatClass) -> bool {
        self == other
            || self == FormatClass::Any
            || (self == FormatClass::LogicVector
                && matches!(other, FormatClass::Integer | FormatClass::FixedPoint))
    }
}

impl fmt::Display for FormatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatClass::Any => "any",
            FormatClass::FloatingPoint => "float",
            FormatClass::Integer => "integer",
            FormatClass::FixedPoint => "fixed",
            FormatClass::Vector => "vector",
            FormatClass::TableBacked => "table",
            FormatClass::LogicVector => "logic",
        };
        write!(f, "<{name}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(Format::parse("binary32"), Some(Format::Binary32));
        assert_eq!(Format::parse("int32"), Some(Format::INT32));
        assert_eq!(Format::parse("uint64"), Some(Format::UINT64));
        assert_eq!(Format::parse("int12"), None);
        assert_eq!(
            Format::parse("sfix3.12"),
            Some(Format::Fixed { signed: true, integer: 3, frac: 12 })
        );
        assert_eq!(Format::parse("v4float32"), Some(Format::v4float32()));
        assert_eq!(
            Format::parse("m128_v1float32"),
            Some(Format::Register(RegisterFormat::M128V1Float32))
        );
        assert_eq!(Format::parse("slv8"), Some(Format::LogicVector(8)));
        assert_eq!(Format::parse("quad"), None);
    }

    #[test]
    fn test_parse_rejects_oversized_fixed_point() {
        assert_eq!(
            Format::parse("ufix1.63"),
            Some(Format::Fixed { signed: false, integer: 1, frac: 63 })
        );
        assert_eq!(Format::parse("ufix1.70"), None);
        assert_eq!(Format::parse("sfix0.0"), None);
        assert_eq!(Format::parse("sfix65535.65535"), None);
    }

    #[test]
    fn test_display_matches_parse() {
        for name in ["binary64", "uint8", "ufix1.15", "v8float32", "m256_v8int32", "slv17"] {
            let format = Format::parse(name).unwrap();
            assert_eq!(format.to_string(), name);
        }
    }

    #[test]
    fn test_c_names() {
        assert_eq!(Format::Binary32.c_name(), "float");
        assert_eq!(Format::UINT32.c_name(), "uint32_t");
        assert_eq!(Format::v4float32().c_name(), "ml_float4_t");
        assert_eq!(Format::vector(Format::INT32, 8).c_name(), "ml_int8_t");
        assert_eq!(Format::vector(Format::UINT64, 4).c_name(), "ml_ulong4_t");
        assert_eq!(Format::Register(RegisterFormat::M128V2Float64).c_name(), "__m128d");
        assert_eq!(Format::table(Format::Binary64, 16).c_name(), "double");
    }

    #[test]
    fn test_vhdl_names() {
        assert_eq!(Format::LogicVector(8).vhdl_name(), "std_logic_vector(7 downto 0)");
        assert_eq!(Format::Bool.vhdl_name(), "std_logic");
    }

    #[test]
    fn test_classes() {
        let table = Format::table(Format::Binary32, 8);
        assert!(FormatClass::TableBacked.matches(&table));
        assert!(!FormatClass::TableBacked.matches(&Format::Binary32));
        assert!(FormatClass::FloatingPoint.matches(&Format::Binary64));
        assert!(FormatClass::Vector.matches(&Format::Register(RegisterFormat::M128V4Float32)));
        assert!(FormatClass::Any.includes(FormatClass::Integer));
        assert!(!FormatClass::Integer.includes(FormatClass::Any));
    }

    #[test]
    fn test_field_sizes() {
        assert_eq!(Format::Binary32.field_size(), Some(23));
        assert_eq!(Format::Binary64.field_size(), Some(52));
        assert_eq!(Format::Fixed { signed: false, integer: 2, frac: 14 }.frac_size(), Some(14));
    }
}
