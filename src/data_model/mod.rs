//! Attribute addressing and the value types a write can carry.

use std::fmt;

use crate::constants::{LONG_STRING_MAX_LEN, SHORT_STRING_MAX_LEN};

mod value;

pub use value::TypedValue;

/// Identifies one attribute on one endpoint of a remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePath {
    endpoint_id: u16,
    cluster_id: u32,
    attribute_id: u32,
    list_index: Option<u16>,
}

impl AttributePath {
    pub const fn new(endpoint_id: u16, cluster_id: u32, attribute_id: u32) -> Self {
        Self {
            endpoint_id,
            cluster_id,
            attribute_id,
            list_index: None,
        }
    }

    pub const fn with_list_index(mut self, list_index: u16) -> Self {
        self.list_index = Some(list_index);
        self
    }

    pub const fn endpoint_id(&self) -> u16 {
        self.endpoint_id
    }

    pub const fn cluster_id(&self) -> u32 {
        self.cluster_id
    }

    pub const fn attribute_id(&self) -> u32 {
        self.attribute_id
    }

    pub const fn list_index(&self) -> Option<u16> {
        self.list_index
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:#06x}/{:#06x}",
            self.endpoint_id, self.cluster_id, self.attribute_id
        )?;
        if let Some(index) = self.list_index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

/// Integer widths used by Matter's integer, bitmap and enum types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W24,
    W32,
    W40,
    W48,
    W56,
    W64,
}

impl IntWidth {
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W24 => 24,
            IntWidth::W32 => 32,
            IntWidth::W40 => 40,
            IntWidth::W48 => 48,
            IntWidth::W56 => 56,
            IntWidth::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    UInt(IntWidth),
    Int(IntWidth),
    Float32,
    Float64,
    CharString,
    LongCharString,
    OctetString,
    LongOctetString,
}

impl ValueType {
    /// Representable range of an integer type. Nullable attributes reserve
    /// one value of the range as the null sentinel: the maximum for unsigned
    /// types and the minimum for signed ones.
    pub fn integer_range(self, nullable: bool) -> Option<(i128, i128)> {
        let sentinel = i128::from(nullable);
        match self {
            ValueType::UInt(width) => {
                let max = (1i128 << width.bits()) - 1;
                Some((0, max - sentinel))
            }
            ValueType::Int(width) => {
                let half = 1i128 << (width.bits() - 1);
                Some((-half + sentinel, half - 1))
            }
            _ => None,
        }
    }

    /// Default maximum encoded length of string types.
    pub const fn default_max_len(self) -> Option<usize> {
        match self {
            ValueType::CharString | ValueType::OctetString => Some(SHORT_STRING_MAX_LEN),
            ValueType::LongCharString | ValueType::LongOctetString => Some(LONG_STRING_MAX_LEN),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::UInt(IntWidth::W8) => "uint8",
            ValueType::UInt(IntWidth::W16) => "uint16",
            ValueType::UInt(IntWidth::W24) => "uint24",
            ValueType::UInt(IntWidth::W32) => "uint32",
            ValueType::UInt(IntWidth::W40) => "uint40",
            ValueType::UInt(IntWidth::W48) => "uint48",
            ValueType::UInt(IntWidth::W56) => "uint56",
            ValueType::UInt(IntWidth::W64) => "uint64",
            ValueType::Int(IntWidth::W8) => "int8",
            ValueType::Int(IntWidth::W16) => "int16",
            ValueType::Int(IntWidth::W24) => "int24",
            ValueType::Int(IntWidth::W32) => "int32",
            ValueType::Int(IntWidth::W40) => "int40",
            ValueType::Int(IntWidth::W48) => "int48",
            ValueType::Int(IntWidth::W56) => "int56",
            ValueType::Int(IntWidth::W64) => "int64",
            ValueType::Float32 => "single",
            ValueType::Float64 => "double",
            ValueType::CharString => "char_string",
            ValueType::LongCharString => "long_char_string",
            ValueType::OctetString => "octet_string",
            ValueType::LongOctetString => "long_octet_string",
        }
    }

    /// Name of the parameter type as exposed through the registry.
    pub const fn parameter_type(self) -> &'static str {
        match self {
            ValueType::Boolean => "Boolean",
            ValueType::UInt(IntWidth::W8 | IntWidth::W16)
            | ValueType::Int(IntWidth::W8 | IntWidth::W16) => "Integer",
            ValueType::UInt(_) | ValueType::Int(_) => "Long",
            ValueType::Float32 => "Float",
            ValueType::Float64 => "Double",
            ValueType::CharString | ValueType::LongCharString => "String",
            ValueType::OctetString | ValueType::LongOctetString => "byte[]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeType {
    pub value_type: ValueType,
    pub nullable: bool,
}

impl AttributeType {
    pub const fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            nullable: false,
        }
    }

    pub const fn nullable(value_type: ValueType) -> Self {
        Self {
            value_type,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Constraint {
    #[default]
    None,
    /// Inclusive integer range
    Range { min: i64, max: i64 },
    /// Maximum length in bytes of a string or octet string
    MaxLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ranges() {
        assert_eq!(ValueType::UInt(IntWidth::W8).integer_range(false), Some((0, 255)));
        assert_eq!(ValueType::UInt(IntWidth::W8).integer_range(true), Some((0, 254)));
        assert_eq!(
            ValueType::Int(IntWidth::W16).integer_range(false),
            Some((-32768, 32767))
        );
        assert_eq!(
            ValueType::Int(IntWidth::W16).integer_range(true),
            Some((-32767, 32767))
        );
        assert_eq!(
            ValueType::UInt(IntWidth::W24).integer_range(false),
            Some((0, 0xFF_FFFF))
        );
        assert_eq!(
            ValueType::UInt(IntWidth::W64).integer_range(true),
            Some((0, u64::MAX as i128 - 1))
        );
        assert_eq!(ValueType::Boolean.integer_range(false), None);
    }

    #[test]
    fn test_path_display() {
        let path = AttributePath::new(1, 0x0006, 0x4001);
        assert_eq!(path.to_string(), "1/0x0006/0x4001");
        assert_eq!(path.with_list_index(2).to_string(), "1/0x0006/0x4001[2]");
        assert_eq!(path.list_index(), None);
    }
}
