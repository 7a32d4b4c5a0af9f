//! SQL parameter type registry.
//!
//! Type names are matched case-insensitively. A parenthesized size or
//! precision suffix such as `varchar(100)` or `decimal(18, 4)` is stripped
//! before lookup; sizes travel in the parameter options instead.
//!
//! | Name | Variant |
//! |------|---------|
//! | tinyint, smallint, int, bigint | integer types |
//! | bit | [`DataType::Bit`] |
//! | real, float | floating point |
//! | decimal, numeric, money, smallmoney | exact numerics |
//! | char, varchar, nchar, nvarchar, text, ntext, xml | character data |
//! | binary, varbinary, image | binary data |
//! | date, time, datetime, datetime2, datetimeoffset, smalldatetime | temporal |
//! | uniqueidentifier, udt, tvp, variant | other |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    TinyInt,
    Bit,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Text,
    NText,
    Xml,
    Binary,
    VarBinary,
    Image,
    Date,
    Time,
    DateTime,
    DateTime2,
    DateTimeOffset,
    SmallDateTime,
    UniqueIdentifier,
    Udt,
    Tvp,
    Variant,
}

impl DataType {
    const REGISTRY: [(&'static str, Self); 31] = [
        ("tinyint", Self::TinyInt),
        ("bit", Self::Bit),
        ("smallint", Self::SmallInt),
        ("int", Self::Int),
        ("bigint", Self::BigInt),
        ("real", Self::Real),
        ("float", Self::Float),
        ("decimal", Self::Decimal),
        ("numeric", Self::Numeric),
        ("money", Self::Money),
        ("smallmoney", Self::SmallMoney),
        ("char", Self::Char),
        ("varchar", Self::VarChar),
        ("nchar", Self::NChar),
        ("nvarchar", Self::NVarChar),
        ("text", Self::Text),
        ("ntext", Self::NText),
        ("xml", Self::Xml),
        ("binary", Self::Binary),
        ("varbinary", Self::VarBinary),
        ("image", Self::Image),
        ("date", Self::Date),
        ("time", Self::Time),
        ("datetime", Self::DateTime),
        ("datetime2", Self::DateTime2),
        ("datetimeoffset", Self::DateTimeOffset),
        ("smalldatetime", Self::SmallDateTime),
        ("uniqueidentifier", Self::UniqueIdentifier),
        ("udt", Self::Udt),
        ("tvp", Self::Tvp),
        ("variant", Self::Variant),
    ];

    /// Resolve a user-facing type name such as `"NVarChar(50)"`.
    pub fn resolve(type_name: &str) -> Result<Self> {
        let base = type_name
            .split_once('(')
            .map_or(type_name, |(base, _)| base)
            .trim()
            .to_lowercase();

        Self::REGISTRY
            .iter()
            .find(|(name, _)| *name == base)
            .map(|(_, data_type)| *data_type)
            .ok_or_else(|| Error::InvalidDataType(type_name.to_string()))
    }

    /// Canonical lowercase registry name.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::REGISTRY
            .iter()
            .find(|(_, data_type)| *data_type == self)
            .map_or("variant", |(name, _)| name)
    }

    #[must_use]
    pub const fn is_character(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::VarChar
                | Self::NChar
                | Self::NVarChar
                | Self::Text
                | Self::NText
                | Self::Xml
        )
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_names() {
        assert_eq!(DataType::resolve("int").unwrap(), DataType::Int);
        assert_eq!(DataType::resolve("varchar").unwrap(), DataType::VarChar);
        assert_eq!(
            DataType::resolve("uniqueidentifier").unwrap(),
            DataType::UniqueIdentifier
        );
    }

    #[test]
    fn test_size_suffix_is_stripped() {
        assert_eq!(
            DataType::resolve("varchar(50)").unwrap(),
            DataType::resolve("varchar").unwrap()
        );
        assert_eq!(DataType::resolve("decimal(18, 4)").unwrap(), DataType::Decimal);
        assert_eq!(DataType::resolve("nvarchar(max)").unwrap(), DataType::NVarChar);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(DataType::resolve("NVarChar").unwrap(), DataType::NVarChar);
        assert_eq!(DataType::resolve("BIGINT").unwrap(), DataType::BigInt);
        assert_eq!(DataType::resolve(" Int ").unwrap(), DataType::Int);
    }

    #[test]
    fn test_unknown_type_fails() {
        let err = DataType::resolve("varchr(10)").unwrap_err();
        assert!(err.is_invalid_data_type());
        assert!(err.to_string().contains("varchr(10)"));

        assert!(DataType::resolve("").is_err());
        assert!(DataType::resolve("(50)").is_err());
    }

    #[test]
    fn test_every_variant_has_unique_name() {
        for (name, data_type) in DataType::REGISTRY {
            assert_eq!(data_type.name(), name);
            assert_eq!(name.parse::<DataType>().unwrap(), data_type);
        }
    }

    #[test]
    fn test_character_classification() {
        assert!(DataType::VarChar.is_character());
        assert!(DataType::Xml.is_character());
        assert!(!DataType::Int.is_character());
        assert!(!DataType::VarBinary.is_character());
    }
}
