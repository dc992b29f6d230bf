//! Typed PLC values and their textual entry points.
//!
//! Every value that enters the model passes through [`PlcValue::parse`] or
//! [`PlcValue::validate`]. The codec and the test engine assume the domain
//! was already checked and never re-validate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Smallest magnitude accepted for a REAL value (denormals are rejected).
pub const REAL_MIN_MAGNITUDE: f32 = 1.18e-38;

/// Largest magnitude accepted for a REAL value.
pub const REAL_MAX_MAGNITUDE: f32 = 3.40e38;

/// Data types of the target controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlcDataType {
    Bit,
    Byte,
    Word,
    Dword,
    Int,
    Dint,
    Real,
}

impl PlcDataType {
    pub const ALL: [PlcDataType; 7] = [
        Self::Bit,
        Self::Byte,
        Self::Word,
        Self::Dword,
        Self::Int,
        Self::Dint,
        Self::Real,
    ];

    /// Number of image bytes touched by a value of this type.
    ///
    /// A BIT occupies a single bit but still lives inside one byte.
    pub fn byte_width(self) -> usize {
        match self {
            Self::Bit | Self::Byte => 1,
            Self::Word | Self::Int => 2,
            Self::Dword | Self::Dint | Self::Real => 4,
        }
    }

    /// Whether the bit address of a signal is meaningful for this type.
    pub fn is_bit(self) -> bool {
        matches!(self, Self::Bit)
    }

    fn domain(self) -> &'static str {
        match self {
            Self::Bit => "0 or 1",
            Self::Byte => "0 to 255",
            Self::Word => "0 to 65535",
            Self::Dword => "0 to 4294967295",
            Self::Int => "-32768 to 32767",
            Self::Dint => "-2147483648 to 2147483647",
            Self::Real => "0, ±1.18e-38 to ±3.40e38",
        }
    }
}

impl fmt::Display for PlcDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bit => "BIT",
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::Dword => "DWORD",
            Self::Int => "INT",
            Self::Dint => "DINT",
            Self::Real => "REAL",
        };
        f.write_str(name)
    }
}

/// Errors raised when a value enters the model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("'{text}' is not a valid {data_type} value")]
    NumberFormat { text: String, data_type: PlcDataType },

    #[error("{value} is out of range for {data_type} (allowed: {domain})")]
    Range {
        value: String,
        data_type: PlcDataType,
        domain: &'static str,
    },
}

impl ValueError {
    fn range(value: impl fmt::Display, data_type: PlcDataType) -> Self {
        ValueError::Range {
            value: value.to_string(),
            data_type,
            domain: data_type.domain(),
        }
    }
}

/// A value tagged with its PLC data type.
///
/// Equality is exact: REAL values compare bit for bit, so `0.0` and `-0.0`
/// are different values and a NaN equals itself.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum PlcValue {
    Bit(bool),
    Byte(u8),
    Word(u16),
    Dword(u32),
    Int(i16),
    Dint(i32),
    Real(f32),
}

impl PartialEq for PlcValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bit(a), Self::Bit(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Word(a), Self::Word(b)) => a == b,
            (Self::Dword(a), Self::Dword(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Dint(a), Self::Dint(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for PlcValue {}

impl PlcValue {
    /// The zero value of `data_type`.
    pub fn zero(data_type: PlcDataType) -> Self {
        match data_type {
            PlcDataType::Bit => Self::Bit(false),
            PlcDataType::Byte => Self::Byte(0),
            PlcDataType::Word => Self::Word(0),
            PlcDataType::Dword => Self::Dword(0),
            PlcDataType::Int => Self::Int(0),
            PlcDataType::Dint => Self::Dint(0),
            PlcDataType::Real => Self::Real(0.0),
        }
    }

    pub fn data_type(&self) -> PlcDataType {
        match self {
            Self::Bit(_) => PlcDataType::Bit,
            Self::Byte(_) => PlcDataType::Byte,
            Self::Word(_) => PlcDataType::Word,
            Self::Dword(_) => PlcDataType::Dword,
            Self::Int(_) => PlcDataType::Int,
            Self::Dint(_) => PlcDataType::Dint,
            Self::Real(_) => PlcDataType::Real,
        }
    }

    /// Parse user-entered text as a value of `data_type`.
    ///
    /// BIT accepts `0`, `1`, `true` and `false`. Integer types reject text
    /// that is not an integer with [`ValueError::NumberFormat`] and integers
    /// outside the type width with [`ValueError::Range`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use plc_conformance::core::{PlcDataType, PlcValue, ValueError};
    ///
    /// assert_eq!(PlcValue::parse(PlcDataType::Int, "-12").unwrap(), PlcValue::Int(-12));
    /// assert!(matches!(
    ///     PlcValue::parse(PlcDataType::Byte, "256"),
    ///     Err(ValueError::Range { .. })
    /// ));
    /// assert!(matches!(
    ///     PlcValue::parse(PlcDataType::Word, "twelve"),
    ///     Err(ValueError::NumberFormat { .. })
    /// ));
    /// ```
    pub fn parse(data_type: PlcDataType, text: &str) -> Result<Self, ValueError> {
        let trimmed = text.trim();
        let format_error = || ValueError::NumberFormat {
            text: text.to_string(),
            data_type,
        };

        match data_type {
            PlcDataType::Bit => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(Self::Bit(true)),
                "0" | "false" => Ok(Self::Bit(false)),
                _ => {
                    // A number other than 0/1 is a range problem, not a format one.
                    if trimmed.parse::<i64>().is_ok() {
                        Err(ValueError::range(trimmed, data_type))
                    } else {
                        Err(format_error())
                    }
                }
            },
            PlcDataType::Real => {
                let value: f64 = trimmed.parse().map_err(|_| format_error())?;
                if !value.is_finite() {
                    return Err(format_error());
                }
                let parsed = Self::Real(value as f32);
                parsed
                    .validate()
                    .map_err(|_| ValueError::range(trimmed, data_type))?;
                Ok(parsed)
            }
            _ => {
                let value: i64 = trimmed.parse().map_err(|_| format_error())?;
                let out_of_range = || ValueError::range(value, data_type);
                Ok(match data_type {
                    PlcDataType::Byte => Self::Byte(u8::try_from(value).map_err(|_| out_of_range())?),
                    PlcDataType::Word => Self::Word(u16::try_from(value).map_err(|_| out_of_range())?),
                    PlcDataType::Dword => {
                        Self::Dword(u32::try_from(value).map_err(|_| out_of_range())?)
                    }
                    PlcDataType::Int => Self::Int(i16::try_from(value).map_err(|_| out_of_range())?),
                    PlcDataType::Dint => {
                        Self::Dint(i32::try_from(value).map_err(|_| out_of_range())?)
                    }
                    PlcDataType::Bit | PlcDataType::Real => unreachable!("handled above"),
                })
            }
        }
    }

    /// Check the value against its type domain.
    ///
    /// Only REAL can be out of domain once constructed: NaN, infinities,
    /// denormals and magnitudes beyond ±3.40e38 are rejected.
    pub fn validate(&self) -> Result<(), ValueError> {
        match *self {
            Self::Real(value) => {
                let magnitude = value.abs();
                let in_domain = value == 0.0
                    || (REAL_MIN_MAGNITUDE..=REAL_MAX_MAGNITUDE).contains(&magnitude);
                if in_domain {
                    Ok(())
                } else {
                    Err(ValueError::range(value, PlcDataType::Real))
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(value) => write!(f, "{}", u8::from(*value)),
            Self::Byte(value) => write!(f, "{value}"),
            Self::Word(value) => write!(f, "{value}"),
            Self::Dword(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Dint(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value:e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_bit_spellings() {
        assert_eq!(PlcValue::parse(PlcDataType::Bit, "1").unwrap(), PlcValue::Bit(true));
        assert_eq!(PlcValue::parse(PlcDataType::Bit, " TRUE ").unwrap(), PlcValue::Bit(true));
        assert_eq!(PlcValue::parse(PlcDataType::Bit, "false").unwrap(), PlcValue::Bit(false));
    }

    #[test]
    fn parse_separates_format_and_range_errors() {
        assert!(matches!(
            PlcValue::parse(PlcDataType::Bit, "2"),
            Err(ValueError::Range { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Bit, "on"),
            Err(ValueError::NumberFormat { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Int, "32768"),
            Err(ValueError::Range { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Dword, "-1"),
            Err(ValueError::Range { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Dint, "1.5"),
            Err(ValueError::NumberFormat { .. })
        ));
    }

    #[test]
    fn parse_integer_boundaries() {
        assert_eq!(
            PlcValue::parse(PlcDataType::Dword, "4294967295").unwrap(),
            PlcValue::Dword(u32::MAX)
        );
        assert_eq!(
            PlcValue::parse(PlcDataType::Dint, "-2147483648").unwrap(),
            PlcValue::Dint(i32::MIN)
        );
        assert_eq!(
            PlcValue::parse(PlcDataType::Int, "-32768").unwrap(),
            PlcValue::Int(i16::MIN)
        );
    }

    #[test]
    fn real_domain_rejects_denormals_and_overflow() {
        assert!(PlcValue::parse(PlcDataType::Real, "0").is_ok());
        assert!(PlcValue::parse(PlcDataType::Real, "1.18e-38").is_ok());
        assert!(PlcValue::parse(PlcDataType::Real, "-3.40e38").is_ok());
        assert!(matches!(
            PlcValue::parse(PlcDataType::Real, "1e-40"),
            Err(ValueError::Range { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Real, "3.5e38"),
            Err(ValueError::Range { .. })
        ));
        assert!(matches!(
            PlcValue::parse(PlcDataType::Real, "NaN"),
            Err(ValueError::NumberFormat { .. })
        ));
        assert!(PlcValue::Real(f32::MAX).validate().is_err());
        assert!(PlcValue::Real(f32::MIN_POSITIVE / 2.0).validate().is_err());
    }

    #[test]
    fn real_equality_is_bitwise() {
        assert_ne!(PlcValue::Real(0.0), PlcValue::Real(-0.0));
        assert_eq!(PlcValue::Real(1.5), PlcValue::Real(1.5));
        assert_ne!(PlcValue::Int(1), PlcValue::Dint(1));
    }

    #[test]
    fn zero_matches_type() {
        for data_type in PlcDataType::ALL {
            assert_eq!(PlcValue::zero(data_type).data_type(), data_type);
        }
    }

    #[test]
    fn value_serializes_with_type_tag() {
        let json = serde_json::to_string(&PlcValue::Word(7)).unwrap();
        assert_eq!(json, r#"{"type":"WORD","value":7}"#);
        let back: PlcValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlcValue::Word(7));
    }
}
