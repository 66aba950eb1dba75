//! Scanner options.
//!
//! The set of options paperscan knows how to read and write on a device is
//! closed. Profiles and sessions both validate keys against [`ScanOption`], so
//! an unrecognized key is rejected at the boundary instead of being passed
//! through to the hardware.

use std::fmt;
use std::str::FromStr;

/// A recognized device option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanOption {
    /// Colour mode, e.g. `Color`, `Gray`, `Lineart`
    Mode,
    /// Resolution in dots per inch
    Resolution,
    /// Page height in millimetres
    PageHeight,
    Contrast,
    /// Paper source, e.g. `Flatbed`, `ADF Front`, `ADF Duplex`
    Source,
    /// Whether the feeder currently holds paper. Read-only.
    PageLoaded,
}

/// The kind of value an option holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Bool,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Str => "string",
            ValueKind::Int => "integer",
            ValueKind::Bool => "boolean",
        }
    }
}

impl ScanOption {
    pub const ALL: [ScanOption; 6] = [
        ScanOption::Mode,
        ScanOption::Resolution,
        ScanOption::PageHeight,
        ScanOption::Contrast,
        ScanOption::Source,
        ScanOption::PageLoaded,
    ];

    /// The key used for this option in configuration files and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOption::Mode => "mode",
            ScanOption::Resolution => "resolution",
            ScanOption::PageHeight => "page_height",
            ScanOption::Contrast => "contrast",
            ScanOption::Source => "source",
            ScanOption::PageLoaded => "page_loaded",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ScanOption::Mode | ScanOption::Source => ValueKind::Str,
            ScanOption::Resolution | ScanOption::PageHeight | ScanOption::Contrast => {
                ValueKind::Int
            }
            ScanOption::PageLoaded => ValueKind::Bool,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, ScanOption::PageLoaded)
    }

    /// Value a freshly opened device reports before any profile is applied.
    pub fn default_value(&self) -> OptionValue {
        match self {
            ScanOption::Mode => OptionValue::Str("Color".to_string()),
            ScanOption::Resolution => OptionValue::Int(300),
            ScanOption::PageHeight => OptionValue::Int(292),
            ScanOption::Contrast => OptionValue::Int(0),
            ScanOption::Source => OptionValue::Str("Flatbed".to_string()),
            ScanOption::PageLoaded => OptionValue::Bool(false),
        }
    }

    /// Whether `value` has the kind this option expects.
    pub fn accepts(&self, value: &OptionValue) -> bool {
        value.kind() == self.kind()
    }
}

impl fmt::Display for ScanOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a key is not one of the recognized options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOptionKey(pub String);

impl FromStr for ScanOption {
    type Err = UnknownOptionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScanOption::ALL
            .iter()
            .copied()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| UnknownOptionKey(s.to_string()))
    }
}

/// A primitive option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl OptionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Str(_) => ValueKind::Str,
            OptionValue::Int(_) => ValueKind::Int,
            OptionValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts a TOML scalar, returning `None` for tables, arrays, floats and dates.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::String(s) => Some(OptionValue::Str(s.clone())),
            toml::Value::Integer(i) => Some(OptionValue::Int(*i)),
            toml::Value::Boolean(b) => Some(OptionValue::Bool(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Str(s) => f.write_str(s),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_keys() {
        for option in ScanOption::ALL {
            assert_eq!(option.as_str().parse::<ScanOption>(), Ok(option));
        }
    }

    #[test]
    fn test_parse_unknown_key() {
        assert_eq!(
            "bogus".parse::<ScanOption>(),
            Err(UnknownOptionKey("bogus".to_string()))
        );
        // Keys are case sensitive
        assert!("Resolution".parse::<ScanOption>().is_err());
    }

    #[test]
    fn test_defaults_match_kind() {
        for option in ScanOption::ALL {
            assert!(option.accepts(&option.default_value()), "{}", option);
        }
    }

    #[test]
    fn test_accepts_rejects_wrong_kind() {
        assert!(ScanOption::Resolution.accepts(&OptionValue::Int(600)));
        assert!(!ScanOption::Resolution.accepts(&OptionValue::Str("600".into())));
        assert!(!ScanOption::Mode.accepts(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_only_page_loaded_is_read_only() {
        let read_only: Vec<_> = ScanOption::ALL
            .iter()
            .filter(|o| !o.is_writable())
            .collect();
        assert_eq!(read_only, vec![&ScanOption::PageLoaded]);
    }

    #[test]
    fn test_from_toml() {
        assert_eq!(
            OptionValue::from_toml(&toml::Value::Integer(300)),
            Some(OptionValue::Int(300))
        );
        assert_eq!(
            OptionValue::from_toml(&toml::Value::String("Gray".into())),
            Some(OptionValue::Str("Gray".into()))
        );
        assert_eq!(OptionValue::from_toml(&toml::Value::Float(1.5)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(OptionValue::Int(300).to_string(), "300");
        assert_eq!(OptionValue::Bool(true).to_string(), "true");
        assert_eq!(OptionValue::from("Color").to_string(), "Color");
    }
}
