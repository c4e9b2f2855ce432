//! Country code value object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Country (server location) code, normalized to trimmed lowercase.
///
/// Codes are opaque labels chosen by configuration (`"nl"`, `"hk"`, ...),
/// so only emptiness and whitespace are checked here. Whether a code is
/// actually served is decided by the provisioner registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Normalizes and validates a raw country code.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("country"));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid_format(
                "country",
                "must not contain whitespace",
            ));
        }
        Ok(Self(normalized))
    }

    /// Parses an optional raw code; blank input means "no country".
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => Self::new(value).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase label used in reports and messages.
    pub fn label(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CountryCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let code = CountryCode::new("  NL ").unwrap();
        assert_eq!(code.as_str(), "nl");
        assert_eq!(code.label(), "NL");
    }

    #[test]
    fn rejects_blank() {
        assert_eq!(
            CountryCode::new("   ").unwrap_err(),
            ValidationError::empty_field("country")
        );
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert!(CountryCode::new("n l").is_err());
    }

    #[test]
    fn blank_optional_is_none() {
        assert_eq!(CountryCode::parse_optional(Some(" ")).unwrap(), None);
        assert_eq!(CountryCode::parse_optional(None).unwrap(), None);
        assert_eq!(
            CountryCode::parse_optional(Some("HK")).unwrap(),
            Some(CountryCode::new("hk").unwrap())
        );
    }

    #[test]
    fn deserializes_with_normalization() {
        let code: CountryCode = serde_json::from_str("\"DE\"").unwrap();
        assert_eq!(code.as_str(), "de");
    }
}
