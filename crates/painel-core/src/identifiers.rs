use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// Everything outside the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    Main,
    Rondas,
}

impl SessionScope {
    pub const ALL: [SessionScope; 2] = [SessionScope::Main, SessionScope::Rondas];

    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Rondas => "rondas",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" => Some(Self::Main),
            "rondas" => Some(Self::Rondas),
            _ => None,
        }
    }

    pub fn login_route(&self) -> &'static str {
        match self {
            Self::Main => "/login",
            Self::Rondas => "/rondas/login",
        }
    }

    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Main => "/auth/login",
            Self::Rondas => "/rondas/login",
        }
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_owned()))
                }
            }
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    return Some(Self(value.to_string()));
                }
                if let Some(value) = number.as_u64() {
                    return Some(Self(value.to_string()));
                }
                let value = number.as_f64()?;
                if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    Some(Self((value as i64).to_string()))
                } else {
                    Some(Self(number.to_string()))
                }
            }
            Value::Bool(value) => Some(Self(value.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn path_segment(&self) -> String {
        encode_path_segment(&self.0)
    }
}

pub fn encode_path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

impl fmt::Display for RecordKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}
