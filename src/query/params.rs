//! Named parameters and their conversion into bindable values.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RunnerError};

/// Type hint controlling how a parameter's text value is marshalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Null,
}

impl FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let name = lower.strip_prefix("pdo::").unwrap_or(&lower);
        let name = name.strip_prefix("param_").unwrap_or(name);
        match name {
            "string" | "str" | "text" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "boolean" | "bool" => Ok(Self::Boolean),
            "null" => Ok(Self::Null),
            _ => Err(format!(
                "Invalid parameter type: {s}. Expected: string, int, bool, or null"
            )),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A value bound to one `:name` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedParameter {
    /// Placeholder name without the leading colon.
    pub name: String,
    /// Value in text form.
    pub value: String,
    /// Optional marshalling hint; text when absent.
    pub type_hint: Option<ParamType>,
}

impl NamedParameter {
    /// Creates an untyped parameter. A leading `:` on the name is ignored.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let name = match name.strip_prefix(':') {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        Self {
            name,
            value: value.into(),
            type_hint: None,
        }
    }

    /// Creates a parameter with an explicit type hint.
    pub fn typed(name: impl Into<String>, value: impl Into<String>, hint: ParamType) -> Self {
        Self::new(name, value).with_type(hint)
    }

    /// Creates a parameter bound as SQL NULL.
    pub fn null(name: impl Into<String>) -> Self {
        Self::typed(name, "", ParamType::Null)
    }

    /// Sets the type hint.
    pub fn with_type(mut self, hint: ParamType) -> Self {
        self.type_hint = Some(hint);
        self
    }

    /// Builds an untyped parameter list from `(name, value)` pairs, keeping order.
    pub fn from_pairs<I, N, V>(pairs: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(name, value)| Self::new(name, value))
            .collect()
    }

    /// Parses `name=value` or `name:type=value`.
    pub fn parse_assignment(s: &str) -> std::result::Result<Self, String> {
        let (target, value) = s
            .split_once('=')
            .ok_or_else(|| format!("Invalid parameter '{s}'. Expected NAME=VALUE or NAME:TYPE=VALUE"))?;
        let target = target.trim().trim_start_matches(':');

        let (name, hint) = match target.split_once(':') {
            Some((name, hint)) => (name, Some(hint.parse::<ParamType>()?)),
            None => (target, None),
        };

        if name.is_empty() {
            return Err(format!("Invalid parameter '{s}'. Name is empty"));
        }

        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
            type_hint: hint,
        })
    }

    /// Converts the text value according to the type hint.
    pub fn to_bound(&self) -> Result<BoundValue> {
        match self.type_hint {
            None | Some(ParamType::String) => Ok(BoundValue::Text(self.value.clone())),
            Some(ParamType::Integer) => self
                .value
                .trim()
                .parse::<i64>()
                .map(BoundValue::Int)
                .map_err(|_| {
                    RunnerError::sql(format!(
                        "type mismatch: parameter ':{}' value '{}' is not an integer",
                        self.name, self.value
                    ))
                }),
            Some(ParamType::Boolean) => parse_bool(&self.value)
                .map(BoundValue::Bool)
                .ok_or_else(|| {
                    RunnerError::sql(format!(
                        "type mismatch: parameter ':{}' value '{}' is not a boolean",
                        self.name, self.value
                    ))
                }),
            Some(ParamType::Null) => Ok(BoundValue::Null),
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A parameter value after type conversion, ready for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Null,
}
