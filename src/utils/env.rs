use std::{convert::Infallible, fmt, str::FromStr};

use error_stack::{Report, Result};

use crate::generator::Error;

/// A loosely typed parameter which may name an environment variable as
/// `${NAME}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Replaces a `${NAME}` reference with the variable's content, coerced by
    /// [`Value::from_str`]. Any other value is returned as is.
    pub fn resolve(self) -> Result<Self, Error> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_with(self, lookup: impl FnOnce(&str) -> Option<String>) -> Result<Self, Error> {
        let Self::Text(text) = self else {
            return Ok(self);
        };
        let Some(name) = text
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            return Ok(Self::Text(text));
        };

        match lookup(name) {
            Some(content) => Ok(content.parse().unwrap_or_else(|e: Infallible| match e {})),
            None => Err(Report::new(Error::Environment)
                .attach_printable(format!("Variable {name:?} is not set"))),
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(i) => Some(i as f64),
            Self::Float(f) => Some(f),
            Self::Text(_) => None,
        }
    }

    /// Resolves the value and requires it to be numeric.
    pub fn number(self, param: &'static str) -> Result<f64, Error> {
        let value = self.resolve()?;
        value.as_f64().ok_or_else(|| {
            Report::new(Error::InvalidParameter)
                .attach_printable(format!("{param} must be numeric, got {value}"))
        })
    }
}

impl FromStr for Value {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if let Ok(i) = s.parse() {
            Self::Int(i)
        } else if let Ok(f) = s.parse() {
            Self::Float(f)
        } else {
            Self::Text(s.to_string())
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
