//! Naming strategies: how entity and property names map to schema names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IrError;

/// Case conversion applied to entity and property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    /// Names are used as written
    #[default]
    Literal,
    SnakeCase,
    CamelCase,
    UpperCase,
    LowerCase,
}

impl Case {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Case::Literal => name.to_string(),
            Case::SnakeCase => to_snake_case(name),
            Case::CamelCase => to_camel_case(name),
            Case::UpperCase => name.to_uppercase(),
            Case::LowerCase => name.to_lowercase(),
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Case::Literal => "literal",
            Case::SnakeCase => "snake_case",
            Case::CamelCase => "camel_case",
            Case::UpperCase => "upper_case",
            Case::LowerCase => "lower_case",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Case {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "literal" => Ok(Case::Literal),
            "snake_case" | "snake" => Ok(Case::SnakeCase),
            "camel_case" | "camel" => Ok(Case::CamelCase),
            "upper_case" | "upper" => Ok(Case::UpperCase),
            "lower_case" | "lower" => Ok(Case::LowerCase),
            other => Err(IrError::Config(format!("unknown naming case '{}'", other))),
        }
    }
}

/// Maps IR names to schema names and decides quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingStrategy {
    pub case: Case,
    /// Quote every identifier, not only reserved words
    pub escape: bool,
}

impl NamingStrategy {
    pub fn new(case: Case) -> Self {
        Self {
            case,
            escape: false,
        }
    }

    pub fn escaped(mut self) -> Self {
        self.escape = true;
        self
    }

    /// Schema name for an entity or property name.
    pub fn apply(&self, name: &str) -> String {
        self.case.apply(name)
    }

    /// Whether `name` renders as something other than itself.
    pub fn diverges(&self, name: &str) -> bool {
        self.escape || self.apply(name) != name
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
