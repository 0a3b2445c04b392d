use serde::Serialize;
use std::fmt;

/// A literal stored in the config store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    Tuple(Vec<ConfigValue>),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn pair(a: f64, b: f64) -> Self {
        ConfigValue::Tuple(vec![ConfigValue::Number(a), ConfigValue::Number(b)])
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ConfigValue::None)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Two-element numeric tuple or list
    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            ConfigValue::Tuple(items) | ConfigValue::List(items) if items.len() == 2 => {
                Some((items[0].as_f64()?, items[1].as_f64()?))
            }
            _ => None,
        }
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[ConfigValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Renders the literal in the same grammar `parse_literal` accepts
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::None => write!(f, "None"),
            ConfigValue::Bool(true) => write!(f, "True"),
            ConfigValue::Bool(false) => write!(f, "False"),
            ConfigValue::Number(n) if n.is_nan() => write!(f, "nan"),
            ConfigValue::Number(n) => write!(f, "{}", n),
            ConfigValue::Str(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
            ConfigValue::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            ConfigValue::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
        }
    }
}
