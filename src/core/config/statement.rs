//! Typed statements of the persisted config file.
//!
//! ```text
//! statement   := assignment | declaration
//! assignment  := 'config' '[' IDENT ']' '.' NAME '=' literal
//! declaration := IDENT '=' NAME '(' [arg (',' arg)*] ')'
//! arg         := IDENT | NAME '=' literal
//! literal     := 'None' | 'True' | 'False' | NUMBER | STRING
//!              | ['-' | '+'] 'inf' | 'nan'
//!              | '(' [literal (',' literal)* [',']] ')'
//!              | '[' [literal (',' literal)*] ']'
//! ```
//!
//! `IDENT` may contain dots so nested objects (`net.ens`) can be referenced.

use crate::core::config::value::ConfigValue;
use crate::core::error::{Result, VizError};
use crate::core::types::Uid;
use std::fmt;

/// Name of the config object in assignment statements
pub const CONFIG_NAME: &str = "config";

/// Call that recreates a component declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub kind: String,
    pub args: Vec<Uid>,
    pub kwargs: Vec<(String, ConfigValue)>,
}

impl Constructor {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    pub fn kwarg(&self, name: &str) -> Option<&ConfigValue> {
        self.kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl fmt::Display for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", arg)?;
        }
        for (key, value) in &self.kwargs {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", key, value)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `config[<target>].<field> = <value>`
    Assign {
        target: Uid,
        field: String,
        value: ConfigValue,
    },
    /// `<uid> = <constructor>`
    Declare { uid: Uid, constructor: Constructor },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { target, field, value } => {
                write!(f, "{}[{}].{} = {}", CONFIG_NAME, target, field, value)
            }
            Statement::Declare { uid, constructor } => write!(f, "{} = {}", uid, constructor),
        }
    }
}

/// Whether `name` can appear as an `IDENT` in a statement
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// `Ok(())` when `name` is a valid identifier
pub fn check_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(VizError::InvalidIdentifier(name.to_string()))
    }
}

/// Parse one line into a statement
pub fn parse_statement(line: &str) -> Result<Statement> {
    let mut cursor = Cursor::new(line);
    let head = cursor.ident()?;
    let statement = if head == CONFIG_NAME && cursor.peek() == Some('[') {
        cursor.expect('[')?;
        let target = cursor.ident()?;
        cursor.expect(']')?;
        cursor.expect('.')?;
        let field = cursor.name()?;
        cursor.expect('=')?;
        let value = cursor.literal()?;
        Statement::Assign { target, field, value }
    } else {
        cursor.expect('=')?;
        let constructor = cursor.constructor()?;
        Statement::Declare {
            uid: head,
            constructor,
        }
    };
    cursor.end()?;
    Ok(statement)
}

/// Parse a standalone literal
pub fn parse_literal(text: &str) -> Result<ConfigValue> {
    let mut cursor = Cursor::new(text);
    let value = cursor.literal()?;
    cursor.end()?;
    Ok(value)
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> VizError {
        VizError::parse(self.pos + 1, message)
    }

    fn peek(&mut self) -> Option<char> {
        while self.chars.get(self.pos).map_or(false, |c| c.is_whitespace()) {
            self.pos += 1;
        }
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) -> Result<()> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{}', found '{}'", c, found))),
            None => Err(self.error(format!("expected '{}', found end of line", c))),
        }
    }

    fn end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("unexpected trailing '{}'", c))),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.chars.get(self.pos).map_or(false, |c| pred(*c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Dotted identifier
    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                Ok(self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.'))
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    /// Plain name without dots
    fn name(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                Ok(self.take_while(|c| c.is_alphanumeric() || c == '_'))
            }
            _ => Err(self.error("expected name")),
        }
    }

    fn constructor(&mut self) -> Result<Constructor> {
        let mut constructor = Constructor::new(&self.name()?);
        self.expect('(')?;
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(constructor);
        }
        loop {
            let ident = self.ident()?;
            if self.peek() == Some('=') {
                self.pos += 1;
                let value = self.literal()?;
                constructor.kwargs.push((ident, value));
            } else if constructor.kwargs.is_empty() {
                constructor.args.push(ident);
            } else {
                return Err(self.error("positional argument follows keyword argument"));
            }
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(constructor);
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn literal(&mut self) -> Result<ConfigValue> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let (items, trailing_comma) = self.sequence(')')?;
                if items.len() == 1 && !trailing_comma {
                    // parenthesised expression, not a tuple
                    Ok(items.into_iter().next().unwrap_or(ConfigValue::None))
                } else {
                    Ok(ConfigValue::Tuple(items))
                }
            }
            Some('[') => {
                self.pos += 1;
                Ok(ConfigValue::List(self.sequence(']')?.0))
            }
            Some(q) if q == '\'' || q == '"' => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => match self.name()?.as_str() {
                "None" => Ok(ConfigValue::None),
                "True" => Ok(ConfigValue::Bool(true)),
                "False" => Ok(ConfigValue::Bool(false)),
                "inf" => Ok(ConfigValue::Number(f64::INFINITY)),
                "nan" => Ok(ConfigValue::Number(f64::NAN)),
                other => Err(self.error(format!("unknown literal '{}'", other))),
            },
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("expected literal, found end of line")),
        }
    }

    fn sequence(&mut self, close: char) -> Result<(Vec<ConfigValue>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.literal()?);
            trailing_comma = false;
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    trailing_comma = true;
                }
                Some(c) if c == close => {}
                _ => return Err(self.error(format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<ConfigValue> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos).copied() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    let escaped = self
                        .chars
                        .get(self.pos + 1)
                        .copied()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    out.push(if escaped == 'n' { '\n' } else { escaped });
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(ConfigValue::Str(out));
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<ConfigValue> {
        let start = self.pos;
        if let Some(sign @ ('-' | '+')) = self.chars.get(self.pos).copied() {
            self.pos += 1;
            if self.chars.get(self.pos).map_or(false, |c| c.is_alphabetic()) {
                return match self.name()?.as_str() {
                    "inf" if sign == '-' => Ok(ConfigValue::Number(f64::NEG_INFINITY)),
                    "inf" => Ok(ConfigValue::Number(f64::INFINITY)),
                    other => Err(VizError::parse(start + 1, format!("invalid number '{}{}'", sign, other))),
                };
            }
        }
        while let Some(c) = self.chars.get(self.pos).copied() {
            let exponent_sign = (c == '-' || c == '+')
                && matches!(self.chars.get(self.pos.wrapping_sub(1)), Some('e') | Some('E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(ConfigValue::Number)
            .map_err(|_| VizError::parse(start + 1, format!("invalid number '{}'", text)))
    }
}
