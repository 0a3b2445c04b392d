//! Parser for semantic-pointer expressions.
//!
//! Grammar:
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary ('*' unary)*
//! unary  := '-' unary | '~' unary | atom
//! atom   := NUMBER | KEY | '(' expr ')'
//! ```

use crate::core::error::{Result, VizError};

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Number(f64),
    Key(String),
    Neg(Box<Term>),
    Invert(Box<Term>),
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),
}

pub fn parse(text: &str) -> Result<Term> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let term = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error(format!("unexpected '{}'", parser.chars[parser.pos])));
    }
    Ok(term)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error(&self, message: String) -> VizError {
        VizError::Vocabulary(format!("{} at column {}", message, self.pos + 1))
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).map_or(false, |c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<Term> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    left = Term::Add(Box::new(left), Box::new(self.term()?));
                }
                Some('-') => {
                    self.pos += 1;
                    left = Term::Sub(Box::new(left), Box::new(self.term()?));
                }
                _ => return Ok(left),
            }
        }
    }

    fn term(&mut self) -> Result<Term> {
        let mut left = self.unary()?;
        while self.peek() == Some('*') {
            self.pos += 1;
            left = Term::Mul(Box::new(left), Box::new(self.unary()?));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Term> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(Term::Neg(Box::new(self.unary()?)))
            }
            Some('~') => {
                self.pos += 1;
                Ok(Term::Invert(Box::new(self.unary()?)))
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Term> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(self.error("expected ')'".to_string()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let start = self.pos;
                while self
                    .chars
                    .get(self.pos)
                    .map_or(false, |c| c.is_alphanumeric() || *c == '_')
                {
                    self.pos += 1;
                }
                Ok(Term::Key(self.chars[start..self.pos].iter().collect()))
            }
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }

    fn number(&mut self) -> Result<Term> {
        let start = self.pos;
        while self.chars.get(self.pos).map_or(false, |c| {
            c.is_ascii_digit() || *c == '.' || *c == 'e' || *c == 'E'
        }) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Term::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }
}
