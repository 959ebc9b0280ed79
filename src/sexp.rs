//! A small s-expression reader.
//!
//! Event-type catalogs and pattern files are written as s-expressions:
//!
//! ```text
//! (event-type (name "Attack") (code "190") (event-group VIOLENCE) (role SOURCE) (role TARGET))
//! ```
//!
//! Atoms are bare words or double-quoted strings (quotes are dropped; `\"` and
//! `\\` escape inside strings). `;` starts a comment that runs to end of line.

use crate::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(s) => Some(s),
            Sexp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            Sexp::Atom(_) => None,
        }
    }

    /// The leading atom of a list form, e.g. `participant` in `(participant SOURCE ..)`.
    pub fn head(&self) -> Option<&str> {
        self.as_list().and_then(|items| items.first()).and_then(Sexp::as_atom)
    }

    /// Everything after the head of a list form (empty for atoms).
    pub fn tail(&self) -> &[Sexp] {
        match self {
            Sexp::List(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// Atoms of the tail, failing if any element is itself a list.
    pub fn tail_atoms(&self) -> Result<Vec<&str>> {
        self.tail()
            .iter()
            .map(|s| s.as_atom().ok_or_else(|| Error::pattern(format!("expected only atoms in {self}"))))
            .collect()
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Atom(s) if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Sexp::Atom(s) => f.write_str(s),
            Sexp::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parse every top-level form in `text`.
pub fn parse_all(text: &str) -> Result<Vec<Sexp>> {
    let mut reader = Reader { chars: text.chars().peekable(), line: 1 };
    let mut forms = Vec::new();
    while let Some(form) = reader.next_form()? {
        forms.push(form);
    }
    Ok(forms)
}

/// Parse exactly one form.
pub fn parse_one(text: &str) -> Result<Sexp> {
    let mut forms = parse_all(text)?;
    match forms.len() {
        1 => Ok(forms.remove(0)),
        n => Err(Error::syntax(1, format!("expected a single form, found {n}"))),
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl Reader<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_blank(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn next_form(&mut self) -> Result<Option<Sexp>> {
        self.skip_blank();
        match self.chars.peek() {
            None => Ok(None),
            Some(')') => Err(Error::syntax(self.line, "unbalanced ')'")),
            Some(_) => self.form().map(Some),
        }
    }

    fn form(&mut self) -> Result<Sexp> {
        self.skip_blank();
        match self.chars.peek().copied() {
            None => Err(Error::syntax(self.line, "unexpected end of input")),
            Some('(') => {
                let open_line = self.line;
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_blank();
                    match self.chars.peek() {
                        None => return Err(Error::syntax(open_line, "unclosed '('")),
                        Some(')') => {
                            self.bump();
                            return Ok(Sexp::List(items));
                        }
                        Some(_) => items.push(self.form()?),
                    }
                }
            }
            Some('"') => {
                let open_line = self.line;
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => return Err(Error::syntax(open_line, "unterminated string")),
                        Some('"') => return Ok(Sexp::Atom(s)),
                        Some('\\') => match self.bump() {
                            Some(c) => s.push(c),
                            None => return Err(Error::syntax(open_line, "unterminated string")),
                        },
                        Some(c) => s.push(c),
                    }
                }
            }
            Some(_) => {
                let mut s = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                        break;
                    }
                    s.push(c);
                    self.bump();
                }
                Ok(Sexp::Atom(s))
            }
        }
    }
}
