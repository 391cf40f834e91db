//! Expression evaluation for timed scenario parameters.
//!
//! Scenario fields like `start="min(5, duration/8)"` carry small
//! arithmetic/boolean expressions over scenario variables. This crate
//! provides:
//! - [`eval`]: a recursive-descent evaluator over the expression grammar
//! - [`substitute`]: `$(name)` template substitution inside parameter
//!   strings
//!
//! Boolean outcomes are `1.0` / `0.0`; equality uses a `1e-10` tolerance.
//! The only built-ins are `min(a, b)` and `max(a, b)`. Unknown variables
//! are hard errors in both entry points.
#![warn(missing_docs)]

use std::{result::Result as StdResult, sync::OnceLock};

use regex::Regex;
use thiserror::Error;

/// Convenient result type for the expression crate.
pub type Result<T> = StdResult<T, Error>;

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The expression text is malformed.
    #[error("parse error at offset {pos}: {message}")]
    Parse {
        /// Byte offset into the (space-stripped) expression.
        pos: usize,
        /// What went wrong.
        message: String,
    },

    /// An identifier did not resolve through the variable lookup.
    #[error("could not look up value for variable `{0}`")]
    UnknownVariable(String),

    /// A `$(name)` template referenced an undefined variable.
    #[error("trying to use undefined variable `{0}`")]
    UndefinedTemplateVariable(String),
}

/// Tolerance under which two doubles compare equal.
const EQUALITY_THRESHOLD: f64 = 1e-10;

/// Variable resolver used by [`eval`].
pub type VariableLookup<'a> = &'a dyn Fn(&str) -> Option<f64>;

/// Evaluate `expr`, resolving identifiers through `vars`.
///
/// Spaces are insignificant and stripped before parsing. The full input
/// must be consumed; trailing garbage is a parse error.
pub fn eval(expr: &str, vars: VariableLookup<'_>) -> Result<f64> {
    let stripped: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser {
        input: stripped.as_bytes(),
        pos: 0,
        vars,
    };
    let val = parser.read_or()?;
    if parser.pos != parser.input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(val)
}

fn template_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\((\w+)\)").expect("static regex"))
}

/// Replace every `$(name)` occurrence in `input` via `vars`.
///
/// Inputs without any template token are returned unchanged. An
/// undefined variable is a hard error; silent fallback would let typos
/// masquerade as literal text.
pub fn substitute(input: &str, vars: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let re = template_regex();
    if !re.is_match(input) {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("match");
        let name = &caps[1];
        let value = vars(name).ok_or_else(|| Error::UndefinedTemplateVariable(name.to_string()))?;
        out.push_str(&input[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

/// Recursive-descent parser state over a space-stripped expression.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    vars: VariableLookup<'a>,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::Parse {
            pos: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.input.get(self.pos + 1).copied()
    }

    fn next(&mut self) -> Result<u8> {
        let c = self
            .peek()
            .ok_or_else(|| self.error("tried to read past end of expression"))?;
        self.pos += 1;
        Ok(c)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn read_number(&mut self) -> Result<f64> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let token = std::str::from_utf8(&self.input[start..self.pos]).expect("ascii");
        token
            .parse::<f64>()
            .map_err(|_| self.error("expected a number"))
    }

    fn read_argument(&mut self) -> Result<f64> {
        let val = self.read_expr()?;
        let _ = self.eat(b',');
        Ok(val)
    }

    fn read_builtin(&mut self) -> Result<f64> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.error("tried to read past end of expression")),
        };
        if !(c.is_ascii_alphabetic() || c == b'_' || c == b'$') {
            return self.read_number();
        }

        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
        ) {
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.input[start..self.pos])
            .expect("ascii")
            .to_string();

        if self.eat(b'(') {
            let val = match token.as_str() {
                "min" => {
                    let a = self.read_argument()?;
                    let b = self.read_argument()?;
                    a.min(b)
                }
                "max" => {
                    let a = self.read_argument()?;
                    let b = self.read_argument()?;
                    a.max(b)
                }
                _ => return Err(self.error("tried to call unknown built-in function")),
            };
            if self.next()? != b')' {
                return Err(self.error("expected `)` in built-in call"));
            }
            return Ok(val);
        }

        (self.vars)(&token).ok_or(Error::UnknownVariable(token))
    }

    fn read_parenthesis(&mut self) -> Result<f64> {
        if self.eat(b'(') {
            let val = self.read_or()?;
            if !self.eat(b')') {
                return Err(self.error("expected `)`"));
            }
            return Ok(val);
        }
        self.read_builtin()
    }

    fn read_unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'!') => Err(self.error("expected `+` or `-` for unary expression, got `!`")),
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.read_parenthesis()?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.read_parenthesis()
            }
            _ => self.read_parenthesis(),
        }
    }

    fn read_power(&mut self) -> Result<f64> {
        let mut v0 = self.read_unary()?;
        while self.eat(b'^') {
            let sign = if self.eat(b'-') { -1.0 } else { 1.0 };
            let v1 = sign * self.read_power()?;
            v0 = v0.powf(v1);
        }
        Ok(v0)
    }

    fn read_term(&mut self) -> Result<f64> {
        let mut v0 = self.read_power()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    v0 *= self.read_power()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    v0 /= self.read_power()?;
                }
                _ => return Ok(v0),
            }
        }
    }

    fn read_expr(&mut self) -> Result<f64> {
        let mut v0 = match self.peek() {
            Some(b'+') => {
                self.pos += 1;
                self.read_term()?
            }
            Some(b'-') => {
                self.pos += 1;
                -self.read_term()?
            }
            _ => self.read_term()?,
        };
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    v0 += self.read_term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    v0 -= self.read_term()?;
                }
                _ => return Ok(v0),
            }
        }
    }

    fn read_comparison(&mut self) -> Result<f64> {
        let v0 = self.read_expr()?;
        let (op, wide) = match (self.peek(), self.peek2()) {
            (Some(b'<'), Some(b'=')) => (b'l', true),
            (Some(b'<'), _) => (b'<', false),
            (Some(b'>'), Some(b'=')) => (b'g', true),
            (Some(b'>'), _) => (b'>', false),
            _ => return Ok(v0),
        };
        self.pos += if wide { 2 } else { 1 };
        let v1 = self.read_expr()?;
        let res = match op {
            b'<' => v0 < v1,
            b'l' => v0 <= v1,
            b'>' => v0 > v1,
            _ => v0 >= v1,
        };
        Ok(if res { 1.0 } else { 0.0 })
    }

    fn read_equality(&mut self) -> Result<f64> {
        let v0 = self.read_comparison()?;
        let negate = match (self.peek(), self.peek2()) {
            (Some(b'='), Some(b'=')) => false,
            (Some(b'!'), Some(b'=')) => true,
            _ => return Ok(v0),
        };
        self.pos += 2;
        let v1 = self.read_comparison()?;
        let eq = (v0 - v1).abs() <= EQUALITY_THRESHOLD;
        Ok(if eq != negate { 1.0 } else { 0.0 })
    }

    fn read_and(&mut self) -> Result<f64> {
        let mut v0 = self.read_equality()?;
        while (self.peek(), self.peek2()) == (Some(b'&'), Some(b'&')) {
            self.pos += 2;
            let v1 = self.read_equality()?;
            v0 = if v0 != 0.0 && v1 != 0.0 { 1.0 } else { 0.0 };
        }
        Ok(v0)
    }

    fn read_or(&mut self) -> Result<f64> {
        let mut v0 = self.read_and()?;
        while (self.peek(), self.peek2()) == (Some(b'|'), Some(b'|')) {
            self.pos += 2;
            let v1 = self.read_and()?;
            v0 = if v0 != 0.0 || v1 != 0.0 { 1.0 } else { 0.0 };
        }
        Ok(v0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<f64> {
        match name {
            "duration" => Some(8.0),
            "position" => Some(1.0),
            _ => None,
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("1 + 2 * 3", &vars).unwrap(), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &vars).unwrap(), 9.0);
        assert_eq!(eval("2 ^ 3 ^ 2", &vars).unwrap(), 512.0);
        assert_eq!(eval("2 ^ -1", &vars).unwrap(), 0.5);
        assert_eq!(eval("-duration / 2", &vars).unwrap(), -4.0);
        assert_eq!(eval("10 / 4", &vars).unwrap(), 2.5);
    }

    #[test]
    fn builtins_and_variables() {
        assert_eq!(eval("min(5.0, duration/8)", &vars).unwrap(), 1.0);
        assert_eq!(eval("max(5.0, duration)", &vars).unwrap(), 8.0);
        assert_eq!(eval("min(max(1, 2), 10)", &vars).unwrap(), 2.0);
    }

    #[test]
    fn booleans() {
        assert_eq!(eval("duration/8 > position", &vars).unwrap(), 0.0);
        assert_eq!(eval("(duration>5) && (position<2)", &vars).unwrap(), 1.0);
        assert_eq!(eval("1 == 1.00000000000001", &vars).unwrap(), 1.0);
        assert_eq!(eval("1 != 2", &vars).unwrap(), 1.0);
        assert_eq!(eval("0 || 1", &vars).unwrap(), 1.0);
        assert_eq!(eval("position >= 1", &vars).unwrap(), 1.0);
        assert_eq!(eval("position <= 0.5", &vars).unwrap(), 0.0);
    }

    #[test]
    fn errors() {
        assert!(matches!(
            eval("nosuchvar + 1", &vars),
            Err(Error::UnknownVariable(v)) if v == "nosuchvar"
        ));
        assert!(eval("1 +", &vars).is_err());
        assert!(eval("(1", &vars).is_err());
        assert!(eval("avg(1, 2)", &vars).is_err());
        assert!(eval("!1", &vars).is_err());
        assert!(eval("(1 + 2))", &vars).is_err());
    }

    #[test]
    fn template_substitution() {
        let lookup = |name: &str| match name {
            "position" => Some("1.5".to_string()),
            "file" => Some("/tmp/a.mp4".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute("start=$(position), uri=$(file)", &lookup).unwrap(),
            "start=1.5, uri=/tmp/a.mp4"
        );
        // No tokens: unchanged.
        assert_eq!(substitute("plain text", &lookup).unwrap(), "plain text");
        assert!(matches!(
            substitute("$(missing)", &lookup),
            Err(Error::UndefinedTemplateVariable(v)) if v == "missing"
        ));
    }
}
