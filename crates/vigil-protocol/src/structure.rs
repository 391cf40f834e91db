//! Ordered, named bags of typed fields and their text format.
//!
//! A structure is one logical line of a scenario file:
//! `head, key1=value1, key2=value2;`. Values are typed literals (see
//! [`Value::from_token`]); quoted strings may contain commas and escaped
//! quotes. Field order is preserved so rendering round-trips.

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{Error, Result, Value};

/// An ordered set of named fields with a head name.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    name: String,
    fields: Vec<(String, Value)>,
}

impl Structure {
    /// Create an empty structure with the given head name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// The head name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the head name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the structure has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// True when a field is present.
    pub fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Set a field, replacing an existing one of the same name in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
    }

    /// Remove a field if present.
    pub fn remove(&mut self, field: &str) {
        self.fields.retain(|(k, _)| k != field);
    }

    /// Iterate over fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutably iterate over fields in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.fields.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Convenience typed getters mirroring the [`Value`] views.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Signed integer view of a field.
    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    /// Unsigned integer view of a field.
    pub fn get_uint(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_uint)
    }

    /// Floating point view of a field.
    pub fn get_double(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_double)
    }

    /// String view of a field (quoted or bare).
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Parse one logical structure line.
    ///
    /// The input must already have comments stripped and continuation
    /// lines joined; a trailing `;` is accepted.
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse()
    }

    /// Render the structure as a JSON object (head name excluded).
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.fields {
            map.insert(
                k.clone(),
                serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (k, v) in &self.fields {
            write!(f, ", {}={}", k, v)?;
        }
        write!(f, ";")
    }
}

impl std::str::FromStr for Structure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Structure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Single-line structure parser.
struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn malformed(&self, what: &str) -> Error {
        Error::Malformed(format!("{} in `{}`", what, self.input.trim()))
    }

    fn skip_spaces(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            let _ = self.chars.next();
        }
    }

    fn read_name(&mut self) -> String {
        let mut out = String::new();
        while matches!(self.chars.peek(), Some((_, c)) if is_name_char(*c)) {
            let (_, c) = self.chars.next().expect("peeked");
            out.push(c);
        }
        out
    }

    fn read_quoted(&mut self) -> Result<String> {
        // Opening quote already consumed.
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => out.push(c),
                    None => return Err(self.malformed("dangling escape")),
                },
                Some((_, '"')) => return Ok(out),
                Some((_, c)) => out.push(c),
                None => return Err(self.malformed("unterminated string")),
            }
        }
    }

    fn read_bare(&mut self) -> String {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if matches!(c, ',' | ';') {
                break;
            }
            out.push(*c);
            let _ = self.chars.next();
        }
        out.trim().to_string()
    }

    fn parse(mut self) -> Result<Structure> {
        self.skip_spaces();
        let name = self.read_name();
        if name.is_empty() {
            return Err(self.malformed("missing head name"));
        }
        let mut structure = Structure::new(name);

        loop {
            self.skip_spaces();
            match self.chars.next() {
                None => break,
                Some((_, ';')) => {
                    self.skip_spaces();
                    if self.chars.next().is_some() {
                        return Err(self.malformed("trailing content after `;`"));
                    }
                    break;
                }
                Some((_, ',')) => {}
                Some(_) => return Err(self.malformed("expected `,` between fields")),
            }

            self.skip_spaces();
            // A trailing comma before end-of-line is tolerated.
            if self.chars.peek().is_none() {
                break;
            }
            let key = self.read_name();
            if key.is_empty() {
                return Err(self.malformed("missing field name"));
            }
            self.skip_spaces();
            match self.chars.next() {
                Some((_, '=')) => {}
                _ => return Err(self.malformed("missing `=`")),
            }
            self.skip_spaces();

            let value = match self.chars.peek() {
                Some((_, '"')) => {
                    let _ = self.chars.next();
                    Value::Str(self.read_quoted()?)
                }
                _ => {
                    let token = self.read_bare();
                    if token.is_empty() {
                        return Err(self.malformed("missing value"));
                    }
                    Value::from_token(&token)
                }
            };
            structure.fields.push((key, value));
        }

        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_fields() {
        let s = Structure::parse(
            "seek, playback-time=1.0, start=5, flags=flush+accurate, name=\"first, seek\";",
        )
        .unwrap();
        assert_eq!(s.name(), "seek");
        assert_eq!(s.get_double("playback-time"), Some(1.0));
        assert_eq!(s.get_int("start"), Some(5));
        assert_eq!(s.get_str("flags"), Some("flush+accurate"));
        assert_eq!(s.get_str("name"), Some("first, seek"));
    }

    #[test]
    fn head_only() {
        let s = Structure::parse("eos;").unwrap();
        assert_eq!(s.name(), "eos");
        assert!(s.is_empty());
    }

    #[test]
    fn escaped_quotes() {
        let s = Structure::parse(r#"wait, message="say \"hi\"""#).unwrap();
        assert_eq!(s.get_str("message"), Some("say \"hi\""));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Structure::parse("").is_err());
        assert!(Structure::parse("seek start=0").is_err());
        assert!(Structure::parse("seek, start").is_err());
        assert!(Structure::parse("seek, =3").is_err());
        assert!(Structure::parse("seek, s=\"unterminated").is_err());
    }

    #[test]
    fn set_replaces_in_place() {
        let mut s = Structure::parse("pause, duration=1.0, state=paused;").unwrap();
        s.set("duration", 2.0);
        let order: Vec<&str> = s.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["duration", "state"]);
        assert_eq!(s.get_double("duration"), Some(2.0));
    }

    #[test]
    fn display_round_trips() {
        let text = "seek, start=5, flags=flush+accurate, label=\"a b\";";
        let s = Structure::parse(text).unwrap();
        let again = Structure::parse(&s.to_string()).unwrap();
        assert_eq!(s, again);
    }
}
