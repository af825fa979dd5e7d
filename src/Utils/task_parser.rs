//! Parser for plain-text task documents of the form
//!
//! ```text
//! fac_operator
//!   smoother_choice: multiplicative
//!   coarse_solver_choice: sparse_lu
//!   coarse_solver_tolerance: 1.0e-8
//! logging
//!   loglevel: info
//! ```
//!
//! i.e. a sequence of sections, each a title followed by `key: value1, value2` pairs. Lines
//! starting with `//`, `#`, `%` or `;` are comments. Values are typed on the fly (integer,
//! float, boolean, otherwise string).
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, map_res, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::BTreeMap;
use std::fmt::Display;

pub type SectionMap = BTreeMap<String, Vec<Value>>;
pub type DocumentMap = BTreeMap<String, SectionMap>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// floats, and integers widened to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(f) => f.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

fn identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    let mut parser = map(parser, String::from);
    parser.parse(input)
}

/// Parses a section title, dropping the whitespace after it
pub(crate) fn parse_title(input: &str) -> IResult<&str, String> {
    let (input, result) = identifier(input)?;
    Ok((input.trim(), result))
}

pub(crate) fn parse_key(input: &str) -> IResult<&str, String> {
    identifier(input)
}

pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    let value_parser = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';'));
    let mut value_parser = map_res(value_parser, |s: &str| -> Result<Value, String> {
        let s = s.trim();
        if let Ok(val) = s.parse::<i64>() {
            Ok(Value::Integer(val))
        } else if let Ok(val) = s.parse::<f64>() {
            Ok(Value::Float(val))
        } else if let Ok(val) = s.parse::<bool>() {
            Ok(Value::Boolean(val))
        } else {
            Ok(Value::String(s.to_string()))
        }
    });
    value_parser.parse(input)
}

pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = space0(input)?;
    let separator_coma = delimited(space0, tag(","), space0);
    let mut value_parser = separated_list0(separator_coma, parse_value);
    value_parser.parse(input)
}

/// `key: value1, value2`
pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon_separator = delimited(space0, tag(":"), space0);
    let mut parser = separated_pair(parse_key, colon_separator, parse_value_list);
    let (input, result) = parser.parse(input)?;
    Ok((input.trim(), result))
}

/// A title followed by at least one key-value pair
pub(crate) fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (input, _) = space0(input)?;
    let (input, title) = parse_title(input)?;
    let (input, _) = multispace0(input)?;
    let mut parser = many1(terminated(parse_key_value_pair, space0));
    let (input, pairs) = parser.parse(input)?;
    Ok((input, (title, pairs.into_iter().collect())))
}

pub(crate) fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.starts_with(';')
                && !trimmed.is_empty()
        })
        .map(|line| line.trim())
        .collect::<Vec<&str>>()
        .join("\n")
}

pub fn parse_document(input: &str) -> IResult<&str, DocumentMap> {
    let mut parser = many1(delimited(space0, parse_section, multispace0));
    let (input, sections) = parser.parse(input)?;
    Ok((input, sections.into_iter().collect()))
}

/// Parse a whole document (comments allowed); trailing unparsed text is an error.
pub fn parse_config_document(input: &str) -> Result<DocumentMap, FacError> {
    let filtered = filter_comments(input);
    match parse_document(&filtered) {
        Ok((remaining, parsed)) => {
            if !remaining.trim().is_empty() {
                return Err(FacError::Configuration(format!(
                    "failed to parse entire document, remaining: '{}'",
                    remaining
                )));
            }
            Ok(parsed)
        }
        Err(e) => Err(FacError::Configuration(format!("parsing error: {:?}", e))),
    }
}

/// Typed access to one section of a parsed document.
pub struct ConfigSection<'a> {
    pub title: &'a str,
    map: &'a SectionMap,
}

impl<'a> ConfigSection<'a> {
    pub fn from_document(document: &'a DocumentMap, title: &'a str) -> Result<Self, FacError> {
        let map = document.get(title).ok_or_else(|| {
            FacError::Configuration(format!("section `{}` not found", title))
        })?;
        Ok(Self { title, map })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    /// Fails on keys outside `allowed`.
    pub fn check_keys(&self, allowed: &[&str]) -> Result<(), FacError> {
        for key in self.map.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(FacError::Configuration(format!(
                    "unknown key `{}` in section `{}`",
                    key, self.title
                )));
            }
        }
        Ok(())
    }

    fn single(&self, key: &str) -> Result<Option<&'a Value>, FacError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(values) if values.len() == 1 => Ok(Some(&values[0])),
            Some(values) => Err(FacError::Configuration(format!(
                "key `{}` expects one value, got {}",
                key,
                values.len()
            ))),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, FacError> {
        Ok(self.single(key)?.map(|v| v.to_string_value()))
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, FacError> {
        match self.single(key)? {
            None => Ok(None),
            Some(v) => v.as_float().map(Some).ok_or_else(|| {
                FacError::Configuration(format!("key `{}`: `{}` is not a number", key, v))
            }),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, FacError> {
        match self.single(key)? {
            None => Ok(None),
            Some(v) => match v.as_integer() {
                Some(i) if i >= 0 => Ok(Some(i as usize)),
                _ => Err(FacError::Configuration(format!(
                    "key `{}`: `{}` is not a non-negative integer",
                    key, v
                ))),
            },
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, FacError> {
        match self.single(key)? {
            None => Ok(None),
            Some(v) => v.as_boolean().map(Some).ok_or_else(|| {
                FacError::Configuration(format!("key `{}`: `{}` is not a boolean", key, v))
            }),
        }
    }
}
