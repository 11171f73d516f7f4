//! Field validators.
//!
//! Each validator is a pure predicate over the value found at one path. A
//! failing predicate appends one or more [`Violation`]s; a wrong-typed or
//! absent value is always reported as a violation, never as an error.
//!
//! | Validator | Fails when |
//! |-----------|------------|
//! | `NonEmptyString` | absent, not a string, or blank |
//! | `StringMinLength` | absent, not a string, empty, or trimmed length below `min` |
//! | `Prose` | as above, plus fewer than `min_sentences` substantial sentences |
//! | `Integer` | not an integer-valued number |
//! | `EnumMember` | not exactly one of `values` |
//! | `OrderedPair` | both ends are integers and `low > high` |
//! | `Array` | not an array |
//! | `StringItems` | not an array, or any item is not a non-empty string |
//! | `ArrayOf` | not an array; otherwise per-element rule violations |

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;
use crate::report::Violation;
use crate::rules::{self, FieldRule};

lazy_static! {
    /// Sentence terminators used by the period-count heuristic.
    static ref SENTENCE_BREAK: Regex = Regex::new(r"[.!?]+").unwrap();
}

fn default_min_sentence_chars() -> usize {
    10
}

/// An atomic check applied to the value at a rule's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validator {
    NonEmptyString,

    StringMinLength {
        min: usize,
    },

    /// Paragraph-style text checked with the sentence heuristic.
    Prose {
        min_chars: usize,
        min_sentences: usize,
        /// Fragments must be longer than this (trimmed) to count
        #[serde(default = "default_min_sentence_chars")]
        min_sentence_chars: usize,
    },

    Integer,

    EnumMember {
        values: Vec<String>,
    },

    /// Applied to a record: `low` must not exceed `high`.
    OrderedPair {
        low: FieldPath,
        high: FieldPath,
    },

    Array,

    StringItems,

    /// Nested rules applied to every element, paths relative to the element.
    ArrayOf {
        element: Vec<FieldRule>,
    },
}

impl Validator {
    /// Shorthand for an enum over string literals.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::EnumMember {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for an ordered pair of sibling members.
    pub fn ordered(low: impl Into<String>, high: impl Into<String>) -> Self {
        Validator::OrderedPair {
            low: FieldPath::key(low),
            high: FieldPath::key(high),
        }
    }

    /// Check `value` (resolved at `path`) and record any violations.
    pub fn check(&self, value: Option<&Value>, path: &FieldPath, out: &mut Vec<Violation>) {
        match self {
            Validator::NonEmptyString => {
                if !is_non_empty_string(value) {
                    out.push(Violation::new(
                        path.clone(),
                        format!("{} is empty or missing", path),
                    ));
                }
            }

            Validator::StringMinLength { min } => {
                let Some(text) = present_text(value) else {
                    out.push(missing_text(path));
                    return;
                };
                if trimmed_len(text) < *min {
                    out.push(too_short(path, *min));
                }
            }

            Validator::Prose {
                min_chars,
                min_sentences,
                min_sentence_chars,
            } => {
                let Some(text) = present_text(value) else {
                    out.push(missing_text(path));
                    return;
                };
                let sentences = count_sentences(text, *min_sentence_chars);
                if sentences < *min_sentences {
                    out.push(Violation::new(
                        path.clone(),
                        format!(
                            "{} has {} sentences (expected at least {})",
                            path, sentences, min_sentences
                        ),
                    ));
                }
                if trimmed_len(text) < *min_chars {
                    out.push(too_short(path, *min_chars));
                }
            }

            Validator::Integer => {
                if value.and_then(integer_value).is_none() {
                    out.push(Violation::new(
                        path.clone(),
                        format!("{} is not an integer", path),
                    ));
                }
            }

            Validator::EnumMember { values } => {
                let accepted = value
                    .and_then(Value::as_str)
                    .is_some_and(|s| values.iter().any(|v| v == s));
                if !accepted {
                    let expected = values.join(", ");
                    let message = match value {
                        Some(found) => format!(
                            "{} {} is not a valid value (expected one of: {})",
                            path, found, expected
                        ),
                        None => format!("{} is missing (expected one of: {})", path, expected),
                    };
                    out.push(Violation::new(path.clone(), message));
                }
            }

            Validator::OrderedPair { low, high } => {
                let Some(record) = value else {
                    return;
                };
                let low_value = low.resolve(record).and_then(integer_value);
                let high_value = high.resolve(record).and_then(integer_value);
                if let (Some(lo), Some(hi)) = (low_value, high_value) {
                    if lo > hi {
                        out.push(Violation::new(
                            path.join(low),
                            format!("{} ({}) > {} ({})", path.join(low), lo, high, hi),
                        ));
                    }
                }
            }

            Validator::Array => {
                if value.and_then(Value::as_array).is_none() {
                    out.push(not_an_array(path));
                }
            }

            Validator::StringItems => {
                let Some(items) = value.and_then(Value::as_array) else {
                    out.push(not_an_array(path));
                    return;
                };
                let invalid = items
                    .iter()
                    .filter(|item| !is_non_empty_string(Some(*item)))
                    .count();
                if invalid > 0 {
                    out.push(Violation::new(
                        path.clone(),
                        format!("{} has {} empty/non-string items", path, invalid),
                    ));
                }
            }

            Validator::ArrayOf { element } => {
                let Some(items) = value.and_then(Value::as_array) else {
                    out.push(not_an_array(path));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    rules::apply(element, item, &path.index(index), out);
                }
            }
        }
    }
}

/// How a bounded collection counts its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCount {
    /// Raw array length
    #[default]
    All,

    /// Only non-empty strings count toward the size
    NonEmptyStrings,
}

/// Inclusive size bounds for an array field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,

    #[serde(default)]
    pub count: ItemCount,
}

impl CardinalityBounds {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            count: ItemCount::All,
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self {
            min: Some(min),
            ..Self::default()
        }
    }

    pub fn at_most(max: usize) -> Self {
        Self {
            max: Some(max),
            ..Self::default()
        }
    }

    /// Count only valid (non-empty string) items.
    pub fn valid_strings(mut self) -> Self {
        self.count = ItemCount::NonEmptyStrings;
        self
    }

    /// True when `min > max`.
    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    /// Check the size of `items` and record violations.
    pub fn check(&self, items: &[Value], path: &FieldPath, out: &mut Vec<Violation>) {
        let (count, noun) = match self.count {
            ItemCount::All => (items.len(), "items"),
            ItemCount::NonEmptyStrings => (
                items
                    .iter()
                    .filter(|item| is_non_empty_string(Some(*item)))
                    .count(),
                "non-empty items",
            ),
        };

        if let Some(min) = self.min {
            if count < min {
                let message = if self.count == ItemCount::All && count == 0 {
                    format!("{} array is empty", path)
                } else {
                    format!("{} has {} {} (expected at least {})", path, count, noun, min)
                };
                out.push(Violation::new(path.clone(), message));
            }
        }

        if let Some(max) = self.max {
            if count > max {
                out.push(Violation::new(
                    path.clone(),
                    format!("{} has {} {} (expected at most {})", path, count, noun, max),
                ));
            }
        }
    }
}

/// Count substantial sentences with the period-count heuristic.
///
/// Splits on runs of `.`, `!` and `?` and keeps fragments whose trimmed
/// length exceeds `min_chars`.
pub fn count_sentences(text: &str, min_chars: usize) -> usize {
    SENTENCE_BREAK
        .split(text)
        .filter(|fragment| trimmed_len(fragment) > min_chars)
        .count()
}

/// An integer-valued JSON number.
///
/// Numbers serde_json stores as `i64`/`u64` stay exact; integer-valued
/// floats (`5.0`, `1e40`) keep their `f64` so large magnitudes still order
/// correctly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegerValue {
    Exact(i128),
    Float(f64),
}

impl IntegerValue {
    fn as_f64(self) -> f64 {
        match self {
            IntegerValue::Exact(n) => n as f64,
            IntegerValue::Float(f) => f,
        }
    }
}

impl PartialOrd for IntegerValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (IntegerValue::Exact(a), IntegerValue::Exact(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegerValue::Exact(n) => write!(f, "{}", n),
            IntegerValue::Float(x) if x.abs() < 1e21 => write!(f, "{}", *x as i128),
            IntegerValue::Float(x) => write!(f, "{:e}", x),
        }
    }
}

/// Integer-valued JSON number (`5` and `5.0` qualify, `5.5` does not).
pub fn integer_value(value: &Value) -> Option<IntegerValue> {
    let number = value.as_number()?;
    if let Some(n) = number.as_i64() {
        return Some(IntegerValue::Exact(i128::from(n)));
    }
    if let Some(n) = number.as_u64() {
        return Some(IntegerValue::Exact(i128::from(n)));
    }
    number
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(IntegerValue::Float)
}

/// Whitespace as the ECMAScript `trim` defines it: Zs separators, the
/// line terminators, tab, VT, FF and the byte order mark.
fn is_trim_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{B}' | '\u{C}' | '\r' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

pub(crate) fn trim_text(text: &str) -> &str {
    text.trim_matches(is_trim_whitespace)
}

pub(crate) fn is_non_empty_string(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !trim_text(s).is_empty())
}

/// A string with at least one character; empty strings count as missing.
fn present_text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Trimmed length in UTF-16 code units.
fn trimmed_len(text: &str) -> usize {
    trim_text(text).encode_utf16().count()
}

fn missing_text(path: &FieldPath) -> Violation {
    Violation::new(path.clone(), format!("{} is missing or not a string", path))
}

fn too_short(path: &FieldPath, min: usize) -> Violation {
    Violation::new(
        path.clone(),
        format!("{} is too short (less than {} chars)", path, min),
    )
}

fn not_an_array(path: &FieldPath) -> Violation {
    Violation::new(path.clone(), format!("{} is not an array", path))
}
