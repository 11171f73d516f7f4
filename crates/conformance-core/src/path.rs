//! Field paths locating values inside a candidate record.
//!
//! Paths use the dotted/bracketed form that shows up in violation messages,
//! e.g. `quotes[2].startIndex`. The empty path designates the record itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from parsing a field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty segment in field path '{0}'")]
    EmptySegment(String),

    #[error("Malformed index in field path '{0}'")]
    MalformedIndex(String),

    #[error("Unclosed bracket in field path '{0}'")]
    UnclosedBracket(String),
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member lookup
    Key(String),

    /// Array element lookup
    Index(usize),
}

/// Location of a field or indexed element within a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The path of the record itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// A single top-level member.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Key(name.into())],
        }
    }

    /// Parse a path such as `quotes[2].startIndex`.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();

        for (position, part) in text.split('.').enumerate() {
            let (key, mut rest) = match part.find('[') {
                Some(bracket) => (&part[..bracket], &part[bracket..]),
                None => (part, ""),
            };

            if key.is_empty() {
                // Only a leading index (`[0].name`) may omit the key.
                if position > 0 || rest.is_empty() {
                    return Err(PathError::EmptySegment(text.to_string()));
                }
            } else {
                segments.push(Segment::Key(key.to_string()));
            }

            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .ok_or_else(|| PathError::MalformedIndex(text.to_string()))?;
                let close = inner
                    .find(']')
                    .ok_or_else(|| PathError::UnclosedBracket(text.to_string()))?;
                let index = inner[..close]
                    .parse::<usize>()
                    .map_err(|_| PathError::MalformedIndex(text.to_string()))?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Append a relative path to this one.
    pub fn join(&self, relative: &FieldPath) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Self { segments }
    }

    /// Path of the `index`-th element of the array at this path.
    pub fn index(&self, index: usize) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Look the path up in a decoded value.
    ///
    /// Lookups through a non-object or non-array value resolve as absent.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(index) => current.as_array()?.get(*index),
            })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if position == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
