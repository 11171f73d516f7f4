//! Candidate decoding.
//!
//! A candidate is either raw model output text or a value the caller has
//! already decoded. Text is decoded strictly; there is no partial recovery.

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;

/// The candidate could not be decoded as JSON.
#[derive(Error, Debug)]
#[error("Candidate is not valid JSON: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// The raw value under evaluation.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    /// Serialized output, decoded before any rule runs
    Text(&'a str),

    /// Already-decoded structured output
    Value(&'a Value),
}

impl<'a> Candidate<'a> {
    /// Decode into a structured value, borrowing when already decoded.
    ///
    /// Text that decodes to a non-object (array, number, `null`) is still a
    /// decoded candidate; every field lookup on it resolves as absent.
    pub fn decode(self) -> Result<Cow<'a, Value>, DecodeError> {
        match self {
            Candidate::Text(text) => Ok(Cow::Owned(serde_json::from_str(text)?)),
            Candidate::Value(value) => Ok(Cow::Borrowed(value)),
        }
    }
}

impl<'a> From<&'a str> for Candidate<'a> {
    fn from(text: &'a str) -> Self {
        Candidate::Text(text)
    }
}

impl<'a> From<&'a String> for Candidate<'a> {
    fn from(text: &'a String) -> Self {
        Candidate::Text(text.as_str())
    }
}

impl<'a> From<&'a Value> for Candidate<'a> {
    fn from(value: &'a Value) -> Self {
        Candidate::Value(value)
    }
}
