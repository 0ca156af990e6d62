//! Field validation gates for the operation gateway.
//!
//! Every parameter crossing the trust boundary goes through exactly one of
//! these validators before any handler runs. Validators are pure: no I/O,
//! no clock, same input same verdict. Each returns the normalized typed
//! value or a [`FieldError`] naming the offending field.

use crate::core::time;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use std::path::{Component, Path};

/// Default ceiling for free-text fields, in characters after trimming.
pub const MAX_TEXT_LEN: usize = 2000;

/// One rejected field. The gateway collects every `FieldError` for a
/// request before answering, so a caller sees all problems at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: ReasonKind,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, kind: ReasonKind, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "field": self.field,
            "reason": self.kind.as_str(),
            "message": self.message,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    Missing,
    InvalidId,
    InvalidDate,
    PathTraversal,
    TooLong,
    ControlCharacter,
    NotANumber,
    NotAFlag,
    NotOneOf,
}

impl ReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::InvalidId => "invalid-id",
            Self::InvalidDate => "invalid-date",
            Self::PathTraversal => "path-traversal",
            Self::TooLong => "too-long",
            Self::ControlCharacter => "control-character",
            Self::NotANumber => "not-a-number",
            Self::NotAFlag => "not-a-flag",
            Self::NotOneOf => "not-one-of",
        }
    }
}

impl std::fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Positive integer identifier: accepts JSON integers and numeric strings
/// (surrounding whitespace tolerated). Zero, negatives, fractions, and
/// non-numeric input are rejected.
pub fn validate_identifier(field: &str, raw: &JsonValue) -> Result<i64, FieldError> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(id) if id > 0 => Ok(id),
        _ => Err(FieldError::new(
            field,
            ReasonKind::InvalidId,
            format!("expected a positive integer id, got {}", raw),
        )),
    }
}

/// Calendar date: `YYYY-MM-DD` exactly (no time component), year within
/// 1900..=2100.
pub fn validate_date(field: &str, raw: &JsonValue) -> Result<NaiveDate, FieldError> {
    raw.as_str()
        .and_then(time::parse_date)
        .ok_or_else(|| {
            FieldError::new(
                field,
                ReasonKind::InvalidDate,
                format!("expected YYYY-MM-DD within 1900..=2100, got {}", raw),
            )
        })
}

/// Relative file path for attachment references. Fails closed: absolute
/// paths, `..` segments, backslashes, and control characters are rejected
/// outright rather than sanitized.
pub fn validate_rel_path(field: &str, raw: &JsonValue) -> Result<String, FieldError> {
    let s = raw.as_str().ok_or_else(|| {
        FieldError::new(field, ReasonKind::PathTraversal, "expected a path string")
    })?;
    let reject = |why: &str| Err(FieldError::new(field, ReasonKind::PathTraversal, why));
    if s.is_empty() {
        return reject("empty path");
    }
    if s.chars().any(|c| c.is_control()) {
        return reject("control character in path");
    }
    if s.contains('\\') {
        return reject("backslash separators are not accepted");
    }
    for component in Path::new(s).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return reject("parent-directory segment"),
            Component::RootDir | Component::Prefix(_) => return reject("absolute path"),
        }
    }
    Ok(s.to_string())
}

/// Bounded free text: trimmed, control characters other than newline and
/// tab rejected, length capped at `max_len` characters.
pub fn validate_text(field: &str, raw: &JsonValue, max_len: usize) -> Result<String, FieldError> {
    let s = raw.as_str().ok_or_else(|| {
        FieldError::new(field, ReasonKind::ControlCharacter, "expected a string")
    })?;
    let trimmed = s.trim();
    if trimmed
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\t')
    {
        return Err(FieldError::new(
            field,
            ReasonKind::ControlCharacter,
            "control character in text",
        ));
    }
    if trimmed.chars().count() > max_len {
        return Err(FieldError::new(
            field,
            ReasonKind::TooLong,
            format!("text exceeds {} characters", max_len),
        ));
    }
    Ok(trimmed.to_string())
}

/// Finite number: JSON numbers and numeric strings both accepted.
pub fn validate_number(field: &str, raw: &JsonValue) -> Result<f64, FieldError> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(FieldError::new(
            field,
            ReasonKind::NotANumber,
            format!("expected a finite number, got {}", raw),
        )),
    }
}

/// Boolean flag: JSON booleans plus the string forms `"true"`, `"false"`,
/// `"1"`, `"0"`.
pub fn validate_flag(field: &str, raw: &JsonValue) -> Result<bool, FieldError> {
    let parsed = match raw {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| {
        FieldError::new(
            field,
            ReasonKind::NotAFlag,
            format!("expected a boolean flag, got {}", raw),
        )
    })
}

/// Closed string enumeration. Returns the canonical `&'static str` from
/// `allowed` so downstream code never carries caller-owned spellings.
pub fn validate_one_of(
    field: &str,
    raw: &JsonValue,
    allowed: &'static [&'static str],
) -> Result<&'static str, FieldError> {
    let candidate = raw.as_str().map(str::trim);
    if let Some(c) = candidate {
        if let Some(hit) = allowed.iter().find(|a| **a == c) {
            return Ok(hit);
        }
    }
    Err(FieldError::new(
        field,
        ReasonKind::NotOneOf,
        format!("expected one of {:?}, got {}", allowed, raw),
    ))
}
