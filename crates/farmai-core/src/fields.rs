// Static field schemas and validated key/value records for data-entry forms.
//
// The wizard steps and the general-information part of the diagnosis sheet
// are flat forms: a fixed list of fields, each either numeric or text. User
// input arrives as strings and is kept as strings once validated, so the
// exact text the farmer typed ("2.5", "35") is what gets shown and sent to
// the model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Must parse as a finite number.
    Number,
    /// Single-line free text.
    Text,
    /// Multi-line free text.
    LongText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn number(key: &'static str, label: &'static str, unit: Option<&'static str>) -> Self {
        Self {
            key,
            label,
            unit,
            kind: FieldKind::Number,
        }
    }

    pub const fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            unit: None,
            kind: FieldKind::Text,
        }
    }

    pub const fn long_text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            unit: None,
            kind: FieldKind::LongText,
        }
    }

    /// Label with its unit, e.g. `Day temperature (°C)`.
    pub fn display_label(&self) -> String {
        match self.unit {
            Some(unit) => format!("{} ({unit})", self.label),
            None => self.label.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldValues
// ---------------------------------------------------------------------------

/// Validated values for one form, keyed by `FieldSpec::key`.
///
/// Blank inputs are dropped, so a key is present only when the user
/// recorded something for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValues(BTreeMap<String, String>);

impl FieldValues {
    /// Validate raw `(key, value)` inputs against `schema`.
    ///
    /// `scope` prefixes field names in errors (`environment.humidity`).
    pub fn validated<I, K, V>(
        scope: &str,
        schema: &[FieldSpec],
        inputs: I,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in inputs {
            let key = key.into();
            let value: String = value.into();
            let field = format!("{scope}.{key}");

            let Some(spec) = schema.iter().find(|s| s.key == key) else {
                return Err(ValidationError::new(field, "unknown field"));
            };

            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }

            if spec.kind == FieldKind::Number {
                match parse_number(trimmed) {
                    Some(n) if n.is_finite() => {}
                    _ => return Err(ValidationError::new(field, format!("`{trimmed}` is not a number"))),
                }
            }

            let stored = if spec.kind == FieldKind::LongText {
                value.trim_end().to_string()
            } else {
                trimmed.to_string()
            };
            values.insert(key, stored);
        }
        Ok(Self(values))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Numeric value of `key`, if present and numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(parse_number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a number as farmers type it: thousands separators are allowed.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
