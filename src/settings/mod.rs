//! Typed guild settings: schema, record, and string-to-value coercion.
//!
//! Command handlers receive raw strings from the invocation. Everything
//! kind-specific (parsing, range checks, boolean literals, display) happens
//! here so each handler stays a thin call into [`coerce_and_validate`] and
//! [`ConfigRecord::apply`].

pub mod record;
pub mod schema;

use thiserror::Error;

pub use record::{ConfigRecord, TypedValue};
pub use schema::{ConfigField, Constraint, FieldKind};

/// Literals accepted for boolean fields, in the order shown to users.
pub const VALID_BOOLEANS: [&str; 4] = ["true", "false", "1", "0"];

/// User-input failures. The `Display` text is the reply sent to the invoker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Invalid key {0}!")]
    InvalidKey(String),

    #[error("Please enter a valid number")]
    NotANumber,

    #[error("Please enter a number {range}")]
    OutOfRange { key: String, range: String },

    #[error("Invalid value '{value}' for key '{key}'! Valid values: {}", VALID_BOOLEANS.join(", "))]
    InvalidBoolean { key: String, value: String },

    #[error("{0} is not a boolean!")]
    NotBoolean(String),

    #[error("Unknown type for '{0}'! Please report this to the bot maintainers.")]
    UnknownKind(String),
}

pub fn is_valid_key(key: &str) -> bool {
    schema::field(key).is_some()
}

pub fn kind_of(key: &str) -> Option<FieldKind> {
    schema::field(key).map(|f| f.kind())
}

/// Names of every boolean field, in schema order. Only these may be
/// enabled or disabled.
pub fn boolean_fields() -> Vec<&'static str> {
    schema::fields()
        .iter()
        .filter(|f| f.kind() == FieldKind::Boolean)
        .map(|f| f.name)
        .collect()
}

/// Coerce `raw` into the kind declared for `key` and run the field's
/// constraint.
///
/// Numbers reject zero as well as unparsable input, so `"0"` is never a
/// valid number value.
pub fn coerce_and_validate(key: &str, raw: &str) -> Result<TypedValue, SettingsError> {
    let field = schema::field(key).ok_or_else(|| SettingsError::InvalidKey(key.to_string()))?;

    match field.kind() {
        FieldKind::String => Ok(TypedValue::String(raw.to_string())),
        FieldKind::Number => {
            let value = parse_number(raw).ok_or(SettingsError::NotANumber)?;
            if let Some(constraint) = field.constraint
                && !constraint.admits(value)
            {
                return Err(SettingsError::OutOfRange {
                    key: key.to_string(),
                    range: constraint.describe(),
                });
            }
            Ok(TypedValue::Number(value))
        }
        FieldKind::Boolean => {
            if !VALID_BOOLEANS.contains(&raw) {
                return Err(SettingsError::InvalidBoolean {
                    key: key.to_string(),
                    value: raw.to_string(),
                });
            }
            Ok(TypedValue::Boolean(matches!(raw, "true" | "1")))
        }
    }
}

/// Render the current value of `key` for display.
pub fn render(key: &str, record: &ConfigRecord) -> Option<String> {
    record.get(key).map(|v| v.to_string())
}

// Zero, NaN and infinities are all treated as "not a number".
fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    if value == 0.0 || !value.is_finite() {
        return None;
    }
    Some(value)
}
