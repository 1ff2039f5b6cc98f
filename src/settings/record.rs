//! The per-guild configuration record and typed values written into it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SettingsError;
use super::schema::{self, Accessor};

/// A coerced, validated value ready to be written through an [`Accessor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Number(n) => write!(f, "{n}"),
            TypedValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// One guild's configuration. Its fields are exactly the declared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigRecord {
    pub prefix: String,
    pub welcome_message: String,
    pub welcome_enabled: bool,
    pub sus_enabled: bool,
    pub sus_chance: f64,
    pub max_warnings: f64,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            welcome_message: "Welcome, {user}!".to_string(),
            welcome_enabled: false,
            sus_enabled: false,
            sus_chance: 0.05,
            max_warnings: 3.0,
        }
    }
}

impl ConfigRecord {
    /// Read a field by key.
    pub fn get(&self, key: &str) -> Option<TypedValue> {
        let field = schema::field(key)?;
        Some(match field.accessor {
            Accessor::String { get, .. } => TypedValue::String(get(self)),
            Accessor::Number { get, .. } => TypedValue::Number(get(self)),
            Accessor::Boolean { get, .. } => TypedValue::Boolean(get(self)),
        })
    }

    /// Write `value` into the field named `key`.
    ///
    /// A value whose variant does not match the field's accessor is
    /// rejected with [`SettingsError::UnknownKind`] and leaves the record
    /// untouched.
    pub fn apply(&mut self, key: &str, value: TypedValue) -> Result<(), SettingsError> {
        let field = schema::field(key).ok_or_else(|| SettingsError::InvalidKey(key.to_string()))?;
        match (field.accessor, value) {
            (Accessor::String { set, .. }, TypedValue::String(v)) => set(self, v),
            (Accessor::Number { set, .. }, TypedValue::Number(v)) => set(self, v),
            (Accessor::Boolean { set, .. }, TypedValue::Boolean(v)) => set(self, v),
            _ => return Err(SettingsError::UnknownKind(key.to_string())),
        }
        Ok(())
    }
}
