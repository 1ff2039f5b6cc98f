//! Static field schema for the per-guild configuration record.
//!
//! Each [`ConfigField`] pairs a stable key with a typed [`Accessor`] into
//! [`ConfigRecord`]. The accessor variant *is* the field's kind, so a field
//! can never carry two kinds and handlers never index the record by string.

use std::fmt;
use std::ops::Bound;

use super::record::ConfigRecord;

// ── Kind ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

// ── Constraint ────────────────────────────────────────────────────────────────

/// Field-specific validation applied after kind coercion succeeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Range { min: Bound<f64>, max: Bound<f64> },
}

impl Constraint {
    pub fn admits(&self, value: f64) -> bool {
        match self {
            Constraint::Range { min, max } => {
                let above = match min {
                    Bound::Included(lo) => value >= *lo,
                    Bound::Excluded(lo) => value > *lo,
                    Bound::Unbounded => true,
                };
                let below = match max {
                    Bound::Included(hi) => value <= *hi,
                    Bound::Excluded(hi) => value < *hi,
                    Bound::Unbounded => true,
                };
                above && below
            }
        }
    }

    /// Human phrasing used in the out-of-range reply, e.g. `between 0 and 1`.
    pub fn describe(&self) -> String {
        match self {
            Constraint::Range { min, max } => match (bound_value(min), bound_value(max)) {
                (Some(lo), Some(hi)) => format!("between {lo} and {hi}"),
                (Some(lo), None) => format!("greater than {lo}"),
                (None, Some(hi)) => format!("less than {hi}"),
                (None, None) => "of any value".to_string(),
            },
        }
    }
}

fn bound_value(bound: &Bound<f64>) -> Option<f64> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(*v),
        Bound::Unbounded => None,
    }
}

// ── Accessor ──────────────────────────────────────────────────────────────────

/// Typed getter/setter pair for one record field.
#[derive(Clone, Copy)]
pub enum Accessor {
    String {
        get: fn(&ConfigRecord) -> String,
        set: fn(&mut ConfigRecord, String),
    },
    Number {
        get: fn(&ConfigRecord) -> f64,
        set: fn(&mut ConfigRecord, f64),
    },
    Boolean {
        get: fn(&ConfigRecord) -> bool,
        set: fn(&mut ConfigRecord, bool),
    },
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Accessor::String { .. } => FieldKind::String,
            Accessor::Number { .. } => FieldKind::Number,
            Accessor::Boolean { .. } => FieldKind::Boolean,
        };
        write!(f, "Accessor::{kind}")
    }
}

// ── Field ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub constraint: Option<Constraint>,
    pub accessor: Accessor,
}

impl ConfigField {
    pub fn kind(&self) -> FieldKind {
        match self.accessor {
            Accessor::String { .. } => FieldKind::String,
            Accessor::Number { .. } => FieldKind::Number,
            Accessor::Boolean { .. } => FieldKind::Boolean,
        }
    }
}

/// Declared fields, in display order. Keys match the record's serialized
/// (camelCase) names.
static SCHEMA: [ConfigField; 6] = [
    ConfigField {
        name: "prefix",
        constraint: None,
        accessor: Accessor::String {
            get: |r| r.prefix.clone(),
            set: |r, v| r.prefix = v,
        },
    },
    ConfigField {
        name: "welcomeMessage",
        constraint: None,
        accessor: Accessor::String {
            get: |r| r.welcome_message.clone(),
            set: |r, v| r.welcome_message = v,
        },
    },
    ConfigField {
        name: "welcomeEnabled",
        constraint: None,
        accessor: Accessor::Boolean {
            get: |r| r.welcome_enabled,
            set: |r, v| r.welcome_enabled = v,
        },
    },
    ConfigField {
        name: "susEnabled",
        constraint: None,
        accessor: Accessor::Boolean {
            get: |r| r.sus_enabled,
            set: |r, v| r.sus_enabled = v,
        },
    },
    ConfigField {
        name: "susChance",
        constraint: Some(Constraint::Range {
            min: Bound::Excluded(0.0),
            max: Bound::Included(1.0),
        }),
        accessor: Accessor::Number {
            get: |r| r.sus_chance,
            set: |r, v| r.sus_chance = v,
        },
    },
    ConfigField {
        name: "maxWarnings",
        constraint: None,
        accessor: Accessor::Number {
            get: |r| r.max_warnings,
            set: |r, v| r.max_warnings = v,
        },
    },
];

pub fn fields() -> &'static [ConfigField] {
    &SCHEMA
}

pub fn field(key: &str) -> Option<&'static ConfigField> {
    SCHEMA.iter().find(|f| f.name == key)
}
