//! Data model seen by templates.
//!
//! Templates walk a small dynamic value tree rather than Rust types
//! directly. Structs keep their declaration order so that printing a whole
//! struct (`{{.SavedSearch}}`) is stable.

use std::fmt;

/// A value reachable from a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absence of a value.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// String.
    Str(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Named record with ordered fields.
    Struct {
        /// Type name used in error messages.
        type_name: String,
        /// Fields in declaration order.
        fields: Vec<(String, Value)>,
    },
}

impl Value {
    /// Build a struct value from `(field, value)` pairs.
    #[must_use]
    pub fn record<I, K>(type_name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Struct {
            type_name: type_name.to_string(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a struct field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct { fields, .. } => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Truth value used by `if`, `with`, `and`, `or` and `not`.
    ///
    /// `false`, `0`, nil, the empty string and the empty list are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Struct { .. } => true,
        }
    }

    /// Short type description for error messages.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Struct { type_name, .. } => type_name,
        }
    }

    /// Render with field names included for structs (`%+v`).
    #[must_use]
    pub fn to_verbose_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_value(&mut out, self, true);
        out
    }
}

fn write_value(out: &mut impl fmt::Write, value: &Value, named: bool) -> fmt::Result {
    match value {
        Value::Nil => out.write_str("<nil>"),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Int(n) => write!(out, "{n}"),
        Value::Str(s) => out.write_str(s),
        Value::List(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_char(' ')?;
                }
                write_value(out, item, named)?;
            }
            out.write_char(']')
        },
        Value::Struct { fields, .. } => {
            out.write_char('{')?;
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    out.write_char(' ')?;
                }
                if named {
                    write!(out, "{name}:")?;
                }
                write_value(out, field, named)?;
            }
            out.write_char('}')
        },
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, false)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Nil, Into::into)
    }
}
