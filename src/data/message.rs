//! Typed message values.
//!
//! A [`MessageValue`] is a decoded message (or one of its fields) with the
//! field order and type names of its schema preserved. The tree builder only
//! needs to know whether a value is composite, a sequence, or a scalar; the
//! value column shows the scalar's canonical text.

use std::fmt;

/// One field of a composite message.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Declared type, possibly carrying an array suffix (`float64[3]`).
    pub type_name: String,
    pub value: MessageValue,
}

/// A composite message: a type name and its fields in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub type_name: String,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, builder style.
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: MessageValue,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            type_name: type_name.into(),
            value,
        });
        self
    }

    /// Look up a field value by name.
    pub fn get(&self, name: &str) -> Option<&MessageValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time { secs: u32, nsecs: u32 },
    Duration { secs: i32, nsecs: i32 },
    Array(Vec<MessageValue>),
    Message(Message),
}

impl MessageValue {
    /// True if the value exposes named sub-fields.
    pub fn is_composite(&self) -> bool {
        matches!(self, MessageValue::Message(_))
    }

    /// The composite elements of a non-empty sequence whose elements are
    /// composite, or `None` for anything else.
    pub fn composite_elements(&self) -> Option<&[MessageValue]> {
        match self {
            MessageValue::Array(items) if items.first().is_some_and(|v| v.is_composite()) => {
                Some(items)
            }
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            MessageValue::Message(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageValue::Bool(true) => f.write_str("True"),
            MessageValue::Bool(false) => f.write_str("False"),
            MessageValue::Int(v) => write!(f, "{}", v),
            MessageValue::UInt(v) => write!(f, "{}", v),
            MessageValue::Float(v) => write!(f, "{:?}", v),
            MessageValue::Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '\n' => f.write_str("\\n")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
            MessageValue::Time { secs, nsecs } => write!(f, "{}.{:09}", secs, nsecs),
            MessageValue::Duration { secs, nsecs } => {
                let negative = *secs < 0 || *nsecs < 0;
                write!(
                    f,
                    "{}{}.{:09}",
                    if negative { "-" } else { "" },
                    secs.unsigned_abs(),
                    nsecs.unsigned_abs()
                )
            }
            MessageValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            MessageValue::Message(m) => {
                write!(f, "{}(", m.type_name)?;
                for (i, field) in m.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", field.name, field.value)?;
                }
                f.write_str(")")
            }
        }
    }
}
