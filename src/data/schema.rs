//! Message type reflection.
//!
//! Message types are described with the `.msg` text syntax: one
//! `type name` per line, `#` comments, and `type NAME=value` constants.
//! A [`TypeRegistry`] holds the parsed schemas and can build default
//! instances and decode JSON payloads into typed [`MessageValue`]s.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::message::{Field, Message, MessageValue};

/// Nesting limit for default instances and decoding of recursive types.
const MAX_DEPTH: usize = 32;

/// Errors raised while parsing definitions or decoding payloads.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A definition line could not be parsed.
    #[error("invalid definition for {type_name} at line {line}: {reason}")]
    InvalidDefinition {
        type_name: String,
        line: usize,
        reason: String,
    },

    /// The type is neither primitive nor registered.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The payload does not have the shape the type requires.
    #[error("expected {expected}, got {found}")]
    Mismatch { expected: String, found: String },

    /// A fixed-size array payload had the wrong length.
    #[error("array {type_name} expects {expected} elements, got {found}")]
    ArrayLength {
        type_name: String,
        expected: usize,
        found: usize,
    },

    /// Reading a definition file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A type name split into its base type and array suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub base: String,
    /// `None` if not an array, `Some(0)` for variable length, `Some(n)` for
    /// fixed length `n`.
    pub size: Option<usize>,
}

/// Split `Base[N]` / `Base[]` / `Base` into base type and array size.
///
/// A suffix that is not a valid length leaves the name untouched.
pub fn parse_array_type(type_name: &str) -> ArrayType {
    if let Some(stripped) = type_name.strip_suffix(']') {
        if let Some((base, len)) = stripped.split_once('[') {
            let size = if len.is_empty() {
                Some(0)
            } else {
                len.parse::<usize>().ok()
            };
            if let Some(size) = size {
                return ArrayType {
                    base: base.to_string(),
                    size: Some(size),
                };
            }
        }
    }
    ArrayType {
        base: type_name.to_string(),
        size: None,
    }
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Int(u32),
    UInt(u32),
    Float32,
    Float64,
    String,
    Time,
    Duration,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Primitive::Bool,
            "int8" => Primitive::Int(8),
            "int16" => Primitive::Int(16),
            "int32" => Primitive::Int(32),
            "int64" => Primitive::Int(64),
            // byte and char are the legacy aliases of int8 and uint8
            "byte" => Primitive::Int(8),
            "char" | "uint8" => Primitive::UInt(8),
            "uint16" => Primitive::UInt(16),
            "uint32" => Primitive::UInt(32),
            "uint64" => Primitive::UInt(64),
            "float32" => Primitive::Float32,
            "float64" => Primitive::Float64,
            "string" => Primitive::String,
            "time" => Primitive::Time,
            "duration" => Primitive::Duration,
            _ => return None,
        })
    }

    pub fn default_value(self) -> MessageValue {
        match self {
            Primitive::Bool => MessageValue::Bool(false),
            Primitive::Int(_) => MessageValue::Int(0),
            Primitive::UInt(_) => MessageValue::UInt(0),
            Primitive::Float32 | Primitive::Float64 => MessageValue::Float(0.0),
            Primitive::String => MessageValue::Str(String::new()),
            Primitive::Time => MessageValue::Time { secs: 0, nsecs: 0 },
            Primitive::Duration => MessageValue::Duration { secs: 0, nsecs: 0 },
        }
    }

    fn decode(self, name: &str, value: &Value) -> Result<MessageValue, SchemaError> {
        let mismatch = || SchemaError::Mismatch {
            expected: name.to_string(),
            found: value.to_string(),
        };
        match self {
            Primitive::Bool => value.as_bool().map(MessageValue::Bool).ok_or_else(mismatch),
            Primitive::Int(bits) => {
                let v = value.as_i64().ok_or_else(mismatch)?;
                let limit = 1i128 << (bits - 1);
                if (v as i128) < -limit || (v as i128) >= limit {
                    return Err(mismatch());
                }
                Ok(MessageValue::Int(v))
            }
            Primitive::UInt(bits) => {
                let v = value.as_u64().ok_or_else(mismatch)?;
                if bits < 64 && v >= (1u64 << bits) {
                    return Err(mismatch());
                }
                Ok(MessageValue::UInt(v))
            }
            Primitive::Float32 | Primitive::Float64 => {
                value.as_f64().map(MessageValue::Float).ok_or_else(mismatch)
            }
            Primitive::String => value
                .as_str()
                .map(|s| MessageValue::Str(s.to_string()))
                .ok_or_else(mismatch),
            Primitive::Time => {
                let (secs, nsecs) = decode_stamp(value).ok_or_else(mismatch)?;
                let secs = u32::try_from(secs).map_err(|_| mismatch())?;
                let nsecs = u32::try_from(nsecs).map_err(|_| mismatch())?;
                Ok(MessageValue::Time { secs, nsecs })
            }
            Primitive::Duration => {
                let (secs, nsecs) = decode_stamp(value).ok_or_else(mismatch)?;
                let secs = i32::try_from(secs).map_err(|_| mismatch())?;
                let nsecs = i32::try_from(nsecs).map_err(|_| mismatch())?;
                Ok(MessageValue::Duration { secs, nsecs })
            }
        }
    }
}

/// Accepts `{"secs":..,"nsecs":..}`, `{"sec":..,"nanosec":..}` or a float
/// number of seconds.
fn decode_stamp(value: &Value) -> Option<(i64, i64)> {
    if let Some(obj) = value.as_object() {
        let secs = obj.get("secs").or_else(|| obj.get("sec"))?.as_i64()?;
        let nsecs = obj
            .get("nsecs")
            .or_else(|| obj.get("nanosec"))
            .map(|v| v.as_i64())
            .unwrap_or(Some(0))?;
        return Some((secs, nsecs));
    }
    let seconds = value.as_f64()?;
    let secs = seconds.trunc();
    let nsecs = ((seconds - secs) * 1e9).round();
    Some((secs as i64, nsecs as i64))
}

/// A field declaration inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    /// Fully-qualified type name, array suffix included.
    pub type_name: String,
}

/// A constant declaration (`int32 MAX=10`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSchema {
    pub name: String,
    pub type_name: String,
    pub value: String,
}

/// The nested field structure of one composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSchema {
    /// Fully-qualified name (`package/Name`).
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub constants: Vec<ConstantSchema>,
}

impl MessageSchema {
    /// Parse a `.msg` definition for the type `name`.
    pub fn parse(name: &str, definition: &str) -> Result<Self, SchemaError> {
        let name = normalize_type_name(name);
        let package = name.split_once('/').map(|(p, _)| p.to_string());
        let mut fields = Vec::new();
        let mut constants = Vec::new();

        for (index, raw) in definition.lines().enumerate() {
            let invalid = |reason: &str| SchemaError::InvalidDefinition {
                type_name: name.clone(),
                line: index + 1,
                reason: reason.to_string(),
            };

            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Constants keep everything after '=' for strings
            if let Some((decl, value)) = line.split_once('=') {
                let mut parts = decl.split_whitespace();
                let (Some(type_name), Some(const_name), None) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(invalid("malformed constant"));
                };
                let value = if type_name == "string" {
                    value.trim().to_string()
                } else {
                    strip_comment(value).trim().to_string()
                };
                constants.push(ConstantSchema {
                    name: const_name.to_string(),
                    type_name: type_name.to_string(),
                    value,
                });
                continue;
            }

            let mut parts = strip_comment(line).split_whitespace();
            let (Some(type_name), Some(field_name), None) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid("expected `type name`"));
            };
            fields.push(FieldSchema {
                name: field_name.to_string(),
                type_name: qualify(type_name, package.as_deref()),
            });
        }

        Ok(Self {
            name,
            fields,
            constants,
        })
    }
}

fn strip_comment(line: &str) -> &str {
    match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    }
}

/// Resolve a field type against the package that declares it.
fn qualify(type_name: &str, package: Option<&str>) -> String {
    let array = parse_array_type(type_name);
    let base = if Primitive::from_name(&array.base).is_some() || array.base.contains('/') {
        normalize_type_name(&array.base)
    } else if array.base == "Header" {
        "std_msgs/Header".to_string()
    } else if let Some(package) = package {
        format!("{}/{}", package, array.base)
    } else {
        array.base.clone()
    };
    match array.size {
        None => base,
        Some(0) => format!("{}[]", base),
        Some(n) => format!("{}[{}]", base, n),
    }
}

/// `pkg/msg/Name` is accepted as an alias of `pkg/Name`.
fn normalize_type_name(name: &str) -> String {
    match name.split('/').collect::<Vec<_>>().as_slice() {
        [package, "msg", type_name] => format!("{}/{}", package, type_name),
        _ => name.to_string(),
    }
}

/// Resolves type names to schemas and default instances.
///
/// This is the reflection seam used by the tree builder.
pub trait TypeResolver {
    /// Schema of a composite type, `None` for primitives and unknown types.
    fn schema(&self, type_name: &str) -> Option<Arc<MessageSchema>>;

    /// A representative default value of the type, `None` if unresolvable.
    fn default_instance(&self, type_name: &str) -> Option<MessageValue>;
}

/// Registry of known message types.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    schemas: HashMap<String, Arc<MessageSchema>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry preloaded with `std_msgs/Header`.
    pub fn new() -> Self {
        let mut registry = Self {
            schemas: HashMap::new(),
        };
        let header = MessageSchema {
            name: "std_msgs/Header".to_string(),
            fields: vec![
                FieldSchema {
                    name: "seq".to_string(),
                    type_name: "uint32".to_string(),
                },
                FieldSchema {
                    name: "stamp".to_string(),
                    type_name: "time".to_string(),
                },
                FieldSchema {
                    name: "frame_id".to_string(),
                    type_name: "string".to_string(),
                },
            ],
            constants: Vec::new(),
        };
        registry.insert(header);
        registry
    }

    pub fn insert(&mut self, schema: MessageSchema) {
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
    }

    /// Parse and register an inline definition.
    pub fn add_definition(&mut self, name: &str, definition: &str) -> Result<(), SchemaError> {
        let schema = MessageSchema::parse(name, definition)?;
        self.insert(schema);
        Ok(())
    }

    /// Load every `.msg` file below `root`.
    ///
    /// The package is the containing directory, skipping a `msg` directory
    /// level (`geometry_msgs/msg/Point.msg` defines `geometry_msgs/Point`).
    /// Returns the number of types loaded.
    pub fn load_dir(&mut self, root: &Path) -> Result<usize, SchemaError> {
        let io_err = |path: &Path, source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut loaded = 0;
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| io_err(&dir, e))?;
            for entry in entries {
                let path = entry.map_err(|e| io_err(&dir, e))?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("msg") {
                    continue;
                }
                let Some(type_name) = type_name_for_file(&path) else {
                    continue;
                };
                let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
                self.add_definition(&type_name, &text)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(&normalize_type_name(type_name))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// True if the type (or its array base) is primitive or registered.
    pub fn is_resolvable(&self, type_name: &str) -> bool {
        let base = parse_array_type(type_name).base;
        Primitive::from_name(&base).is_some() || self.contains(&base)
    }

    /// Decode a JSON payload as `type_name`.
    pub fn decode(&self, type_name: &str, value: &Value) -> Result<MessageValue, SchemaError> {
        self.decode_at(type_name, value, 0)
    }

    fn decode_at(
        &self,
        type_name: &str,
        value: &Value,
        depth: usize,
    ) -> Result<MessageValue, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::Mismatch {
                expected: format!("at most {} levels of nesting", MAX_DEPTH),
                found: type_name.to_string(),
            });
        }

        let array = parse_array_type(type_name);
        if let Some(size) = array.size {
            let items = value.as_array().ok_or_else(|| SchemaError::Mismatch {
                expected: type_name.to_string(),
                found: value.to_string(),
            })?;
            if size > 0 && items.len() != size {
                return Err(SchemaError::ArrayLength {
                    type_name: type_name.to_string(),
                    expected: size,
                    found: items.len(),
                });
            }
            return items
                .iter()
                .map(|item| self.decode_at(&array.base, item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(MessageValue::Array);
        }

        if let Some(primitive) = Primitive::from_name(type_name) {
            return primitive.decode(type_name, value);
        }

        let schema = self
            .schema(type_name)
            .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))?;
        let object = value.as_object().ok_or_else(|| SchemaError::Mismatch {
            expected: schema.name.clone(),
            found: value.to_string(),
        })?;

        let mut message = Message::new(schema.name.clone());
        for field in &schema.fields {
            let value = match object.get(&field.name) {
                Some(v) => self.decode_at(&field.type_name, v, depth + 1)?,
                None => self
                    .default_at(&field.type_name, depth + 1)
                    .ok_or_else(|| SchemaError::UnknownType(field.type_name.clone()))?,
            };
            message.fields.push(Field {
                name: field.name.clone(),
                type_name: field.type_name.clone(),
                value,
            });
        }
        Ok(MessageValue::Message(message))
    }

    fn default_at(&self, type_name: &str, depth: usize) -> Option<MessageValue> {
        if depth > MAX_DEPTH {
            return None;
        }

        let array = parse_array_type(type_name);
        match array.size {
            Some(0) => return Some(MessageValue::Array(Vec::new())),
            Some(n) => {
                let element = self.default_at(&array.base, depth + 1)?;
                return Some(MessageValue::Array(vec![element; n]));
            }
            None => {}
        }

        if let Some(primitive) = Primitive::from_name(type_name) {
            return Some(primitive.default_value());
        }

        let schema = self.schema(type_name)?;
        let mut message = Message::new(schema.name.clone());
        for field in &schema.fields {
            message.fields.push(Field {
                name: field.name.clone(),
                type_name: field.type_name.clone(),
                value: self.default_at(&field.type_name, depth + 1)?,
            });
        }
        Some(MessageValue::Message(message))
    }
}

impl TypeResolver for TypeRegistry {
    fn schema(&self, type_name: &str) -> Option<Arc<MessageSchema>> {
        self.schemas.get(&normalize_type_name(type_name)).cloned()
    }

    fn default_instance(&self, type_name: &str) -> Option<MessageValue> {
        self.default_at(type_name, 0)
    }
}

fn type_name_for_file(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let mut parent = path.parent()?;
    if parent.file_name()?.to_str()? == "msg" {
        parent = parent.parent()?;
    }
    let package = parent.file_name()?.to_str()?;
    Some(format!("{}/{}", package, stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut r = TypeRegistry::new();
        r.add_definition("geometry_msgs/Point", "float64 x\nfloat64 y\nfloat64 z")
            .unwrap();
        r.add_definition(
            "geometry_msgs/Polygon",
            "# corners\nPoint[] points\nPoint[2] bounds\n",
        )
        .unwrap();
        r.add_definition("demo/Unknown", "missing_pkg/Nope[3] items").unwrap();
        r
    }

    #[test]
    fn parse_array_suffixes() {
        assert_eq!(
            parse_array_type("int32[]"),
            ArrayType {
                base: "int32".into(),
                size: Some(0)
            }
        );
        assert_eq!(
            parse_array_type("int32[4]"),
            ArrayType {
                base: "int32".into(),
                size: Some(4)
            }
        );
        assert_eq!(
            parse_array_type("int32"),
            ArrayType {
                base: "int32".into(),
                size: None
            }
        );
    }

    #[test]
    fn malformed_suffix_is_not_an_array() {
        assert_eq!(parse_array_type("int32[x]").size, None);
        assert_eq!(parse_array_type("int32[x]").base, "int32[x]");
        assert_eq!(parse_array_type("int32]").size, None);
    }

    #[test]
    fn definition_qualifies_field_types() {
        let schema = MessageSchema::parse(
            "nav_msgs/Path",
            "Header header\nPoseStamped[] poses  # trailing\nint32 MAX=10\nstring NAME=a # b\n",
        )
        .unwrap();

        assert_eq!(schema.name, "nav_msgs/Path");
        assert_eq!(schema.fields[0].type_name, "std_msgs/Header");
        assert_eq!(schema.fields[1].type_name, "nav_msgs/PoseStamped[]");
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.constants[0].value, "10");
        assert_eq!(schema.constants[1].value, "a # b");
    }

    #[test]
    fn definition_rejects_garbage() {
        let err = MessageSchema::parse("demo/Bad", "float64\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition { line: 1, .. }));
    }

    #[test]
    fn ros2_style_name_is_normalized() {
        let r = registry();
        assert!(r.contains("geometry_msgs/msg/Point"));
        assert!(r.schema("geometry_msgs/msg/Point").is_some());
    }

    #[test]
    fn default_instance_expands_fixed_arrays_only() {
        let r = registry();
        let polygon = r.default_instance("geometry_msgs/Polygon").unwrap();
        let message = polygon.as_message().unwrap();

        assert_eq!(message.get("points"), Some(&MessageValue::Array(vec![])));
        match message.get("bounds") {
            Some(MessageValue::Array(items)) => {
                assert_eq!(items.len(), 2);
                assert!(items[0].is_composite());
            }
            other => panic!("unexpected bounds: {:?}", other),
        }
    }

    #[test]
    fn default_instance_of_unresolvable_type_is_none() {
        let r = registry();
        assert!(r.default_instance("missing_pkg/Nope").is_none());
        assert!(r.default_instance("demo/Unknown").is_none());
        assert!(!r.is_resolvable("missing_pkg/Nope[]"));
        assert!(r.is_resolvable("float64[3]"));
    }

    #[test]
    fn decode_fills_missing_fields_with_defaults() {
        let r = registry();
        let value = r
            .decode("geometry_msgs/Point", &json!({"x": 1.5, "z": -2}))
            .unwrap();
        let point = value.as_message().unwrap();

        assert_eq!(point.get("x"), Some(&MessageValue::Float(1.5)));
        assert_eq!(point.get("y"), Some(&MessageValue::Float(0.0)));
        assert_eq!(point.get("z"), Some(&MessageValue::Float(-2.0)));
    }

    #[test]
    fn decode_header_stamp_variants() {
        let r = registry();
        let header = r
            .decode(
                "std_msgs/Header",
                &json!({"seq": 3, "stamp": {"sec": 10, "nanosec": 20}, "frame_id": "map"}),
            )
            .unwrap();
        let header = header.as_message().unwrap();
        assert_eq!(
            header.get("stamp"),
            Some(&MessageValue::Time { secs: 10, nsecs: 20 })
        );

        let stamp = Primitive::Time.decode("time", &json!(1.5)).unwrap();
        assert_eq!(
            stamp,
            MessageValue::Time {
                secs: 1,
                nsecs: 500_000_000
            }
        );
    }

    #[test]
    fn decode_rejects_mismatches() {
        let r = registry();
        assert!(matches!(
            r.decode("geometry_msgs/Point", &json!([1, 2])),
            Err(SchemaError::Mismatch { .. })
        ));
        assert!(matches!(
            r.decode("geometry_msgs/Polygon", &json!({"bounds": [{}]})),
            Err(SchemaError::ArrayLength {
                expected: 2,
                found: 1,
                ..
            })
        ));
        assert!(r.decode("int8", &json!(300)).is_err());
        assert!(r.decode("uint8", &json!(-1)).is_err());
        assert!(matches!(
            r.decode("nope/Nope", &json!({})),
            Err(SchemaError::UnknownType(_))
        ));
    }

    #[test]
    fn load_dir_uses_package_directories() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("geometry_msgs").join("msg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("Point.msg"), "float64 x\nfloat64 y\nfloat64 z\n").unwrap();
        let flat = dir.path().join("sensor_msgs");
        fs::create_dir_all(&flat).unwrap();
        fs::write(flat.join("Range.msg"), "Header header\nfloat32 range\n").unwrap();
        fs::write(flat.join("README.txt"), "ignored").unwrap();

        let mut r = TypeRegistry::new();
        assert_eq!(r.load_dir(dir.path()).unwrap(), 2);
        assert!(r.contains("geometry_msgs/Point"));
        assert!(r.contains("sensor_msgs/Range"));
    }
}
