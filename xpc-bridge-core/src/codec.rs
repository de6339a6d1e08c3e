//! # Value Codec
//!
//! Recursive conversion between host values ([`DynamicValue`]) and typed transport
//! objects ([`TypedValue`]).
//!
//! ## Best-effort policy
//!
//! A single node that cannot be converted never aborts the conversion of the message
//! it belongs to. Instead:
//!
//! * the node is replaced by a `Null` placeholder, keeping its key or array index, and
//! * a [`DroppedNode`] carrying its [`NodePath`] and the reason is appended to the
//!   [`Converted::dropped`] report.
//!
//! The same rule applies to map entries and array elements, in both directions.
//!
//! ## DynamicValue -> TypedValue
//!
//! | Host value                      | Typed object  |
//! |---------------------------------|---------------|
//! | `Integer`                       | `Int64`       |
//! | integral `Float` in 32-bit range| `Int64`       |
//! | `String`                        | `String`      |
//! | `Buffer` marked as identifier   | `Identifier`  |
//! | `Buffer`                        | `Data`        |
//! | `List`                          | `Array`       |
//! | `Map`                           | `Dictionary`  |
//! | anything else                   | unrepresentable |
//!
//! ## TypedValue -> DynamicValue
//!
//! `Data` and `Identifier` both come back as plain data buffers. `Error` and unsupported
//! nodes are logged and degrade to `Null`.
use crate::value::{Buffer, BufferKind, Dictionary, DynamicMap, DynamicValue, TypedValue};
use bytes::Bytes;
use std::fmt;
use uuid::Uuid;

/// Size of an identifier in bytes.
pub const IDENTIFIER_LEN: usize = 16;

/// Why a node was left out of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Typed object of type '{0}' cannot be converted to a value")]
    UnsupportedType(String),
    #[error("Value of kind '{0}' cannot be represented as a typed object")]
    UnrepresentableValue(&'static str),
    #[error("Identifier buffer holds {0} bytes, {IDENTIFIER_LEN} are required")]
    ShortIdentifier(usize),
}

/// One step into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node inside a converted value, rendered as `$.tags[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A node that was replaced by a placeholder (or, at the root, left out entirely).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedNode {
    pub path: NodePath,
    pub error: ConversionError,
}

/// The result of a best-effort conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<T> {
    pub value: T,
    pub dropped: Vec<DroppedNode>,
}

impl<T> Converted<T> {
    /// `true` when every node was converted.
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Converted<U> {
        Converted {
            value: f(self.value),
            dropped: self.dropped,
        }
    }
}

/// Converts a host value into a typed object.
///
/// Returns `None` as the value when the root itself is unrepresentable.
pub fn to_typed(value: &DynamicValue) -> Converted<Option<TypedValue>> {
    let mut walker = Walker::default();
    let value = walker.typed(value).ok();
    walker.finish(value)
}

/// Converts a host map into a typed dictionary. This is what a connection sends.
pub fn map_to_dictionary(map: &DynamicMap) -> Converted<Dictionary> {
    let mut walker = Walker::default();
    let dictionary = walker.typed_dictionary(map);
    walker.finish(dictionary)
}

/// Converts a typed object into a host value.
///
/// Returns `None` as the value when the root itself is unsupported.
pub fn to_dynamic(value: &TypedValue) -> Converted<Option<DynamicValue>> {
    let mut walker = Walker::default();
    let value = walker.dynamic(value).ok();
    walker.finish(value)
}

/// Converts a typed dictionary into a host map. This is what an inbound event becomes.
pub fn dictionary_to_map(dictionary: &Dictionary) -> Converted<DynamicMap> {
    let mut walker = Walker::default();
    let map = walker.dynamic_map(dictionary);
    walker.finish(map)
}

/// Tracks the current position and the nodes dropped so far.
#[derive(Default)]
struct Walker {
    path: Vec<PathSegment>,
    dropped: Vec<DroppedNode>,
}

impl Walker {
    fn finish<T>(self, value: T) -> Converted<T> {
        Converted {
            value,
            dropped: self.dropped,
        }
    }

    fn record(&mut self, error: ConversionError) {
        let path = NodePath(self.path.clone());
        tracing::warn!(%path, %error, "dropping node during conversion");
        self.dropped.push(DroppedNode { path, error });
    }

    fn typed(&mut self, value: &DynamicValue) -> Result<TypedValue, ConversionError> {
        let result = match value {
            DynamicValue::Integer(i) => Ok(TypedValue::Int64(*i)),
            DynamicValue::Float(f) => float_to_int64(*f).map(TypedValue::Int64),
            DynamicValue::String(s) => Ok(TypedValue::String(s.clone())),
            DynamicValue::List(items) => Ok(TypedValue::Array(self.typed_array(items))),
            DynamicValue::Buffer(buffer) => buffer_to_typed(buffer),
            DynamicValue::Map(map) => Ok(TypedValue::Dictionary(self.typed_dictionary(map))),
            DynamicValue::Null | DynamicValue::Bool(_) => {
                Err(ConversionError::UnrepresentableValue(value.kind()))
            }
        };

        result.inspect_err(|e| self.record(e.clone()))
    }

    fn typed_array(&mut self, items: &[DynamicValue]) -> Vec<TypedValue> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.path.push(PathSegment::Index(index));
                let typed = self.typed(item).unwrap_or(TypedValue::Null);
                self.path.pop();
                typed
            })
            .collect()
    }

    fn typed_dictionary(&mut self, map: &DynamicMap) -> Dictionary {
        map.iter()
            .map(|(key, value)| {
                self.path.push(PathSegment::Key(key.clone()));
                let typed = self.typed(value).unwrap_or(TypedValue::Null);
                self.path.pop();
                (key.clone(), typed)
            })
            .collect()
    }

    fn dynamic(&mut self, value: &TypedValue) -> Result<DynamicValue, ConversionError> {
        match value {
            TypedValue::Null => Ok(DynamicValue::Null),
            TypedValue::Int64(i) => Ok(DynamicValue::Integer(*i)),
            TypedValue::String(s) => Ok(DynamicValue::String(s.clone())),
            TypedValue::Dictionary(dictionary) => {
                Ok(DynamicValue::Map(self.dynamic_map(dictionary)))
            }
            TypedValue::Array(items) => Ok(DynamicValue::List(self.dynamic_list(items))),
            TypedValue::Data(bytes) => Ok(DynamicValue::Buffer(Buffer::data(bytes.clone()))),
            TypedValue::Identifier(uuid) => Ok(DynamicValue::Buffer(Buffer::data(
                Bytes::copy_from_slice(uuid.as_bytes()),
            ))),
            TypedValue::Error(_) | TypedValue::Unsupported(_) => {
                let error = ConversionError::UnsupportedType(value.type_name().to_string());
                self.record(error.clone());
                Err(error)
            }
        }
    }

    fn dynamic_list(&mut self, items: &[TypedValue]) -> Vec<DynamicValue> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.path.push(PathSegment::Index(index));
                let value = self.dynamic(item).unwrap_or(DynamicValue::Null);
                self.path.pop();
                value
            })
            .collect()
    }

    fn dynamic_map(&mut self, dictionary: &Dictionary) -> DynamicMap {
        dictionary
            .iter()
            .map(|(key, item)| {
                self.path.push(PathSegment::Key(key.clone()));
                let value = self.dynamic(item).unwrap_or(DynamicValue::Null);
                self.path.pop();
                (key.clone(), value)
            })
            .collect()
    }
}

// Host numbers only count as integers when they fit a 32-bit signed or unsigned slot.
fn float_to_int64(f: f64) -> Result<i64, ConversionError> {
    let in_range = f >= f64::from(i32::MIN) && f <= f64::from(u32::MAX);
    if f.fract() == 0.0 && in_range {
        Ok(f as i64)
    } else {
        Err(ConversionError::UnrepresentableValue("float"))
    }
}

fn buffer_to_typed(buffer: &Buffer) -> Result<TypedValue, ConversionError> {
    match buffer.kind() {
        BufferKind::Identifier => {
            let bytes = buffer
                .bytes()
                .get(..IDENTIFIER_LEN)
                .ok_or(ConversionError::ShortIdentifier(buffer.len()))?;
            let uuid = Uuid::from_slice(bytes)
                .map_err(|_| ConversionError::ShortIdentifier(buffer.len()))?;
            Ok(TypedValue::Identifier(uuid))
        }
        BufferKind::Data => Ok(TypedValue::Data(buffer.bytes().clone())),
    }
}
