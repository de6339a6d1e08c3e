use bytes::Bytes;
use std::collections::BTreeMap;

/// A string-keyed map of host values.
pub type DynamicMap = BTreeMap<String, DynamicValue>;

/// A host-side value.
///
/// Values are built fresh by every conversion and compared structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Buffer(Buffer),
    List(Vec<DynamicValue>),
    Map(DynamicMap),
}

impl DynamicValue {
    /// A short name for the kind of value, used in conversion reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DynamicValue::Null => "null",
            DynamicValue::Bool(_) => "boolean",
            DynamicValue::Integer(_) => "integer",
            DynamicValue::Float(_) => "float",
            DynamicValue::String(_) => "string",
            DynamicValue::Buffer(_) => "buffer",
            DynamicValue::List(_) => "list",
            DynamicValue::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&DynamicMap> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            DynamicValue::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

/// How the bytes of a [`Buffer`] should be interpreted when sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferKind {
    /// Arbitrary byte data, sent over its full length.
    #[default]
    Data,
    /// A 16-byte identifier; only the first 16 bytes are sent.
    Identifier,
}

/// A byte buffer plus the marker telling the codec how to send it.
///
/// Clones share the underlying storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    bytes: Bytes,
    kind: BufferKind,
}

impl Buffer {
    /// Creates a plain data buffer.
    pub fn data(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            kind: BufferKind::Data,
        }
    }

    /// Creates a buffer marked as a 16-byte identifier.
    pub fn identifier(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            kind: BufferKind::Identifier,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == BufferKind::Identifier
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        DynamicValue::Bool(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        DynamicValue::Integer(value)
    }
}

impl From<i32> for DynamicValue {
    fn from(value: i32) -> Self {
        DynamicValue::Integer(value.into())
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        DynamicValue::Float(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        DynamicValue::String(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        DynamicValue::String(value)
    }
}

impl From<Buffer> for DynamicValue {
    fn from(value: Buffer) -> Self {
        DynamicValue::Buffer(value)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(value: Vec<DynamicValue>) -> Self {
        DynamicValue::List(value)
    }
}

impl From<DynamicMap> for DynamicValue {
    fn from(value: DynamicMap) -> Self {
        DynamicValue::Map(value)
    }
}

impl<K: Into<String>, V: Into<DynamicValue>> FromIterator<(K, V)> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        DynamicValue::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
