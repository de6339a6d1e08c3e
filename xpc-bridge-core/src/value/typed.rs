use bytes::Bytes;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A dictionary of typed objects. Keys are unique.
pub type Dictionary = BTreeMap<String, TypedValue>;

/// A typed object as carried by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// Placeholder for a child that could not be represented.
    Null,
    Int64(i64),
    String(String),
    Data(Bytes),
    /// A fixed 16-byte binary identifier.
    Identifier(Uuid),
    Array(Vec<TypedValue>),
    Dictionary(Dictionary),
    /// A connection lifecycle signal emitted by the transport.
    Error(TransportError),
    /// Any transport object kind this crate does not model (booleans, doubles, dates,
    /// file descriptors...), identified by its type name.
    Unsupported(String),
}

impl TypedValue {
    /// Returns the transport type name of this object (e.g. `int64`, `dictionary`).
    pub fn type_name(&self) -> &str {
        match self {
            TypedValue::Null => "null",
            TypedValue::Int64(_) => "int64",
            TypedValue::String(_) => "string",
            TypedValue::Data(_) => "data",
            TypedValue::Identifier(_) => "uuid",
            TypedValue::Array(_) => "array",
            TypedValue::Dictionary(_) => "dictionary",
            TypedValue::Error(_) => "error",
            TypedValue::Unsupported(name) => name,
        }
    }

    /// Returns the inner [`Dictionary`] if this object is a dictionary.
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            TypedValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }
}

/// Connection lifecycle signals delivered through the event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportError {
    /// The remote end went away; the connection may be usable again later.
    ConnectionInterrupted,
    /// The connection can never be used again (unknown service, cancelled...).
    ConnectionInvalid,
    /// The process is about to be terminated by the system.
    TerminationImminent,
    /// A signal with a code this crate does not know about.
    Other(i32),
}

impl TransportError {
    pub const INTERRUPTED_CODE: i32 = 1;
    pub const INVALID_CODE: i32 = 2;
    pub const TERMINATION_IMMINENT_CODE: i32 = 3;

    /// Numeric code used on the wire.
    pub fn code(self) -> i32 {
        match self {
            TransportError::ConnectionInterrupted => Self::INTERRUPTED_CODE,
            TransportError::ConnectionInvalid => Self::INVALID_CODE,
            TransportError::TerminationImminent => Self::TERMINATION_IMMINENT_CODE,
            TransportError::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::INTERRUPTED_CODE => TransportError::ConnectionInterrupted,
            Self::INVALID_CODE => TransportError::ConnectionInvalid,
            Self::TERMINATION_IMMINENT_CODE => TransportError::TerminationImminent,
            other => TransportError::Other(other),
        }
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int64(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<Uuid> for TypedValue {
    fn from(value: Uuid) -> Self {
        TypedValue::Identifier(value)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(value: Vec<TypedValue>) -> Self {
        TypedValue::Array(value)
    }
}

impl From<Dictionary> for TypedValue {
    fn from(value: Dictionary) -> Self {
        TypedValue::Dictionary(value)
    }
}

impl From<TransportError> for TypedValue {
    fn from(value: TransportError) -> Self {
        TypedValue::Error(value)
    }
}
