//! # Wire Format
//!
//! A self-describing protobuf encoding of [`TypedValue`], for transports that move typed
//! objects across a byte boundary.
//!
//! Every object is a `WireObject` with a `oneof` carrying its tag:
//!
//! ```text
//! message WireObject {
//!   oneof kind {
//!     bool       null        = 1;
//!     int64      int64       = 2;
//!     string     string      = 3;
//!     bytes      data        = 4;
//!     bytes      identifier  = 5;  // exactly 16 bytes
//!     WireArray  array       = 6;
//!     WireDict   dictionary  = 7;
//!     int32      error       = 8;  // 1 interrupted, 2 invalid, 3 termination imminent
//!     string     unsupported = 9;  // type name
//!   }
//! }
//! message WireArray { repeated WireObject items = 1; }
//! message WireDict  { repeated WireEntry entries = 1; }
//! message WireEntry { string key = 1; WireObject value = 2; }
//! ```
//!
//! ## Nesting limit
//!
//! Decoders stop after [`MAX_WIRE_DEPTH`] nested messages. An array costs two of them
//! (`WireArray`, then the item's `WireObject`) and a dictionary three (`WireDict`,
//! `WireEntry`, `WireObject`), so at most 50 nested arrays or 33 nested dictionaries fit.
//! [`encode`] rejects anything deeper instead of producing bytes nobody can read.
use crate::codec::IDENTIFIER_LEN;
use crate::value::{TransportError, TypedValue};
use bytes::Bytes;
use prost::Message;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Failed to decode typed object: '{0}'")]
    Decode(#[from] prost::DecodeError),
    #[error("Typed object is missing its kind")]
    MissingKind,
    #[error("Identifier must be {IDENTIFIER_LEN} bytes long, got {0}")]
    InvalidIdentifier(usize),
    #[error("Typed object nests {0} messages deep, at most {MAX_WIRE_DEPTH} can be decoded")]
    TooDeep(usize),
}

/// Nested messages a decoder accepts below the root object.
pub const MAX_WIRE_DEPTH: usize = 100;

#[derive(Clone, PartialEq, Message)]
pub struct WireObject {
    #[prost(oneof = "wire_object::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9")]
    pub kind: Option<wire_object::Kind>,
}

pub mod wire_object {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(bool, tag = "1")]
        Null(bool),
        #[prost(int64, tag = "2")]
        Int64(i64),
        #[prost(string, tag = "3")]
        String(String),
        #[prost(bytes = "bytes", tag = "4")]
        Data(::bytes::Bytes),
        #[prost(bytes = "vec", tag = "5")]
        Identifier(Vec<u8>),
        #[prost(message, tag = "6")]
        Array(super::WireArray),
        #[prost(message, tag = "7")]
        Dictionary(super::WireDict),
        #[prost(int32, tag = "8")]
        Error(i32),
        #[prost(string, tag = "9")]
        Unsupported(String),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct WireArray {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<WireObject>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WireDict {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<WireEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WireEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<WireObject>,
}

/// Encodes a typed object into its wire bytes.
///
/// Fails with [`WireError::TooDeep`] when the object nests deeper than a decoder accepts.
pub fn encode(value: &TypedValue) -> Result<Bytes, WireError> {
    let depth = wire_depth(value);
    if depth > MAX_WIRE_DEPTH {
        return Err(WireError::TooDeep(depth));
    }

    Ok(Bytes::from(WireObject::from(value).encode_to_vec()))
}

/// Number of nested messages below the root `WireObject` of `value`.
fn wire_depth(value: &TypedValue) -> usize {
    match value {
        TypedValue::Array(items) => 2 + items.iter().map(wire_depth).max().unwrap_or(0),
        TypedValue::Dictionary(dictionary) => {
            3 + dictionary.values().map(wire_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Decodes wire bytes back into a typed object.
pub fn decode(buf: &[u8]) -> Result<TypedValue, WireError> {
    let object = WireObject::decode(buf)?;
    TypedValue::try_from(object)
}

impl From<&TypedValue> for WireObject {
    fn from(value: &TypedValue) -> Self {
        use wire_object::Kind;

        let kind = match value {
            TypedValue::Null => Kind::Null(true),
            TypedValue::Int64(i) => Kind::Int64(*i),
            TypedValue::String(s) => Kind::String(s.clone()),
            TypedValue::Data(bytes) => Kind::Data(bytes.clone()),
            TypedValue::Identifier(uuid) => Kind::Identifier(uuid.as_bytes().to_vec()),
            TypedValue::Array(items) => Kind::Array(WireArray {
                items: items.iter().map(WireObject::from).collect(),
            }),
            TypedValue::Dictionary(dictionary) => Kind::Dictionary(WireDict {
                entries: dictionary
                    .iter()
                    .map(|(key, value)| WireEntry {
                        key: key.clone(),
                        value: Some(WireObject::from(value)),
                    })
                    .collect(),
            }),
            TypedValue::Error(error) => Kind::Error(error.code()),
            TypedValue::Unsupported(type_name) => Kind::Unsupported(type_name.clone()),
        };

        WireObject { kind: Some(kind) }
    }
}

impl TryFrom<WireObject> for TypedValue {
    type Error = WireError;

    fn try_from(object: WireObject) -> Result<Self, WireError> {
        use wire_object::Kind;

        let value = match object.kind.ok_or(WireError::MissingKind)? {
            Kind::Null(_) => TypedValue::Null,
            Kind::Int64(i) => TypedValue::Int64(i),
            Kind::String(s) => TypedValue::String(s),
            Kind::Data(bytes) => TypedValue::Data(bytes),
            Kind::Identifier(bytes) => {
                let uuid = Uuid::from_slice(&bytes)
                    .map_err(|_| WireError::InvalidIdentifier(bytes.len()))?;
                TypedValue::Identifier(uuid)
            }
            Kind::Array(array) => TypedValue::Array(
                array
                    .items
                    .into_iter()
                    .map(TypedValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Kind::Dictionary(dict) => TypedValue::Dictionary(
                dict.entries
                    .into_iter()
                    .map(|entry| -> Result<(String, TypedValue), WireError> {
                        let value = entry.value.ok_or(WireError::MissingKind)?;
                        Ok((entry.key, TypedValue::try_from(value)?))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Kind::Error(code) => TypedValue::Error(TransportError::from_code(code)),
            Kind::Unsupported(type_name) => TypedValue::Unsupported(type_name),
        };

        Ok(value)
    }
}
