//! # JSON Interop
//!
//! Lets hosts that already speak `serde_json::Value` use the bridge directly.
//!
//! JSON has no byte buffers, so buffers are rendered the way a Node.js `Buffer`
//! serializes itself: `{"type": "Buffer", "data": [..]}`. The reverse direction does not
//! recognise that shape; a JSON object always becomes a [`DynamicValue::Map`].
use super::{Buffer, DynamicValue};
use serde_json::{Map, Number, Value};

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DynamicValue::Null,
            Value::Bool(b) => DynamicValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DynamicValue::Integer(i),
                // u64 values above i64::MAX and real numbers
                None => DynamicValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DynamicValue::String(s),
            Value::Array(items) => {
                DynamicValue::List(items.into_iter().map(DynamicValue::from).collect())
            }
            Value::Object(entries) => DynamicValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, DynamicValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl DynamicValue {
    /// Renders this value as JSON.
    ///
    /// Non-finite floats become `null`, as JSON cannot express them.
    pub fn to_json(&self) -> Value {
        match self {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(b) => Value::Bool(*b),
            DynamicValue::Integer(i) => Value::Number((*i).into()),
            DynamicValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            DynamicValue::String(s) => Value::String(s.clone()),
            DynamicValue::Buffer(buffer) => buffer_to_json(buffer),
            DynamicValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            DynamicValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn buffer_to_json(buffer: &Buffer) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), Value::String("Buffer".into()));
    object.insert(
        "data".into(),
        Value::Array(buffer.bytes().iter().map(|b| Value::from(*b)).collect()),
    );
    Value::Object(object)
}
