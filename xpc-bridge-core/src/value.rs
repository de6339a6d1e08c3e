//! # Value Model
//!
//! The two sides of the bridge:
//!
//! * **[`TypedValue`]**: the transport's self-describing wire object.
//! * **[`DynamicValue`]**: the host-side value, an explicit tagged union instead of a
//!   shape that has to be inspected at runtime.
//!
//! The conversions between them live in [`crate::codec`].
mod dynamic;
mod json;
mod typed;

pub use dynamic::*;
pub use typed::*;
