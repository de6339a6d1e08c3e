//! # XPC Bridge Core
//!
//! `xpc-bridge-core` bridges a dynamically-typed host value model and an out-of-process
//! IPC transport that speaks typed, self-describing objects (XPC-style).
//!
//! ## Key Components
//!
//! * **[`value`]:** The two value models, [`value::DynamicValue`] (host side) and
//!   [`value::TypedValue`] (transport side), plus JSON interop for the host side.
//! * **[`codec`]:** Best-effort recursive conversion between the two. A node that cannot
//!   be converted degrades to a `Null` placeholder and is reported, it never aborts the
//!   whole message.
//! * **[`connection`]:** A [`connection::Connection`] to a named service, with a
//!   `Created -> Active -> Closed` typestate lifecycle.
//! * **[`dispatch`]:** The ordered, non-blocking hand-off of inbound objects from the
//!   connection's background context to the caller, as `"error"` and `"event"`
//!   notifications.
//!
//! ## Transports
//!
//! The IPC channel itself is not part of this crate. Anything implementing
//! [`transport::Transport`] can be used; [`wire`] provides a protobuf encoding of typed
//! objects for transports that need to move them as bytes.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (dropped nodes, ignored sends, dropped inbound
//! objects) and runs each connection's background context inside an `xpc_connection`
//! span. Installing a subscriber is up to the application.
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod transport;
pub mod value;
pub mod wire;

// Re-exports
pub use bytes;
pub use uuid;
