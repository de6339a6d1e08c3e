//! # Transport Seam
//!
//! The duplex IPC channel itself (service lookup, connect, resume/suspend) lives outside
//! this crate. A [`Transport`] only has to turn an [`Endpoint`] into a sender for
//! outbound typed objects and a stream of inbound ones.
use crate::value::TypedValue;
use futures_util::Stream;

/// The service a connection is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Name of the service. May be empty, in which case the transport rejects the
    /// connection asynchronously.
    pub service_name: String,
    /// Whether to look the service up in the privileged (system) namespace.
    pub privileged: bool,
}

/// Opens connections to named services.
pub trait Transport {
    type Sender: MessageSender + Send + 'static;
    type Inbound: Stream<Item = TypedValue> + Send + Unpin + 'static;

    /// Opens and resumes a connection to `endpoint`.
    ///
    /// This must not fail synchronously: a connection that cannot be established
    /// reports it through an [`TypedValue::Error`] on the inbound stream.
    fn open(&self, endpoint: &Endpoint) -> (Self::Sender, Self::Inbound);
}

/// Outbound half of an open transport connection.
pub trait MessageSender {
    /// Sends a message one way. Must not block.
    fn send_message(&self, message: TypedValue);
}
