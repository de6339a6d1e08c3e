//! # Event Dispatch
//!
//! Moves inbound typed objects from the connection's background context to the caller.
//!
//! ## How it works
//!
//! 1. **Capture (background context)**: the [`InboundSink`] packages every inbound
//!    [`TypedValue`] into an [`EventWorkItem`] and pushes it onto an **unbounded**
//!    channel. Pushing never waits, so a slow caller can never stall the transport's
//!    receive path.
//! 2. **Delivery (caller context)**: the single [`Dispatcher`] pops work items in arrival
//!    order and turns each one into a [`Notification`]:
//!    - error signals become `"error"` notifications,
//!    - dictionaries are converted with [`crate::codec`] and become `"event"` notifications,
//!    - anything else is dropped.
//!
//! Each work item is consumed by value when it is delivered, so it is released on every
//! path, including the ones that produce no notification.
use crate::codec::{self, DroppedNode};
use crate::value::{DynamicMap, DynamicValue, TransportError, TypedValue};
use futures_util::Stream;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Classification of a transport error signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    ConnectionInterrupted,
    ConnectionInvalid,
    Unknown,
}

impl ErrorClass {
    pub fn message(self) -> &'static str {
        match self {
            ErrorClass::ConnectionInterrupted => "connection interrupted",
            ErrorClass::ConnectionInvalid => "connection invalid",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl From<TransportError> for ErrorClass {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::ConnectionInterrupted => ErrorClass::ConnectionInterrupted,
            TransportError::ConnectionInvalid => ErrorClass::ConnectionInvalid,
            TransportError::TerminationImminent | TransportError::Other(_) => ErrorClass::Unknown,
        }
    }
}

/// A notification emitted by a connection to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// `"error"`: a connection lifecycle problem. The connection object stays usable.
    Error(ErrorClass),
    /// `"event"`: an inbound dictionary, converted to a host map.
    Event {
        payload: DynamicMap,
        /// Nodes of the inbound dictionary that could not be converted.
        dropped: Vec<DroppedNode>,
    },
}

impl Notification {
    /// The notification name, `"error"` or `"event"`.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Error(_) => "error",
            Notification::Event { .. } => "event",
        }
    }

    /// The notification payload as JSON. Errors render as `{"message": ...}`.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Notification::Error(class) => json!({ "message": class.message() }),
            Notification::Event { payload, .. } => DynamicValue::Map(payload.clone()).to_json(),
        }
    }
}

/// The caller-visible notification target.
pub trait EventEmitter {
    fn emit(&mut self, notification: Notification);
}

impl<F> EventEmitter for F
where
    F: FnMut(Notification),
{
    fn emit(&mut self, notification: Notification) {
        self(notification)
    }
}

/// An inbound typed object waiting to be delivered, tagged with the connection it
/// arrived on.
#[derive(Debug)]
pub struct EventWorkItem {
    event: TypedValue,
    connection: Arc<str>,
}

impl EventWorkItem {
    fn into_notification(self) -> Option<Notification> {
        match self.event {
            TypedValue::Error(error) => Some(Notification::Error(ErrorClass::from(error))),
            TypedValue::Dictionary(dictionary) => {
                let converted = codec::dictionary_to_map(&dictionary);
                Some(Notification::Event {
                    payload: converted.value,
                    dropped: converted.dropped,
                })
            }
            other => {
                tracing::debug!(
                    service = %self.connection,
                    type_name = other.type_name(),
                    "dropping inbound object that is neither an error nor a dictionary"
                );
                None
            }
        }
    }
}

/// Producer side of the event queue, handed to the background context.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: mpsc::UnboundedSender<EventWorkItem>,
    connection: Arc<str>,
}

impl InboundSink {
    /// Enqueues an inbound object for delivery. Never blocks.
    ///
    /// Objects arriving after the [`Dispatcher`] was dropped are discarded.
    pub fn deliver(&self, event: TypedValue) {
        let item = EventWorkItem {
            event,
            connection: self.connection.clone(),
        };

        if self.tx.send(item).is_err() {
            tracing::debug!(service = %self.connection, "dispatcher is gone, discarding event");
        }
    }
}

/// Consumer side of the event queue, driven from the caller's context.
///
/// The dispatcher ends once every [`InboundSink`] is gone (the connection was closed)
/// and the queued events have been delivered.
#[derive(Debug)]
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<EventWorkItem>,
}

/// Creates the event queue of a connection.
pub fn channel(connection: impl Into<Arc<str>>) -> (InboundSink, Dispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = InboundSink {
        tx,
        connection: connection.into(),
    };
    (sink, Dispatcher { rx })
}

impl Dispatcher {
    /// Waits for the next notification.
    ///
    /// Returns `None` once the connection is closed and the queue is drained.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        loop {
            let item = self.rx.recv().await?;
            if let Some(notification) = item.into_notification() {
                return Some(notification);
            }
        }
    }

    /// Turns the dispatcher into a stream of notifications.
    pub fn into_stream(self) -> impl Stream<Item = Notification> + Send {
        futures_util::stream::unfold(self, |mut dispatcher| async move {
            let notification = dispatcher.next_notification().await?;
            Some((notification, dispatcher))
        })
    }

    /// Delivers every notification to `emitter` until the connection is closed.
    pub async fn run<E: EventEmitter>(mut self, emitter: &mut E) {
        while let Some(notification) = self.next_notification().await {
            emitter.emit(notification);
        }
    }
}
