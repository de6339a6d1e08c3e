//! # Connection
//!
//! A [`Connection`] ties a service name to a [`Transport`], converts outbound host values
//! and feeds inbound typed objects to its [`Dispatcher`].
//!
//! The connection lifecycle uses a **Typestate Pattern**:
//!
//! 1. **[`Created`]**: holds the transport, nothing is open yet.
//! 2. **[`Active`]**: after [`Connection::setup`]. Owns the transport sender and the
//!    background context that receives inbound objects.
//! 3. **[`Closed`]**: after [`Connection::close`]. Nothing is owned anymore.
//!
//! `setup` consumes the created connection, so a connection can only be set up once and
//! nothing can be sent before it is.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xpc_bridge_core::connection::Connection;
//! use xpc_bridge_core::transport::Transport;
//! use xpc_bridge_core::value::{Buffer, DynamicValue};
//!
//! # async fn run(transport: impl Transport) {
//! let (connection, mut dispatcher) = Connection::new("com.example.service", transport).setup();
//!
//! let message: DynamicValue = [
//!     ("id", DynamicValue::from(Buffer::identifier(vec![0u8; 16]))),
//!     ("name", DynamicValue::from("svc")),
//! ]
//! .into_iter()
//! .collect();
//! connection.send(&message);
//!
//! while let Some(notification) = dispatcher.next_notification().await {
//!     println!("{}: {}", notification.name(), notification.payload());
//! }
//! # }
//! ```
mod background;
mod options;

pub use options::ConnectionOptions;

use crate::codec::{self, DroppedNode};
use crate::dispatch::{self, Dispatcher};
use crate::transport::{Endpoint, MessageSender, Transport};
use crate::value::{DynamicValue, TypedValue};
use background::BackgroundContext;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle state of a connection, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Active,
    Closed,
}

/// Implemented by the typestate markers of [`Connection`].
pub trait LifecycleState {
    const STATE: ConnectionState;
}

/// A connection to a named service.
///
/// The generic parameter `S` is the current lifecycle state.
#[derive(Debug)]
pub struct Connection<S> {
    service_name: Arc<str>,
    options: ConnectionOptions,
    state: S,
}

/// State: not set up yet.
#[derive(Debug)]
pub struct Created<T> {
    transport: T,
}

/// State: transport open, events flowing.
pub struct Active {
    sender: Box<dyn MessageSender + Send>,
    background: BackgroundContext,
}

impl Debug for Active {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Active")
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

/// State: closed, the transport and background context are released.
#[derive(Debug)]
pub struct Closed;

impl<T> LifecycleState for Created<T> {
    const STATE: ConnectionState = ConnectionState::Created;
}

impl LifecycleState for Active {
    const STATE: ConnectionState = ConnectionState::Active;
}

impl LifecycleState for Closed {
    const STATE: ConnectionState = ConnectionState::Closed;
}

/// What happened to a value passed to [`Connection::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The value was not a map; nothing was sent.
    Ignored,
    /// The converted dictionary was handed to the transport.
    Sent {
        /// Entries that were sent as `Null` placeholders.
        dropped: Vec<DroppedNode>,
    },
}

impl<S: LifecycleState> Connection<S> {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        S::STATE
    }
}

impl<T: Transport> Connection<Created<T>> {
    /// Creates a connection to `service_name`.
    ///
    /// The name is not validated here; an empty or unknown name is reported by the
    /// transport as a `"connection invalid"` error once the connection is set up.
    pub fn new(service_name: impl Into<String>, transport: T) -> Self {
        let service_name: String = service_name.into();
        Self {
            service_name: service_name.into(),
            options: ConnectionOptions::default(),
            state: Created { transport },
        }
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Opens the transport and starts delivering inbound objects.
    ///
    /// Returns the active connection and the [`Dispatcher`] that yields its
    /// notifications. Never fails synchronously: problems surface as `"error"`
    /// notifications.
    pub fn setup(self) -> (Connection<Active>, Dispatcher) {
        let Connection {
            service_name,
            options,
            state: Created { transport },
        } = self;

        let endpoint = Endpoint {
            service_name: service_name.to_string(),
            privileged: options.privileged,
        };
        let label = options
            .context_label
            .clone()
            .unwrap_or_else(|| service_name.to_string());

        let (sink, dispatcher) = dispatch::channel(service_name.clone());
        let (sender, inbound) = transport.open(&endpoint);
        let background = BackgroundContext::spawn(label, inbound, sink);

        tracing::debug!(
            service = %service_name,
            context = background.label(),
            privileged = endpoint.privileged,
            "connection set up"
        );

        let connection = Connection {
            service_name,
            options,
            state: Active {
                sender: Box::new(sender),
                background,
            },
        };

        (connection, dispatcher)
    }
}

impl Connection<Active> {
    /// Sends a host value to the service.
    ///
    /// Only maps are sent; any other value is ignored. Entries that cannot be
    /// represented are sent as `Null` and reported in the outcome.
    ///
    /// A top-level `List` or `Buffer` is ignored too, unlike hosts where arrays and
    /// buffers are objects and would go out as an index-keyed dictionary.
    pub fn send(&self, value: &DynamicValue) -> SendOutcome {
        let Some(map) = value.as_map() else {
            tracing::debug!(
                service = %self.service_name,
                kind = value.kind(),
                "ignoring send of a value that is not a map"
            );
            return SendOutcome::Ignored;
        };

        let converted = codec::map_to_dictionary(map);
        self.state
            .sender
            .send_message(TypedValue::Dictionary(converted.value));

        SendOutcome::Sent {
            dropped: converted.dropped,
        }
    }

    /// Releases the transport and stops the background context.
    ///
    /// Events the transport already handed over are still forwarded and delivered by the
    /// [`Dispatcher`], which then ends.
    pub fn close(self) -> Connection<Closed> {
        let Connection {
            service_name,
            options,
            state,
        } = self;
        drop(state);

        tracing::debug!(service = %service_name, "connection closed");

        Connection {
            service_name,
            options,
            state: Closed,
        }
    }
}
