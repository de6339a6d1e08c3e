//! # Loopback Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide an in-process [`Transport`]
//! with named services for integration testing `xpc-bridge-core`.
//! It is not intended for production use.
//!
//! Messages cross the loopback wire-encoded in both directions, the way they would
//! cross a process boundary.
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use xpc_bridge_core::transport::{Endpoint, MessageSender, Transport};
use xpc_bridge_core::value::{TransportError, TypedValue};
use xpc_bridge_core::wire::{self, WireError};

type Registry = HashMap<String, mpsc::UnboundedSender<PeerConnection>>;

/// An in-process transport. Clones share the same service registry.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    registry: Arc<Mutex<Registry>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>) -> ServiceEndpoint {
        let (tx, rx) = mpsc::unbounded_channel();

        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), tx);

        ServiceEndpoint { incoming: rx }
    }
}

impl Transport for LoopbackTransport {
    type Sender = LoopbackSender;
    type Inbound = BoxStream<'static, TypedValue>;

    fn open(&self, endpoint: &Endpoint) -> (Self::Sender, Self::Inbound) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let rejection = event_tx.clone();

        let peer = PeerConnection {
            requests: request_rx,
            events: event_tx,
            privileged: endpoint.privileged,
        };

        let accepted = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint.service_name)
            .is_some_and(|service| service.send(peer).is_ok());

        if !accepted {
            tracing::debug!(service = %endpoint.service_name, "no such service");
            push(
                &rejection,
                &TypedValue::Error(TransportError::ConnectionInvalid),
            );
        }
        drop(rejection);

        let sender = LoopbackSender {
            service: endpoint.service_name.clone(),
            requests: request_tx,
        };

        let inbound = UnboundedReceiverStream::new(event_rx)
            .filter_map(|bytes| async move {
                match wire::decode(&bytes) {
                    Ok(event) => Some(event),
                    Err(error) => {
                        tracing::warn!(%error, "dropping undecodable event");
                        None
                    }
                }
            })
            .boxed();

        (sender, inbound)
    }
}

/// Client side sender of a loopback connection.
#[derive(Debug)]
pub struct LoopbackSender {
    service: String,
    requests: mpsc::UnboundedSender<Bytes>,
}

impl MessageSender for LoopbackSender {
    fn send_message(&self, message: TypedValue) {
        let bytes = match wire::encode(&message) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(service = %self.service, %error, "message cannot be encoded, discarded");
                return;
            }
        };

        if self.requests.send(bytes).is_err() {
            tracing::debug!(service = %self.service, "service is gone, message discarded");
        }
    }
}

/// A registered service, accepting client connections.
#[derive(Debug)]
pub struct ServiceEndpoint {
    incoming: mpsc::UnboundedReceiver<PeerConnection>,
}

impl ServiceEndpoint {
    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> Option<PeerConnection> {
        self.incoming.recv().await
    }
}

/// Service side of one client connection.
#[derive(Debug)]
pub struct PeerConnection {
    requests: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<Bytes>,
    privileged: bool,
}

impl PeerConnection {
    /// Waits for the next message sent by the client.
    ///
    /// Returns `None` once the client closed its connection.
    pub async fn recv_message(&mut self) -> Option<Result<TypedValue, WireError>> {
        let bytes = self.requests.recv().await?;
        Some(wire::decode(&bytes))
    }

    /// Returns the next message if one is already waiting.
    pub fn try_recv_message(&mut self) -> Option<Result<TypedValue, WireError>> {
        let bytes = self.requests.try_recv().ok()?;
        Some(wire::decode(&bytes))
    }

    /// Pushes an event to the client.
    ///
    /// Returns `false` if the client is gone or the event nests too deep for the wire.
    pub fn push_event(&self, event: &TypedValue) -> bool {
        push(&self.events, event)
    }

    /// Signals a transient interruption to the client.
    pub fn interrupt(&self) -> bool {
        self.push_event(&TypedValue::Error(TransportError::ConnectionInterrupted))
    }

    /// Signals that the connection is dead and hangs up.
    pub fn invalidate(self) {
        self.push_event(&TypedValue::Error(TransportError::ConnectionInvalid));
    }

    /// Whether the client asked for the privileged namespace.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }
}

fn push(events: &mpsc::UnboundedSender<Bytes>, event: &TypedValue) -> bool {
    match wire::encode(event) {
        Ok(bytes) => events.send(bytes).is_ok(),
        Err(error) => {
            tracing::warn!(%error, "event cannot be encoded, discarded");
            false
        }
    }
}

/// Serves `endpoint` by echoing every dictionary a client sends back to it.
pub fn spawn_echo(mut endpoint: ServiceEndpoint) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut peer) = endpoint.accept().await {
            tokio::spawn(async move {
                while let Some(message) = peer.recv_message().await {
                    match message {
                        Ok(message @ TypedValue::Dictionary(_)) => {
                            peer.push_event(&message);
                        }
                        Ok(other) => {
                            tracing::debug!(type_name = other.type_name(), "not echoing");
                        }
                        Err(error) => tracing::warn!(%error, "undecodable message"),
                    }
                }
            });
        }
    })
}
