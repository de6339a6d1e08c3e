//! The background context serving a connection's inbound traffic.
use crate::dispatch::InboundSink;
use crate::value::{TransportError, TypedValue};
use futures_util::{FutureExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tracing::Instrument;

/// A task, owned by one connection, that forwards inbound objects into its event queue.
///
/// Dropping the context shuts the task down: objects the transport has already handed
/// over are still forwarded, then the task ends and releases the queue.
#[derive(Debug)]
pub(crate) struct BackgroundContext {
    label: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl BackgroundContext {
    /// Spawns the context on the current tokio runtime.
    ///
    /// Without a runtime the context cannot exist; this is reported the same way the
    /// transport reports a dead connection, as a `ConnectionInvalid` event.
    pub(crate) fn spawn<I>(label: String, inbound: I, sink: InboundSink) -> Self
    where
        I: Stream<Item = TypedValue> + Send + Unpin + 'static,
    {
        let span = tracing::info_span!("xpc_connection", context = %label);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                runtime.spawn(forward(inbound, sink, shutdown_rx).instrument(span));
                Self {
                    label,
                    shutdown: Some(shutdown_tx),
                }
            }
            Err(error) => {
                tracing::error!(context = %label, %error, "no runtime available for the background context");
                sink.deliver(TypedValue::Error(TransportError::ConnectionInvalid));
                Self {
                    label,
                    shutdown: None,
                }
            }
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for BackgroundContext {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // Err means the task already ended on its own.
            shutdown.send(()).ok();
        }
    }
}

// Only packages and enqueues; never waits on the caller.
async fn forward<I>(mut inbound: I, sink: InboundSink, mut shutdown: oneshot::Receiver<()>)
where
    I: Stream<Item = TypedValue> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            event = inbound.next() => match event {
                Some(event) => sink.deliver(event),
                None => {
                    tracing::debug!("inbound stream ended");
                    return;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    // Everything the transport already accepted is delivered exactly once.
    let mut drained = 0usize;
    while let Some(Some(event)) = inbound.next().now_or_never() {
        sink.deliver(event);
        drained += 1;
    }

    tracing::debug!(drained, "background context shut down");
}
