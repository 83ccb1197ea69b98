//! Probe session events and the caller-facing subscription.
//!
//! A session pushes events into an unbounded channel through an
//! [`EventSink`]. The sink hands out its sender at most once for the terminal
//! pair (optional payload, then `End`), after which every emission is a
//! no-op. That makes the first terminal transition win and any later one
//! vanish.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use lnprobe_core::{ProbeState, Route, RoutingFailure};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ProbeError;

/// Something a probe session reports to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// `route` is a candidate from the latest route search, in ranked order.
    /// The first candidate of each search is the one attempted.
    Probing { route: Route },
    /// A hop refused the probe; its edge is now ignored.
    RoutingFailure(RoutingFailure),
    /// `route` reaches the destination. Terminal payload.
    ProbeSuccess { route: Route },
    /// The session failed or timed out. Terminal payload, unless errors are
    /// suppressed.
    Error(ProbeError),
    /// Always the last event of a session that was not cancelled.
    End { state: ProbeState, attempts: u32 },
}

impl ProbeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Probing { .. } => "probing",
            Self::RoutingFailure(_) => "routing_failure",
            Self::ProbeSuccess { .. } => "probe_success",
            Self::Error(_) => "error",
            Self::End { .. } => "end",
        }
    }
}

/// Write side of a session's event channel.
#[derive(Clone)]
pub(crate) struct EventSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    sender: Mutex<Option<mpsc::UnboundedSender<ProbeEvent>>>,
    suppress_errors: bool,
}

impl EventSink {
    pub(crate) fn channel(suppress_errors: bool) -> (Self, mpsc::UnboundedReceiver<ProbeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            inner: Arc::new(SinkInner {
                sender: Mutex::new(Some(tx)),
                suppress_errors,
            }),
        };
        (sink, rx)
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<ProbeEvent>>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a progress event. Returns `false` once the sink is closed.
    pub(crate) fn emit(&self, event: ProbeEvent) -> bool {
        match self.sender().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Emit the terminal payload and `End`, then close.
    ///
    /// Returns `false` if the sink was already closed, in which case nothing
    /// is emitted. An `Error` payload is dropped when errors are suppressed.
    pub(crate) fn finish(&self, payload: Option<ProbeEvent>, state: ProbeState, attempts: u32) -> bool {
        let Some(tx) = self.sender().take() else {
            return false;
        };

        if let Some(payload) = payload {
            let suppressed =
                self.inner.suppress_errors && matches!(payload, ProbeEvent::Error(_));
            if !suppressed {
                let _ = tx.send(payload);
            }
        }
        let _ = tx.send(ProbeEvent::End { state, attempts });
        true
    }

    /// Close without emitting. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        self.sender().take().is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender().is_none()
    }
}

/// A running probe session, consumed as a [`Stream`] of [`ProbeEvent`]s.
///
/// The stream ends after `End`. Dropping the subscription unsubscribes.
pub struct ProbeSubscription {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<ProbeEvent>,
    sink: EventSink,
    cancel: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl ProbeSubscription {
    pub(crate) fn new(
        id: Uuid,
        receiver: mpsc::UnboundedReceiver<ProbeEvent>,
        sink: EventSink,
        cancel: Arc<Notify>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            receiver,
            sink,
            cancel,
            task: Some(task),
            cancelled: false,
        }
    }

    /// Session id, also recorded on the session's tracing span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop the session.
    ///
    /// Emission stops immediately and the stream ends, even if events were
    /// still buffered. The session task drops its timers and any outstanding
    /// node call the next time it runs.
    pub fn unsubscribe(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if self.sink.close() {
            tracing::info!(session_id = %self.id, "probe unsubscribed");
        }
        self.cancel.notify_one();
        self.receiver.close();
    }

    /// Wait for the session task to exit.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(session_id = %self.id, error = %e, "probe task did not exit cleanly");
            }
        }
    }
}

impl Stream for ProbeSubscription {
    type Item = ProbeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ProbeSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
