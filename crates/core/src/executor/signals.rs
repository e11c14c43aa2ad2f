//! Pushed executor signals and their subscription handles.
//!
//! The executor pushes three kinds of signals. The orchestrator subscribes to
//! each kind separately when a session becomes active and keeps the returned
//! [`Subscription`] in a fixed slot, so teardown is "unsubscribe every slot".
//! Every forwarded signal is stamped with the epoch of the session that
//! subscribed, which lets the orchestrator drop signals meant for a session
//! that has already been torn down.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// A signal pushed by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExecutorSignal {
    /// Authoritative progress percentage (0-100).
    Progress(f64),
    /// The running task finished.
    Complete,
    /// The running task failed.
    Error(String),
}

/// The three subscribable signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Progress,
    Complete,
    Error,
}

impl ExecutorSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            ExecutorSignal::Progress(_) => SignalKind::Progress,
            ExecutorSignal::Complete => SignalKind::Complete,
            ExecutorSignal::Error(_) => SignalKind::Error,
        }
    }
}

/// What the orchestrator's signal loop acts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionSignal {
    Progress(f64),
    Complete,
    Error(String),
    /// The poller saw a completion timestamp on the active quest.
    CompletionDetected,
}

impl From<ExecutorSignal> for SessionSignal {
    fn from(signal: ExecutorSignal) -> Self {
        match signal {
            ExecutorSignal::Progress(pct) => SessionSignal::Progress(pct),
            ExecutorSignal::Complete => SessionSignal::Complete,
            ExecutorSignal::Error(msg) => SessionSignal::Error(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalEnvelope {
    pub epoch: u64,
    pub signal: SessionSignal,
}

/// Where a subscription delivers signals: the orchestrator's inbox, stamped
/// with the subscribing session's epoch.
#[derive(Debug, Clone)]
pub struct SignalSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<SignalEnvelope>,
}

impl SignalSink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<SignalEnvelope>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forward a signal. Returns false once the orchestrator is gone.
    pub fn deliver(&self, signal: ExecutorSignal) -> bool {
        self.tx
            .send(SignalEnvelope {
                epoch: self.epoch,
                signal: signal.into(),
            })
            .is_ok()
    }
}

/// Handle returned by [`SignalSource::subscribe`].
///
/// `unsubscribe` (or dropping the handle) stops delivery.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A source of executor signals.
pub trait SignalSource: Send + Sync {
    /// Deliver every future signal of `kind` to `sink` until unsubscribed.
    fn subscribe(&self, kind: SignalKind, sink: SignalSink) -> Subscription;
}

/// In-process fan-out of executor signals.
///
/// Whatever receives signals from the backend (the server's webhook, a test)
/// publishes here; subscriptions forward matching signals to their sink.
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<ExecutorSignal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal. Returns how many subscriptions saw it.
    pub fn publish(&self, signal: ExecutorSignal) -> usize {
        debug!(?signal, "Publishing executor signal");
        // No receivers just means no session is listening
        self.sender.send(signal).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SignalSource for SignalBus {
    fn subscribe(&self, kind: SignalKind, sink: SignalSink) -> Subscription {
        let mut rx = self.sender.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) if signal.kind() == kind => {
                        if !sink.deliver(signal) {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Signal subscription {:?} lagged by {} signals", kind, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(move || handle.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_signal_wire_format() {
        let json = serde_json::to_string(&ExecutorSignal::Progress(42.5)).unwrap();
        assert_eq!(json, r#"{"type":"progress","value":42.5}"#);

        let parsed: ExecutorSignal = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(parsed, ExecutorSignal::Complete);

        let parsed: ExecutorSignal =
            serde_json::from_str(r#"{"type":"error","value":"boom"}"#).unwrap();
        assert_eq!(parsed, ExecutorSignal::Error("boom".to_string()));
    }

    #[test]
    fn test_subscription_cancels_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let sub = Subscription::new(move || {
            assert!(!flag.swap(true, Ordering::SeqCst));
        });
        sub.unsubscribe();
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropping_subscription_cancels() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        drop(Subscription::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_bus_forwards_only_subscribed_kind() {
        let bus = SignalBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe(SignalKind::Complete, SignalSink::new(7, tx));

        bus.publish(ExecutorSignal::Progress(10.0));
        bus.publish(ExecutorSignal::Complete);

        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.epoch, 7);
        assert_eq!(envelope.signal, SessionSignal::Complete);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_sink_receives_nothing() {
        let bus = SignalBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe(SignalKind::Error, SignalSink::new(1, tx));
        sub.unsubscribe();
        tokio::task::yield_now().await;

        bus.publish(ExecutorSignal::Error("late".to_string()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
