//! Per-canvas trace bus
//!
//! Single logical producer (every trial of the canvas), multiple bounded
//! consumers. Publishing never blocks a trial: a full subscriber channel
//! drops the event and bumps the `trace_dropped` counter, which is the
//! documented backpressure policy for observability consumers.

use parking_lot::RwLock;
use sdlsim_core::trace::{TraceEvent, Tracer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default per-subscriber channel capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 4096;

/// Fan-out bus for trace events
#[derive(Debug, Default)]
pub struct TraceBus {
    subscribers: RwLock<Vec<mpsc::Sender<TraceEvent>>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl TraceBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a bounded consumer. Slow consumers lose events rather than
    /// slowing trials down.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<TraceEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.write().push(tx);
        rx
    }

    /// Subscription as a [`Stream`](futures::Stream), for consumers that
    /// compose with stream combinators (live dashboards, collectors).
    pub fn subscribe_stream(
        &self,
        capacity: usize,
    ) -> tokio_stream::wrappers::ReceiverStream<TraceEvent> {
        tokio_stream::wrappers::ReceiverStream::new(self.subscribe(capacity))
    }

    pub fn publish(&self, event: TraceEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let mut closed = false;
        {
            let subscribers = self.subscribers.read();
            for tx in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed = true,
                }
            }
        }
        if closed {
            self.subscribers.write().retain(|tx| !tx.is_closed());
        }
    }

    /// Events dropped because a subscriber was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Bridges the engine's [`Tracer`] seam onto a [`TraceBus`]
#[derive(Debug, Clone)]
pub struct BusTracer {
    bus: Arc<TraceBus>,
}

impl BusTracer {
    pub fn new(bus: Arc<TraceBus>) -> Self {
        BusTracer { bus }
    }
}

impl Tracer for BusTracer {
    fn emit(&self, event: TraceEvent) {
        self.bus.publish(event);
    }
}
