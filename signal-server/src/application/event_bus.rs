use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::BusEvent;
use crate::ports::EventBus;

/// A single subscriber's handler. Handlers must not block (§5); a handler
/// that panics is caught at the call site so one failing subscriber cannot
/// prevent delivery to the others.
pub type Handler = Arc<dyn Fn(BusEvent) + Send + Sync>;

/// In-process typed pub/sub (C1). `emit` fans a single event out to every
/// registered handler; it never fails, and per-subscriber exceptions are
/// isolated. Ordering across subscribers within one `emit` is not
/// guaranteed; ordering of successive `emit` calls from a single producer
/// task is preserved because `emit` is awaited before the caller proceeds.
#[derive(Default)]
pub struct InProcessEventBus {
    handlers: RwLock<Vec<Handler>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, handler: Handler) {
        self.handlers.write().await.push(handler);
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn emit(&self, event: BusEvent) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            let handler = handler.clone();
            let event = event.clone();
            // Isolate a panicking subscriber so it cannot block delivery to
            // the others; tracing captures the failure for operators.
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event))) {
                tracing::error!(?panic, "event bus subscriber panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emit_invokes_every_subscriber() {
        let bus = InProcessEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            bus.subscribe(Arc::new(move |_event| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
            .await;
        }
        bus.emit(BusEvent::SystemStatus { message: "ok".into() }).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn a_panicking_subscriber_does_not_block_the_others() {
        let bus = InProcessEventBus::new();
        let observed = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(|_event| panic!("boom"))).await;
        let observed_clone = observed.clone();
        bus.subscribe(Arc::new(move |_event| {
            observed_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        bus.emit(BusEvent::SystemStatus { message: "ok".into() }).await;
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }
}
