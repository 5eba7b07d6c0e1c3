//! A requester that records everything a pin pushes at it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use plexus_api::{PinEvent, Requester, TxReceiver};
use plexus_task::Context;
use plexus_tx::TxMsg;
use plexus_types::Result;
use tokio::sync::Notify;

/// Collects pushed transactions and lifecycle events for assertions.
#[derive(Default)]
pub struct ScriptedRequester {
    pushed: Mutex<Vec<Arc<TxMsg>>>,
    events: Mutex<Vec<PinEvent>>,
    notify: Notify,
}

impl ScriptedRequester {
    /// A fresh recorder.
    pub fn new() -> Arc<ScriptedRequester> {
        Arc::new(ScriptedRequester::default())
    }

    /// Everything pushed so far.
    pub fn pushed(&self) -> Vec<Arc<TxMsg>> {
        self.pushed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every event received so far.
    pub fn events(&self) -> Vec<PinEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Waits until at least `count` transactions have been pushed.
    pub async fn wait_for_pushed(&self, count: usize) -> Vec<Arc<TxMsg>> {
        loop {
            let notified = self.notify.notified();
            let pushed = self.pushed();
            if pushed.len() >= count {
                return pushed;
            }
            notified.await;
        }
    }

    /// Waits until at least `count` events have arrived.
    pub async fn wait_for_events(&self, count: usize) -> Vec<PinEvent> {
        loop {
            let notified = self.notify.notified();
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TxReceiver for ScriptedRequester {
    async fn push_tx(&self, tx: Arc<TxMsg>, _ctx: &Context) -> Result<()> {
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        self.notify.notify_waiters();
        Ok(())
    }
}

impl Requester for ScriptedRequester {
    fn recv_event(&self, event: PinEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        self.notify.notify_waiters();
    }
}
