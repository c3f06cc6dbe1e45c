use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::enforcement::state::EngineCore;

use super::accessibility::AccessibilityEvent;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Handed to the host's accessibility callback. Never blocks: while the engine
/// is not subscribed, or when the queue is full, events are dropped.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AccessibilityEvent>,
    subscribed: Arc<AtomicBool>,
}

impl EventSink {
    /// Returns whether the event was queued.
    pub fn deliver(&self, event: AccessibilityEvent) -> bool {
        if !self.subscribed.load(Ordering::SeqCst) {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                log_debug!("Dropping accessibility event: {err}");
                false
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

/// Subscribe/unsubscribe lifecycle of the event-driven detection path.
pub struct EventSubscription {
    rx: Arc<Mutex<mpsc::Receiver<AccessibilityEvent>>>,
    subscribed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl EventSubscription {
    pub fn new(capacity: usize) -> (Self, EventSink) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscribed = Arc::new(AtomicBool::new(false));
        let sink = EventSink {
            tx,
            subscribed: Arc::clone(&subscribed),
        };
        let subscription = Self {
            rx: Arc::new(Mutex::new(rx)),
            subscribed,
            handle: None,
            cancel_token: None,
        };
        (subscription, sink)
    }

    /// Idempotent: a running subscription is left alone.
    pub fn start(&mut self, core: Arc<Mutex<EngineCore>>, parent: &CancellationToken) {
        if self.handle.is_some() {
            return;
        }

        // Anything queued before this subscription describes an old screen.
        if let Ok(mut rx) = self.rx.try_lock() {
            let mut stale = 0usize;
            while rx.try_recv().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                log_debug!("Discarded {stale} stale accessibility events");
            }
        }

        let cancel_token = parent.child_token();
        let handle = tokio::spawn(event_loop(
            Arc::clone(&self.rx),
            core,
            cancel_token.clone(),
        ));

        self.subscribed.store(true, Ordering::SeqCst);
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("Accessibility event path subscribed");
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.subscribed.store(false, Ordering::SeqCst);

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("event path task failed to join")?;
            log_info!("Accessibility event path unsubscribed");
        }
        Ok(())
    }
}

async fn event_loop(
    rx: Arc<Mutex<mpsc::Receiver<AccessibilityEvent>>>,
    core: Arc<Mutex<EngineCore>>,
    cancel_token: CancellationToken,
) {
    let mut rx = rx.lock().await;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                let mut guard = core.lock().await;
                guard.apply_event(&event).await;
            }
        }
    }
}
