use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::PlatformError;
use crate::sensing::foreground::{ForegroundDetector, ForegroundGuess};

use super::state::EngineCore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

/// Fixed-cadence poller. Runs until `cancel_token` fires; a failed or slow
/// probe only costs its own tick.
pub async fn enforcement_loop(
    core: Arc<Mutex<EngineCore>>,
    detector: Arc<ForegroundDetector>,
    tick_interval: Duration,
    query_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    let mut probe = ProbeSlot::default();
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log_info!("enforcement loop started ({}ms cadence)", tick_interval.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_tick(&core, &detector, &mut probe, query_timeout).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("enforcement loop shutting down");
                break;
            }
        }
    }
}

async fn run_tick(
    core: &Arc<Mutex<EngineCore>>,
    detector: &Arc<ForegroundDetector>,
    probe: &mut ProbeSlot,
    query_timeout: Duration,
) {
    let active = core.lock().await.session.active;
    let guess = if active {
        probe.run(detector, query_timeout).await
    } else {
        None
    };

    // Re-checked under the lock: the session may have stopped while probing.
    let mut guard = core.lock().await;
    guard.apply_guess(guess).await;
}

/// At most one foreground query in flight per caller.
///
/// A query that outlives its timeout keeps its worker thread; the slot holds
/// on to it and answers "no signal" until it has finished, so a hung platform
/// call occupies one blocking thread instead of one per tick.
#[derive(Default)]
pub struct ProbeSlot {
    pending: Option<JoinHandle<Option<ForegroundGuess>>>,
}

impl ProbeSlot {
    pub fn is_busy(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run the detector off the async workers, bounded by `query_timeout`.
    pub async fn run(
        &mut self,
        detector: &Arc<ForegroundDetector>,
        query_timeout: Duration,
    ) -> Option<ForegroundGuess> {
        if self.is_busy() {
            log_debug!("previous foreground probe still running; skipping");
            return None;
        }
        // A late result belongs to an earlier tick.
        self.pending = None;

        let detector = Arc::clone(detector);
        let mut probe = tokio::task::spawn_blocking(move || detector.detect());

        match tokio::time::timeout(query_timeout, &mut probe).await {
            Ok(Ok(guess)) => {
                log_debug!("foreground guess: {guess:?}");
                guess
            }
            Ok(Err(err)) => {
                log_error!("foreground probe worker failed: {err}");
                None
            }
            Err(_) => {
                let err = PlatformError::Timeout(query_timeout);
                log_warn!("foreground probe failed ({}): {err}; treating as no signal", err.kind());
                self.pending = Some(probe);
                None
            }
        }
    }
}
