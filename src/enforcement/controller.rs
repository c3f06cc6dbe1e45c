use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use log::{error, info};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::{
    error::ConfigError,
    models::{AllowList, ApplicationId, BlockSet},
    platform::PlatformBindings,
    sensing::{EventSink, EventSubscription, ForegroundDetector},
    settings::EngineSettings,
};

use super::{
    cooldown::spawn_expiry,
    display::DisplayHandle,
    loop_worker::{enforcement_loop, ProbeSlot},
    overlay::OverlayStateMachine,
    state::{EngineCore, EngineEvent, EngineSnapshot},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// The enforcement engine and its control interface.
///
/// Cheap to clone; every clone drives the same session. Must be created inside
/// a tokio runtime. When the last clone is dropped, the loop, the event path and
/// any pending cooldown are cancelled and a presented overlay is removed.
#[derive(Clone)]
pub struct FocusEngine {
    core: Arc<Mutex<EngineCore>>,
    detector: Arc<ForegroundDetector>,
    on_demand_probe: Arc<Mutex<ProbeSlot>>,
    settings: Arc<EngineSettings>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    subscription: Arc<Mutex<EventSubscription>>,
    event_sink: EventSink,
    events: broadcast::Sender<EngineEvent>,
    shutdown_token: CancellationToken,
    _teardown: Arc<DropGuard>,
}

impl FocusEngine {
    pub fn new(platform: PlatformBindings, settings: EngineSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let PlatformBindings {
            usage_stats,
            task_stack,
            surface,
        } = platform;

        let (display, _display_task) = DisplayHandle::spawn(surface);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let allow_list = AllowList::with_extras(settings.extra_launchers.iter().cloned());
        let own_package = settings.own_package.clone().map(ApplicationId::from);

        let core = EngineCore::new(
            OverlayStateMachine::new(display),
            allow_list,
            own_package,
            events.clone(),
        );
        let detector = ForegroundDetector::new(usage_stats, task_stack, settings.usage_lookback());
        let (subscription, event_sink) = EventSubscription::new(settings.event_queue_capacity);
        let shutdown_token = CancellationToken::new();

        Ok(Self {
            core: Arc::new(Mutex::new(core)),
            detector: Arc::new(detector),
            on_demand_probe: Arc::new(Mutex::new(ProbeSlot::default())),
            settings: Arc::new(settings),
            ticker: Arc::new(Mutex::new(None)),
            subscription: Arc::new(Mutex::new(subscription)),
            event_sink,
            events,
            _teardown: Arc::new(shutdown_token.clone().drop_guard()),
            shutdown_token,
        })
    }

    /// Install `block_set`, activate, and make sure the loop and the event path
    /// are running. Calling it again replaces the block set and starts a new
    /// session.
    pub async fn start(&self, block_set: BlockSet) -> EngineSnapshot {
        let session_id = Uuid::new_v4().to_string();
        let blocked = block_set.len();

        {
            let mut core = self.core.lock().await;
            core.begin_session(session_id.clone(), block_set, Utc::now())
                .await;
        }

        self.spawn_ticker().await;
        self.subscription
            .lock()
            .await
            .start(Arc::clone(&self.core), &self.shutdown_token);

        info!("Focus session {session_id} started, blocking {blocked} apps");
        self.snapshot().await
    }

    /// Deactivate, clear the block set, cancel any cooldown, remove the
    /// overlay, and stop the loop and the event path.
    pub async fn stop(&self) -> EngineSnapshot {
        let session_id = {
            let mut core = self.core.lock().await;
            let session_id = core.session.session_id.clone();
            core.end_session().await;
            session_id
        };

        self.cancel_ticker().await;
        if let Err(e) = self.subscription.lock().await.stop().await {
            error!("Failed to stop event path: {e:#}");
        }

        if let Some(session_id) = session_id {
            info!("Focus session {session_id} stopped");
        }
        self.snapshot().await
    }

    /// On-demand foreground query, independent of the running loop.
    pub async fn query_current_foreground(&self) -> Option<ApplicationId> {
        self.on_demand_probe
            .lock()
            .await
            .run(&self.detector, self.settings.query_timeout())
            .await
            .map(|guess| guess.application_id)
    }

    pub async fn is_active(&self) -> bool {
        self.core.lock().await.session.active
    }

    pub async fn current_block_set(&self) -> BTreeSet<ApplicationId> {
        self.core.lock().await.session.block_set.to_id_set()
    }

    /// The "go back" affordance on the blocking surface. Returns whether an
    /// escape actually happened.
    pub async fn go_back(&self) -> bool {
        let cooldown = self.settings.cooldown();
        let armed = {
            let mut core = self.core.lock().await;
            core.escape(cooldown, Utc::now(), &self.shutdown_token).await
        };

        match armed {
            Some((ticket, token)) => {
                spawn_expiry(Arc::clone(&self.core), ticket, token, cooldown);
                true
            }
            None => false,
        }
    }

    /// The "stop session" affordance on the blocking surface. Notifies the
    /// control plane and ends the session locally.
    pub async fn request_stop_session(&self) -> EngineSnapshot {
        info!("User requested to stop the focus session from the overlay");
        let _ = self.events.send(EngineEvent::StopSessionRequested);
        self.stop().await
    }

    /// Sink for the host's accessibility callback.
    pub fn event_sink(&self) -> EventSink {
        self.event_sink.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.core.lock().await.snapshot(Utc::now())
    }

    /// Full teardown for the hosting service's destroy path.
    pub async fn shutdown(self) {
        self.stop().await;
        self.shutdown_token.cancel();
        info!("Focus engine shut down");
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.is_some() {
            return;
        }

        let cancel_token = self.shutdown_token.child_token();
        let handle = tokio::spawn(enforcement_loop(
            Arc::clone(&self.core),
            Arc::clone(&self.detector),
            self.settings.tick_interval(),
            self.settings.query_timeout(),
            cancel_token.clone(),
        ));

        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel_token.cancel();
            if let Err(e) = ticker.handle.await {
                error!("Enforcement loop failed to join: {e}");
            }
        }
    }
}
