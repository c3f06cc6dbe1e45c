use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::models::{AllowList, ApplicationId, BlockSet, SessionState};
use crate::sensing::accessibility::{extract_application, AccessibilityEvent};
use crate::sensing::foreground::{ForegroundGuess, GuessSource};

use super::cooldown::{CooldownTicket, CooldownTimer};
use super::overlay::{OverlayState, OverlayStateMachine, Transition};
use super::policy::{decide, Decision};

/// Notifications for the host's control plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted { session_id: String, blocked_apps: usize },
    SessionStopped,
    OverlayShown { app: ApplicationId },
    OverlayHidden,
    CooldownStarted { until: DateTime<Utc> },
    CooldownEnded,
    /// The user chose to end the focus session from the blocking surface.
    StopSessionRequested,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub active: bool,
    pub session_id: Option<String>,
    pub blocked_apps: Vec<ApplicationId>,
    pub suspended: bool,
    pub suspended_until: Option<DateTime<Utc>>,
    pub remaining_cooldown_ms: i64,
    pub overlay: OverlayState,
    pub last_guess: Option<ForegroundGuess>,
}

/// Everything the poller and the event path share. Lives behind one
/// `tokio::sync::Mutex`; holding that lock is the only way to read or change
/// session or overlay state.
pub struct EngineCore {
    pub(crate) session: SessionState,
    pub(crate) overlay: OverlayStateMachine,
    pub(crate) last_guess: Option<ForegroundGuess>,
    /// Bumped on every start and stop.
    pub(crate) generation: u64,
    cooldown: CooldownTimer,
    allow_list: AllowList,
    own_package: Option<ApplicationId>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineCore {
    pub fn new(
        overlay: OverlayStateMachine,
        allow_list: AllowList,
        own_package: Option<ApplicationId>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            session: SessionState::new(),
            overlay,
            last_guess: None,
            generation: 0,
            cooldown: CooldownTimer::default(),
            allow_list,
            own_package,
            events,
        }
    }

    /// A restart while Shown keeps the overlay only if its target is still
    /// blocked under the new set.
    pub async fn begin_session(
        &mut self,
        session_id: String,
        block_set: BlockSet,
        now: DateTime<Utc>,
    ) {
        self.generation = self.generation.wrapping_add(1);
        self.cooldown.cancel();
        let blocked_apps = block_set.len();
        self.session.begin(session_id.clone(), block_set, now);
        self.emit(EngineEvent::SessionStarted {
            session_id,
            blocked_apps,
        });

        let still_blocked = self
            .overlay
            .target()
            .map(|target| decide(Some(target), &self.session, &self.allow_list).is_block());
        if still_blocked == Some(false) {
            self.last_guess = None;
            self.reconcile(Decision::Allow).await;
        }
    }

    pub async fn end_session(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cooldown.cancel();
        let was_active = self.session.active;
        self.session.stop();
        self.last_guess = None;
        if self.overlay.force_hidden().await == Transition::Removed {
            self.emit(EngineEvent::OverlayHidden);
        }
        if was_active {
            self.emit(EngineEvent::SessionStopped);
        }
    }

    /// One poll result. An inactive session only makes sure the overlay is
    /// gone.
    pub async fn apply_guess(&mut self, guess: Option<ForegroundGuess>) -> Transition {
        if !self.session.active {
            self.last_guess = None;
            return self.reconcile(Decision::Allow).await;
        }
        let decision = decide(
            guess.as_ref().map(|g| &g.application_id),
            &self.session,
            &self.allow_list,
        );
        self.last_guess = guess;
        self.reconcile(decision).await
    }

    /// One accessibility notification. Events can only present the overlay;
    /// anything that does not resolve to a block leaves the state untouched,
    /// as do events from the host app itself.
    pub async fn apply_event(&mut self, event: &AccessibilityEvent) -> Transition {
        if !self.session.active {
            return Transition::Unchanged;
        }
        let Some(id) = extract_application(event, &self.session.block_set) else {
            return Transition::Unchanged;
        };
        if self.own_package.as_ref() == Some(&id) {
            debug!("Ignoring {:?} from own package", event.kind);
            return Transition::Unchanged;
        }
        let decision = decide(Some(&id), &self.session, &self.allow_list);
        if !decision.is_block() {
            return Transition::Unchanged;
        }
        self.last_guess = Some(ForegroundGuess::new(id, GuessSource::AccessibilityEvent));
        self.reconcile(decision).await
    }

    /// Run the escape transition and arm the cooldown. The caller spawns the
    /// expiry task with the returned ticket.
    pub async fn escape(
        &mut self,
        cooldown: Duration,
        now: DateTime<Utc>,
        parent: &CancellationToken,
    ) -> Option<(CooldownTicket, CancellationToken)> {
        let until = self.overlay.escape(&mut self.session, cooldown, now).await?;
        info!("User escaped blocked app; enforcement suspended until {until}");
        self.emit(EngineEvent::OverlayHidden);
        self.emit(EngineEvent::CooldownStarted { until });
        Some(self.cooldown.arm(self.generation, parent))
    }

    /// Expiry of an armed cooldown. Stale tickets are ignored.
    pub fn end_cooldown(&mut self, ticket: CooldownTicket) {
        if ticket.generation != self.generation || !self.cooldown.take_if_current(ticket) {
            debug!("Discarding stale cooldown {ticket:?} (generation {})", self.generation);
            return;
        }
        self.session.resume();
        info!("Cooldown ended; enforcement resumed");
        self.emit(EngineEvent::CooldownEnded);
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            active: self.session.active,
            session_id: self.session.session_id.clone(),
            blocked_apps: self.session.block_set.ids().cloned().collect(),
            suspended: self.session.suspended,
            suspended_until: self.session.suspended_until,
            remaining_cooldown_ms: self.session.remaining_suspension_ms(now),
            overlay: self.overlay.state(),
            last_guess: self.last_guess.clone(),
        }
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    async fn reconcile(&mut self, decision: Decision) -> Transition {
        let transition = self.overlay.reconcile(&decision).await;
        match &transition {
            Transition::Presented(app) => self.emit(EngineEvent::OverlayShown { app: app.clone() }),
            Transition::Removed => self.emit(EngineEvent::OverlayHidden),
            Transition::Unchanged => {}
        }
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::display::DisplayHandle;
    use crate::error::PlatformError;
    use crate::platform::OverlaySurface;
    use crate::sensing::accessibility::{AccessibilityEventKind, UiNode};

    struct Silent;

    impl OverlaySurface for Silent {
        fn show(&mut self, _blocked: &ApplicationId) -> Result<(), PlatformError> {
            Ok(())
        }
        fn hide(&mut self) -> Result<(), PlatformError> {
            Ok(())
        }
        fn go_home(&mut self) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn core() -> (EngineCore, broadcast::Receiver<EngineEvent>) {
        let (display, _task) = DisplayHandle::spawn(Box::new(Silent));
        let (tx, rx) = broadcast::channel(32);
        let core = EngineCore::new(
            OverlayStateMachine::new(display),
            AllowList::default(),
            Some(ApplicationId::from("com.example.focuslock")),
            tx,
        );
        (core, rx)
    }

    fn guess(id: &str) -> Option<ForegroundGuess> {
        Some(ForegroundGuess::new(ApplicationId::from(id), GuessSource::UsageRecency))
    }

    /// Shown implies an active, unsuspended session whose last guess is
    /// blocked and not a launcher.
    fn assert_invariant(core: &EngineCore) {
        if core.overlay.state() == OverlayState::Shown {
            assert!(core.session.active);
            assert!(!core.session.suspended);
            let last = &core.last_guess.as_ref().unwrap().application_id;
            assert!(core.session.block_set.contains(last));
            assert!(!core.allow_list.contains(last));
        }
    }

    #[tokio::test]
    async fn invariant_holds_across_mixed_inputs() {
        let (mut core, _rx) = core();
        let root = CancellationToken::new();
        core.begin_session(
            "s".into(),
            ["com.game", "com.android.launcher3"].into_iter().collect(),
            Utc::now(),
        )
        .await;

        let inputs = [
            guess("com.game"),
            None,
            guess("com.android.launcher3"),
            guess("com.game"),
            guess("com.notes"),
            guess("com.game"),
        ];
        for input in inputs {
            core.apply_guess(input).await;
            assert_invariant(&core);
        }
        core.escape(Duration::from_secs(3), Utc::now(), &root).await;
        assert_invariant(&core);
        core.apply_guess(guess("com.game")).await;
        assert_invariant(&core);
        assert_eq!(core.overlay.state(), OverlayState::Hidden);
    }

    #[tokio::test]
    async fn no_signal_hides_a_shown_overlay() {
        let (mut core, _rx) = core();
        core.begin_session("s".into(), ["com.game"].into_iter().collect(), Utc::now())
            .await;
        core.apply_guess(guess("com.game")).await;
        assert_eq!(core.overlay.state(), OverlayState::Shown);
        core.apply_guess(None).await;
        assert_eq!(core.overlay.state(), OverlayState::Hidden);
    }

    #[tokio::test]
    async fn stale_cooldown_after_restart_is_ignored() {
        let (mut core, _rx) = core();
        let root = CancellationToken::new();
        core.begin_session("s1".into(), ["com.game"].into_iter().collect(), Utc::now())
            .await;
        core.apply_guess(guess("com.game")).await;
        let (ticket, _token) = core
            .escape(Duration::from_secs(3), Utc::now(), &root)
            .await
            .unwrap();

        core.end_session().await;
        core.begin_session("s2".into(), ["com.game"].into_iter().collect(), Utc::now())
            .await;
        core.apply_guess(guess("com.game")).await;
        core.escape(Duration::from_secs(3), Utc::now(), &root).await;
        assert!(core.session.suspended);

        core.end_cooldown(ticket);
        assert!(core.session.suspended, "old timer must not end the new suspension");
    }

    #[tokio::test]
    async fn events_from_own_package_are_ignored() {
        let (mut core, _rx) = core();
        core.begin_session(
            "s".into(),
            ["com.example.focuslock"].into_iter().collect(),
            Utc::now(),
        )
        .await;
        let event = AccessibilityEvent::window_state_changed("com.example.focuslock");
        assert_eq!(core.apply_event(&event).await, Transition::Unchanged);
        assert_eq!(core.overlay.state(), OverlayState::Hidden);
    }

    #[tokio::test]
    async fn click_on_blocked_icon_presents_overlay() {
        let (mut core, mut rx) = core();
        let mut block = BlockSet::new();
        block.insert_labeled(ApplicationId::from("com.instagram.android"), "Instagram");
        core.begin_session("s".into(), block, Utc::now()).await;
        let _ = rx.try_recv();

        let event = AccessibilityEvent {
            kind: AccessibilityEventKind::ViewClicked,
            package_name: Some(ApplicationId::from("com.android.launcher3")),
            source_chain: vec![UiNode {
                package_name: Some(ApplicationId::from("com.android.launcher3")),
                text: Some("Instagram".into()),
                content_description: None,
                clickable: true,
            }],
        };
        core.apply_event(&event).await;

        assert_eq!(core.overlay.state(), OverlayState::Shown);
        assert_eq!(
            core.last_guess.as_ref().map(|g| g.source),
            Some(GuessSource::AccessibilityEvent)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::OverlayShown {
                app: ApplicationId::from("com.instagram.android")
            }
        );
    }

    #[tokio::test]
    async fn restart_without_current_target_removes_overlay() {
        let (mut core, _rx) = core();
        core.begin_session("s1".into(), ["com.game"].into_iter().collect(), Utc::now())
            .await;
        core.apply_guess(guess("com.game")).await;
        assert_eq!(core.overlay.state(), OverlayState::Shown);

        core.begin_session("s2".into(), ["com.video"].into_iter().collect(), Utc::now())
            .await;
        assert_eq!(core.overlay.state(), OverlayState::Hidden);
        assert_invariant(&core);
    }

    #[tokio::test]
    async fn restart_keeping_current_target_keeps_overlay() {
        let (mut core, _rx) = core();
        core.begin_session("s1".into(), ["com.game"].into_iter().collect(), Utc::now())
            .await;
        core.apply_guess(guess("com.game")).await;

        core.begin_session(
            "s2".into(),
            ["com.game", "com.video"].into_iter().collect(),
            Utc::now(),
        )
        .await;
        assert_eq!(core.overlay.state(), OverlayState::Shown);
    }

    #[tokio::test]
    async fn events_never_remove_a_shown_overlay() {
        let (mut core, _rx) = core();
        core.begin_session(
            "s".into(),
            ["com.game", "com.android.launcher3"].into_iter().collect(),
            Utc::now(),
        )
        .await;
        core.apply_guess(guess("com.game")).await;

        let events = [
            AccessibilityEvent::window_state_changed("com.android.systemui"),
            AccessibilityEvent::window_state_changed("com.android.launcher3"),
            AccessibilityEvent::window_state_changed("com.example.focuslock"),
        ];
        for event in &events {
            assert_eq!(core.apply_event(event).await, Transition::Unchanged);
        }
        assert_eq!(core.overlay.state(), OverlayState::Shown);
        assert_invariant(&core);
    }

    #[tokio::test]
    async fn inactive_session_ignores_events() {
        let (mut core, _rx) = core();
        let event = AccessibilityEvent::window_state_changed("com.game");
        assert_eq!(core.apply_event(&event).await, Transition::Unchanged);
    }
}
