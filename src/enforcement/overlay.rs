use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::models::{ApplicationId, SessionState};

use super::display::DisplayHandle;
use super::policy::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayState {
    Hidden,
    Shown,
}

impl Default for OverlayState {
    fn default() -> Self {
        OverlayState::Hidden
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Presented(ApplicationId),
    Removed,
}

/// Hidden/Shown tracking for the blocking surface.
///
/// All surface side effects go through [`OverlayStateMachine::reconcile`],
/// [`OverlayStateMachine::escape`] and [`OverlayStateMachine::force_hidden`].
/// When the surface rejects a request the state stays at the last successful
/// transition and the next reconcile tries again.
pub struct OverlayStateMachine {
    state: OverlayState,
    target: Option<ApplicationId>,
    display: DisplayHandle,
}

impl OverlayStateMachine {
    pub fn new(display: DisplayHandle) -> Self {
        Self {
            state: OverlayState::Hidden,
            target: None,
            display,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn target(&self) -> Option<&ApplicationId> {
        self.target.as_ref()
    }

    pub async fn reconcile(&mut self, decision: &Decision) -> Transition {
        match (self.state, decision) {
            (OverlayState::Hidden, Decision::Block(target)) => {
                match self.display.show(target).await {
                    Ok(()) => {
                        info!("Overlay shown over {target}");
                        self.state = OverlayState::Shown;
                        self.target = Some(target.clone());
                        Transition::Presented(target.clone())
                    }
                    Err(err) => {
                        warn!("Could not present overlay over {target} ({}): {err}", err.kind());
                        Transition::Unchanged
                    }
                }
            }
            (OverlayState::Shown, Decision::Allow) => self.remove().await,
            (OverlayState::Shown, Decision::Block(_)) | (OverlayState::Hidden, Decision::Allow) => {
                Transition::Unchanged
            }
        }
    }

    /// The user's "go back" action: remove the surface, suspend enforcement for
    /// `cooldown`, and send the device home. Returns the end of the suspension
    /// window, or `None` when there was nothing to escape from or the surface
    /// could not be removed.
    pub async fn escape(
        &mut self,
        session: &mut SessionState,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if self.state != OverlayState::Shown {
            return None;
        }
        if self.remove().await != Transition::Removed {
            return None;
        }

        let until = now
            + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::seconds(3));
        session.suspend_until(until);

        if let Err(err) = self.display.go_home().await {
            warn!("Could not navigate home after escape ({}): {err}", err.kind());
        }
        Some(until)
    }

    /// Session teardown. The state is Hidden afterwards even if the surface
    /// refused; the display actor keeps retrying removal on later requests and
    /// on shutdown.
    pub async fn force_hidden(&mut self) -> Transition {
        if self.state == OverlayState::Hidden {
            return Transition::Unchanged;
        }
        if let Err(err) = self.display.hide().await {
            warn!("Overlay removal failed during stop ({}): {err}", err.kind());
        }
        info!("Overlay forced hidden");
        self.state = OverlayState::Hidden;
        self.target = None;
        Transition::Removed
    }

    async fn remove(&mut self) -> Transition {
        match self.display.hide().await {
            Ok(()) => {
                info!("Overlay hidden");
                self.state = OverlayState::Hidden;
                self.target = None;
                Transition::Removed
            }
            Err(err) => {
                warn!("Could not remove overlay ({}): {err}", err.kind());
                Transition::Unchanged
            }
        }
    }
}

impl Drop for OverlayStateMachine {
    fn drop(&mut self) {
        if self.state == OverlayState::Shown {
            self.display.hide_detached();
        }
    }
}
