use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::state::EngineCore;

/// Identifies one armed cooldown: the session generation it belongs to plus a
/// per-arm sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTicket {
    pub generation: u64,
    pub sequence: u64,
}

/// The pending post-escape timer, if any.
///
/// Starting or stopping a session cancels the timer, and an expiry that still
/// slips through is discarded because its ticket no longer matches.
#[derive(Default)]
pub struct CooldownTimer {
    pending: Option<(CooldownTicket, CancellationToken)>,
    next_sequence: u64,
}

impl CooldownTimer {
    /// Cancel whatever was pending and arm a new timer under `parent`.
    pub fn arm(
        &mut self,
        generation: u64,
        parent: &CancellationToken,
    ) -> (CooldownTicket, CancellationToken) {
        self.cancel();
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let ticket = CooldownTicket {
            generation,
            sequence: self.next_sequence,
        };
        let token = parent.child_token();
        self.pending = Some((ticket, token.clone()));
        (ticket, token)
    }

    pub fn cancel(&mut self) {
        if let Some((_, token)) = self.pending.take() {
            token.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume the pending timer if `ticket` is the one currently armed.
    pub fn take_if_current(&mut self, ticket: CooldownTicket) -> bool {
        match &self.pending {
            Some((pending, token)) if *pending == ticket && !token.is_cancelled() => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

pub(crate) fn spawn_expiry(
    core: Arc<Mutex<EngineCore>>,
    ticket: CooldownTicket,
    token: CancellationToken,
    duration: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                log::debug!("Cooldown {ticket:?} cancelled");
            }
            _ = tokio::time::sleep(duration) => {
                let mut core = core.lock().await;
                core.end_cooldown(ticket);
            }
        }
    })
}
