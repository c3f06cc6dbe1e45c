//! The single execution context allowed to touch the blocking surface.
//!
//! Callers on any task send a [`DisplayCommand`] and await the reply; the actor
//! applies commands one at a time in arrival order. When every handle is gone,
//! or the runtime drops the actor, a still-presented surface is removed.

use log::{debug, error, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::PlatformError;
use crate::models::ApplicationId;
use crate::platform::OverlaySurface;

type Reply = oneshot::Sender<Result<(), PlatformError>>;

enum DisplayCommand {
    Show { target: ApplicationId, reply: Reply },
    Hide { reply: Option<Reply> },
    GoHome { reply: Reply },
}

/// Owns the surface and remembers whether it is currently on screen.
struct SurfaceGuard {
    surface: Box<dyn OverlaySurface>,
    presented: bool,
}

impl SurfaceGuard {
    /// A surface left up by a failed removal is taken down first so it is
    /// never presented twice.
    fn show(&mut self, target: &ApplicationId) -> Result<(), PlatformError> {
        self.hide()?;
        self.surface.show(target)?;
        self.presented = true;
        Ok(())
    }

    /// Retries removal on every call while the last attempt failed.
    fn hide(&mut self) -> Result<(), PlatformError> {
        if !self.presented {
            return Ok(());
        }
        self.surface.hide()?;
        self.presented = false;
        Ok(())
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        if let Err(err) = self.hide() {
            error!("Failed to remove overlay during teardown: {err}");
        }
    }
}

#[derive(Clone)]
pub struct DisplayHandle {
    tx: mpsc::UnboundedSender<DisplayCommand>,
}

impl DisplayHandle {
    /// Spawn the display actor on the current tokio runtime.
    pub fn spawn(surface: Box<dyn OverlaySurface>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = SurfaceGuard {
            surface,
            presented: false,
        };
        let handle = tokio::spawn(display_actor(guard, rx));
        (Self { tx }, handle)
    }

    pub async fn show(&self, target: &ApplicationId) -> Result<(), PlatformError> {
        let (reply, rx) = oneshot::channel();
        self.send(DisplayCommand::Show {
            target: target.clone(),
            reply,
        })?;
        rx.await.map_err(|_| PlatformError::ChannelClosed)?
    }

    pub async fn hide(&self) -> Result<(), PlatformError> {
        let (reply, rx) = oneshot::channel();
        self.send(DisplayCommand::Hide { reply: Some(reply) })?;
        rx.await.map_err(|_| PlatformError::ChannelClosed)?
    }

    pub async fn go_home(&self) -> Result<(), PlatformError> {
        let (reply, rx) = oneshot::channel();
        self.send(DisplayCommand::GoHome { reply })?;
        rx.await.map_err(|_| PlatformError::ChannelClosed)?
    }

    /// Queue a removal without waiting for it.
    pub fn hide_detached(&self) {
        if self.send(DisplayCommand::Hide { reply: None }).is_err() {
            debug!("Display actor already stopped; nothing to hide");
        }
    }

    fn send(&self, command: DisplayCommand) -> Result<(), PlatformError> {
        self.tx.send(command).map_err(|_| PlatformError::ChannelClosed)
    }
}

async fn display_actor(mut guard: SurfaceGuard, mut rx: mpsc::UnboundedReceiver<DisplayCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            DisplayCommand::Show { target, reply } => {
                let _ = reply.send(guard.show(&target));
            }
            DisplayCommand::Hide { reply } => {
                let result = guard.hide();
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!("Detached overlay removal failed: {err}");
                        }
                    }
                }
            }
            DisplayCommand::GoHome { reply } => {
                let _ = reply.send(guard.surface.go_home());
            }
        }
    }
    debug!("Display actor exiting");
}
