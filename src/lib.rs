//! Focus-session enforcement: keeps blocked apps out of the foreground.
//!
//! A [`FocusEngine`] polls the host for the current foreground app, listens to
//! accessibility events for faster reaction, and presents a blocking overlay
//! whenever a blocked app surfaces. The host supplies the platform through
//! [`platform::PlatformBindings`] and drives sessions either directly or via
//! [`commands::dispatch`].

pub mod commands;
pub mod enforcement;
pub mod error;
pub mod models;
pub mod platform;
pub mod sensing;
pub mod settings;
pub mod utils;

pub use enforcement::{Decision, EngineEvent, EngineSnapshot, FocusEngine, OverlayState};
pub use error::{ConfigError, PlatformError};
pub use models::{AllowList, ApplicationId, BlockSet, SessionState};
pub use platform::{OverlaySurface, PlatformBindings, TaskStackSource, UsageRecord, UsageStatsSource};
pub use sensing::{AccessibilityEvent, AccessibilityEventKind, EventSink, UiNode};
pub use settings::{EngineSettings, SettingsStore};
pub use utils::init_logging;
