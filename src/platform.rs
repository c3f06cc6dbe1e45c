//! Seams to the host operating system.
//!
//! The host (an Android service, a desktop shell, a test harness) implements
//! these traits and hands them to [`crate::FocusEngine`]. Every method may fail
//! with a [`PlatformError`]; the engine absorbs those failures and never lets
//! them reach its own callers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::models::ApplicationId;

/// One row of the platform's usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub package_name: ApplicationId,
    /// Milliseconds since the Unix epoch; zero when the platform has no value.
    pub last_time_used_ms: i64,
}

impl UsageRecord {
    pub fn new(package_name: impl Into<ApplicationId>, last_time_used_ms: i64) -> Self {
        Self {
            package_name: package_name.into(),
            last_time_used_ms,
        }
    }
}

/// Recency-ranked usage statistics (needs usage-access permission).
pub trait UsageStatsSource: Send + Sync {
    fn query_usage(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, PlatformError>;
}

/// The running-task stack. Often restricted or stale on recent OS releases.
pub trait TaskStackSource: Send + Sync {
    /// Owning application of the top-most task, if the platform reveals it.
    fn top_task(&self) -> Result<Option<ApplicationId>, PlatformError>;
}

/// The full-screen blocking surface and home navigation.
///
/// Only ever called from the display context (see
/// [`crate::enforcement::display`]), so implementations do not need to be
/// thread-safe beyond being movable into that context.
pub trait OverlaySurface: Send {
    /// Present an opaque, input-absorbing surface over `blocked`.
    fn show(&mut self, blocked: &ApplicationId) -> Result<(), PlatformError>;

    fn hide(&mut self) -> Result<(), PlatformError>;

    /// Send the device to its home/launcher surface.
    fn go_home(&mut self) -> Result<(), PlatformError>;
}

/// Everything the engine needs from the host.
pub struct PlatformBindings {
    pub usage_stats: Arc<dyn UsageStatsSource>,
    pub task_stack: Arc<dyn TaskStackSource>,
    pub surface: Box<dyn OverlaySurface>,
}
