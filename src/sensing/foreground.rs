use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::models::ApplicationId;
use crate::platform::{TaskStackSource, UsageRecord, UsageStatsSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Which signal produced a guess. Earlier variants take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuessSource {
    UsageRecency,
    TaskStack,
    AccessibilityEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundGuess {
    pub application_id: ApplicationId,
    pub source: GuessSource,
}

impl ForegroundGuess {
    pub fn new(application_id: ApplicationId, source: GuessSource) -> Self {
        Self {
            application_id,
            source,
        }
    }
}

/// Reconciles usage recency and the task stack into one foreground guess.
///
/// Usage recency wins whenever it yields anything; the two signals are not
/// cross-checked against each other.
pub struct ForegroundDetector {
    usage_stats: Arc<dyn UsageStatsSource>,
    task_stack: Arc<dyn TaskStackSource>,
    lookback: Duration,
}

impl ForegroundDetector {
    pub fn new(
        usage_stats: Arc<dyn UsageStatsSource>,
        task_stack: Arc<dyn TaskStackSource>,
        lookback: Duration,
    ) -> Self {
        Self {
            usage_stats,
            task_stack,
            lookback,
        }
    }

    pub fn detect(&self) -> Option<ForegroundGuess> {
        self.detect_at(Utc::now())
    }

    /// Never fails: a signal that errors or comes back empty is just absent.
    pub fn detect_at(&self, now: DateTime<Utc>) -> Option<ForegroundGuess> {
        match self.from_usage_stats(now) {
            Ok(Some(id)) => return Some(ForegroundGuess::new(id, GuessSource::UsageRecency)),
            Ok(None) => {}
            Err(err) => log_debug!("usage stats unavailable ({}): {err}", err.kind()),
        }

        match self.task_stack.top_task() {
            Ok(Some(id)) => Some(ForegroundGuess::new(id, GuessSource::TaskStack)),
            Ok(None) => None,
            Err(err) => {
                log_debug!("task stack unavailable ({}): {err}", err.kind());
                None
            }
        }
    }

    fn from_usage_stats(&self, now: DateTime<Utc>) -> Result<Option<ApplicationId>, PlatformError> {
        let records = self.usage_stats.query_usage(now - self.lookback, now)?;
        Ok(most_recent(&records))
    }
}

/// The entry with the greatest last-used time. Entries without a usable
/// timestamp are skipped and the first of equal timestamps is kept.
pub fn most_recent(records: &[UsageRecord]) -> Option<ApplicationId> {
    let mut best: Option<&UsageRecord> = None;
    let mut best_time = 0_i64;
    for record in records {
        if record.last_time_used_ms > best_time {
            best_time = record.last_time_used_ms;
            best = Some(record);
        }
    }
    best.map(|record| record.package_name.clone())
}
