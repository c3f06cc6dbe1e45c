use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::app::BlockSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub active: bool,
    pub session_id: Option<String>,
    pub block_set: BlockSet,
    pub started_at: Option<DateTime<Utc>>,
    pub suspended: bool,
    pub suspended_until: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new block set and activate. Any suspension left over from a
    /// previous session is dropped.
    pub fn begin(&mut self, session_id: String, block_set: BlockSet, started_at: DateTime<Utc>) {
        *self = Self {
            active: true,
            session_id: Some(session_id),
            block_set,
            started_at: Some(started_at),
            suspended: false,
            suspended_until: None,
        };
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn suspend_until(&mut self, until: DateTime<Utc>) {
        self.suspended = true;
        self.suspended_until = Some(until);
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.suspended_until = None;
    }

    pub fn remaining_suspension_ms(&self, now: DateTime<Utc>) -> i64 {
        match (self.suspended, self.suspended_until) {
            (true, Some(until)) => (until - now).num_milliseconds().max(0),
            _ => 0,
        }
    }
}
