use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::error::ConfigError;

const MIN_TICK_INTERVAL_MS: u64 = 50;
const MAX_TICK_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Enforcement loop cadence.
    pub tick_interval_ms: u64,
    /// Grace window after the user escapes a blocked app.
    pub cooldown_ms: u64,
    /// How far back the usage-statistics query looks.
    pub usage_lookback_hours: u32,
    /// Per-tick budget for a foreground query before it counts as failed.
    pub query_timeout_ms: u64,
    /// Extra launcher packages added to the built-in allow-list.
    pub extra_launchers: Vec<String>,
    /// The host app's own package; accessibility events it raises are ignored.
    pub own_package: Option<String>,
    pub event_queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            cooldown_ms: 3_000,
            usage_lookback_hours: 24,
            query_timeout_ms: 150,
            extra_launchers: Vec::new(),
            own_package: None,
            event_queue_capacity: 64,
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn usage_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.usage_lookback_hours))
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            return Err(ConfigError::InvalidSetting {
                field: "tickIntervalMs",
                reason: format!(
                    "{} is outside {MIN_TICK_INTERVAL_MS}..={MAX_TICK_INTERVAL_MS}",
                    self.tick_interval_ms
                ),
            });
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "cooldownMs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.usage_lookback_hours == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "usageLookbackHours",
                reason: "must be greater than zero".into(),
            });
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "queryTimeoutMs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "eventQueueCapacity",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<EngineSettings>(&contents) {
                Ok(parsed) => match parsed.validate() {
                    Ok(()) => parsed,
                    Err(err) => {
                        warn!("Ignoring invalid settings in {}: {err}", path.display());
                        EngineSettings::default()
                    }
                },
                Err(err) => {
                    warn!("Ignoring unreadable settings in {}: {err}", path.display());
                    EngineSettings::default()
                }
            }
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update_engine(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
