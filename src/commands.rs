//! Method-name dispatch for the host's control-plane bridge.
//!
//! The bridge forwards `(method, args)` pairs and gets back a JSON value or an
//! error string. Only malformed input is reported as an error; everything the
//! engine does internally is best-effort and always answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::enforcement::FocusEngine;
use crate::error::ConfigError;
use crate::models::{ApplicationId, BlockSet};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartBlockingArgs {
    pub blocked_apps: Option<Vec<Option<String>>>,
    pub app_labels: HashMap<String, String>,
}

impl StartBlockingArgs {
    /// Null or missing lists become the empty set; null and blank entries
    /// are skipped.
    pub fn into_block_set(self) -> BlockSet {
        let mut set = BlockSet::new();
        for id in self.blocked_apps.unwrap_or_default().into_iter().flatten() {
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            match self.app_labels.get(id) {
                Some(label) => set.insert_labeled(ApplicationId::from(id), label.clone()),
                None => set.insert(ApplicationId::from(id)),
            }
        }
        set
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    method: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo {
    current_app: Option<ApplicationId>,
    is_blocking_active: bool,
    blocked_apps: Vec<ApplicationId>,
}

fn parse_args<T>(method: &str, args: Value) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args)
        .map_err(|e| ConfigError::MalformedCommand(format!("{method}: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

pub async fn dispatch(engine: &FocusEngine, method: &str, args: Value) -> Result<Value, String> {
    match method {
        "init" => Ok(Value::Null),
        "startBlocking" => {
            let args: StartBlockingArgs = parse_args(method, args).map_err(|e| e.to_string())?;
            let snapshot = engine.start(args.into_block_set()).await;
            to_value(snapshot)
        }
        "stopBlocking" => {
            engine.stop().await;
            Ok(Value::Null)
        }
        "getCurrentApp" => to_value(engine.query_current_foreground().await),
        "debugCurrentApp" => {
            let info = DebugInfo {
                current_app: engine.query_current_foreground().await,
                is_blocking_active: engine.is_active().await,
                blocked_apps: engine.current_block_set().await.into_iter().collect(),
            };
            to_value(info)
        }
        "isActive" => Ok(json!(engine.is_active().await)),
        "getBlockedApps" => to_value(engine.current_block_set().await),
        "goBack" => Ok(json!(engine.go_back().await)),
        "stopSession" => to_value(engine.request_stop_session().await),
        "snapshot" => to_value(engine.snapshot().await),
        other => Err(ConfigError::UnknownMethod(other.to_string()).to_string()),
    }
}

/// String-in/string-out form for hosts that cross an FFI boundary. Answers
/// `{"ok": value}` or `{"error": message}`.
pub async fn dispatch_json(engine: &FocusEngine, request: &str) -> String {
    let response = match serde_json::from_str::<Request>(request) {
        Ok(Request { method, args }) => match dispatch(engine, &method, args).await {
            Ok(value) => json!({ "ok": value }),
            Err(message) => json!({ "error": message }),
        },
        Err(e) => json!({ "error": ConfigError::MalformedCommand(e.to_string()).to_string() }),
    };
    response.to_string()
}
