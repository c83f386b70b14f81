use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::Session;
use crate::db;
use crate::error::StoreError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

pub fn respond(req: &Request, res: Result<Value, HandlerErr>) -> Value {
    match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(
                id = req.id.as_str(),
                method = req.method.as_str(),
                code = e.code,
                "request failed: {}",
                e.message
            );
            e.response(&req.id)
        }
    }
}

/// Serializes a result payload; a failure is reported under `code`.
pub fn to_json<T: Serialize>(value: &T, code: &'static str) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code,
        message: e.to_string(),
        details: None,
    })
}

/// Absent or null is `None`; any other non-string is rejected.
pub fn opt_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    opt_str(params, key)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn open_conn(state: &AppState) -> Result<Connection, HandlerErr> {
    let Some(workspace) = state.workspace.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".into(),
            details: None,
        });
    };
    db::connect(workspace).map_err(|e| match e {
        StoreError::NotFound(message) => HandlerErr {
            code: "no_workspace",
            message,
            details: Some(json!({ "workspacePath": workspace.to_string_lossy() })),
        },
        other => other.into(),
    })
}

pub fn require_session(state: &AppState) -> Result<Session, HandlerErr> {
    state
        .session
        .clone()
        .ok_or_else(|| StoreError::Permission("log in first".into()).into())
}
