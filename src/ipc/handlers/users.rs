use crate::auth;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{open_conn, opt_str, require_session, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_users_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let username = opt_str(&req.params, "username")?.unwrap_or_default();
    let password = opt_str(&req.params, "password")?.unwrap_or_default();
    let role = opt_str(&req.params, "role")?.unwrap_or_default();

    let mut conn = open_conn(state)?;
    let (username, role) = auth::provision(&mut conn, &caller, &username, &password, &role)?;
    Ok(json!({ "username": username, "role": role }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.create" => Some(respond(req, handle_users_create(state, req))),
        _ => None,
    }
}
