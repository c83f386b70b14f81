use crate::auth::{self, Session};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{open_conn, opt_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn session_json(session: &Session) -> Value {
    json!({
        "username": session.username,
        "role": session.role,
        "capabilities": session.capabilities(),
    })
}

fn login(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = open_conn(state)?;
    let username = opt_str(&req.params, "username")?.unwrap_or_default();
    let password = opt_str(&req.params, "password")?.unwrap_or_default();

    let role = auth::authenticate(&conn, &username, &password)?;
    let session = Session::new(username.trim(), role);
    let out = session_json(&session);
    state.session = Some(session);
    Ok(out)
}

fn logout(state: &mut AppState) -> Result<Value, HandlerErr> {
    let ended = state.session.take();
    if let Some(s) = &ended {
        tracing::info!(username = s.username.as_str(), "logged out");
    }
    Ok(json!({ "ok": true, "wasLoggedIn": ended.is_some() }))
}

fn current(state: &AppState) -> Result<Value, HandlerErr> {
    Ok(json!({ "session": state.session.as_ref().map(session_json) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "auth.login" => login(state, req),
        "auth.logout" => logout(state),
        "session.get" => current(state),
        _ => return None,
    };
    Some(respond(req, res))
}
