use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{open_conn, opt_str, require_session, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, SearchField, StudentPatch, StudentRecord};
use serde_json::{json, Map, Value};

fn record_json(record: &StudentRecord) -> Result<Value, HandlerErr> {
    to_json(record, "db_query_failed")
}

fn records_json(records: &[StudentRecord]) -> Result<Value, HandlerErr> {
    Ok(json!({ "students": to_json(&records, "db_query_failed")? }))
}

fn record_from_params(params: &Value) -> Result<StudentRecord, HandlerErr> {
    let field = |key: &str| -> Result<String, HandlerErr> {
        Ok(opt_str(params, key)?.unwrap_or_default())
    };
    Ok(StudentRecord {
        roll_no: field("rollNo")?,
        name: field("name")?,
        email: field("email")?,
        gender: field("gender")?,
        contact: field("contact")?,
        dob: field("dob")?,
        address: field("address")?,
        username: opt_str(params, "username")?,
    })
}

fn patch_from_params(patch: &Map<String, Value>) -> Result<StudentPatch, HandlerErr> {
    // Text fields: string sets, null blanks. `username` null clears the link.
    let text = |key: &str| -> Result<Option<String>, HandlerErr> {
        match patch.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(String::new())),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(HandlerErr::bad_params(format!(
                "patch.{} must be a string or null",
                key
            ))),
        }
    };
    let username = match patch.get("username") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            return Err(HandlerErr::bad_params(
                "patch.username must be a string or null",
            ))
        }
    };
    Ok(StudentPatch {
        name: text("name")?,
        email: text("email")?,
        gender: text("gender")?,
        contact: text("contact")?,
        dob: text("dob")?,
        address: text("address")?,
        username,
    })
}

fn roll_no_param(params: &Value) -> Result<String, HandlerErr> {
    Ok(opt_str(params, "rollNo")?.unwrap_or_default())
}

fn handle_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let conn = open_conn(state)?;
    let rows = students::list(&conn, &caller)?;
    records_json(&rows)
}

fn handle_search(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let field = opt_str(&req.params, "field")?.unwrap_or_default();
    let pattern = opt_str(&req.params, "pattern")?.unwrap_or_default();
    let conn = open_conn(state)?;
    let rows = students::search(&conn, &caller, SearchField::parse_or_name(&field), &pattern)?;
    records_json(&rows)
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let roll_no = roll_no_param(&req.params)?;
    let conn = open_conn(state)?;
    let record = students::get(&conn, &caller, &roll_no)?;
    Ok(json!({ "student": record_json(&record)? }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let record = record_from_params(&req.params)?;
    let mut conn = open_conn(state)?;
    let created = students::create(&mut conn, &caller, record)?;
    Ok(json!({ "student": record_json(&created)? }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let roll_no = roll_no_param(&req.params)?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing/invalid patch"));
    };
    let patch = patch_from_params(patch)?;
    let mut conn = open_conn(state)?;
    let updated = students::update(&mut conn, &caller, &roll_no, patch)?;
    Ok(json!({ "student": record_json(&updated)? }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let caller = require_session(state)?;
    let roll_no = roll_no_param(&req.params)?;
    let mut conn = open_conn(state)?;
    students::delete(&mut conn, &caller, &roll_no)?;
    Ok(json!({ "ok": true, "rollNo": roll_no.trim() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.search" => handle_search(state, req),
        "students.get" => handle_get(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
