use crate::export;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    open_conn, opt_str, require_session, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, SearchField, StudentRecord};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Rows the caller can currently see: the whole list, or a search result when
/// `params.search` is given.
fn visible_rows(state: &AppState, req: &Request) -> Result<Vec<StudentRecord>, HandlerErr> {
    let caller = require_session(state)?;
    caller.require_export()?;
    let conn = open_conn(state)?;

    let rows = match req.params.get("search") {
        None | Some(Value::Null) => students::list(&conn, &caller)?,
        Some(search @ Value::Object(_)) => {
            let field = opt_str(search, "field")?.unwrap_or_default();
            let pattern = opt_str(search, "pattern")?.unwrap_or_default();
            students::search(&conn, &caller, SearchField::parse_or_name(&field), &pattern)?
        }
        Some(_) => return Err(HandlerErr::bad_params("search must be an object")),
    };
    Ok(rows)
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let out_path = required_str(&req.params, "outPath")?;
    let rows = visible_rows(state, req)?;
    let written = export::write_csv(&PathBuf::from(&out_path), &rows).map_err(|e| {
        let mut he = HandlerErr::from(e);
        if he.code == "export_failed" {
            he.details = Some(json!({ "path": out_path }));
        }
        he
    })?;
    tracing::info!(path = out_path.as_str(), rows = written, "csv exported");
    Ok(json!({ "ok": true, "rowsExported": written, "path": out_path }))
}

fn handle_records_model(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let rows = visible_rows(state, req)?;
    let model = export::report_model(&rows)?;
    to_json(&model, "export_failed")
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "export.csv" => handle_export_csv(state, req),
        "reports.studentRecordsModel" => handle_records_model(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
