//! Student records: create, update, delete, list, search.
//!
//! Each call takes the caller's [`Session`] and applies the role's read scope
//! and write permission itself. Mutations run in their own transaction and
//! leave the store untouched when they fail.
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};

use crate::auth::{ReadScope, Session};
use crate::error::StoreError;

const SELECT_COLUMNS: &str =
    "SELECT roll_no, name, email, gender, contact, dob, address, username FROM students";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub roll_no: String,
    pub name: String,
    pub email: String,
    pub gender: String,
    pub contact: String,
    pub dob: String,
    pub address: String,
    pub username: Option<String>,
}

impl StudentRecord {
    /// Field order consumed by the CSV and report exports.
    pub fn export_fields(&self) -> [&str; 8] {
        [
            self.roll_no.as_str(),
            self.name.as_str(),
            self.email.as_str(),
            self.gender.as_str(),
            self.contact.as_str(),
            self.dob.as_str(),
            self.address.as_str(),
            self.username.as_deref().unwrap_or(""),
        ]
    }

    fn normalized(mut self) -> Self {
        for f in [
            &mut self.roll_no,
            &mut self.name,
            &mut self.email,
            &mut self.gender,
            &mut self.contact,
            &mut self.dob,
            &mut self.address,
        ] {
            *f = f.trim().to_string();
        }
        self.username = normalize_link(self.username.as_deref());
        self
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        // Stores written by older tools may hold NULL in any text column.
        let text = |i: usize| -> rusqlite::Result<String> {
            Ok(row.get::<_, Option<String>>(i)?.unwrap_or_default())
        };
        Ok(StudentRecord {
            roll_no: text(0)?,
            name: text(1)?,
            email: text(2)?,
            gender: text(3)?,
            contact: text(4)?,
            dob: text(5)?,
            address: text(6)?,
            username: row.get(7)?,
        })
    }
}

/// Partial update. `username: Some(None)` clears the link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub contact: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
    pub username: Option<Option<String>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self == &StudentPatch::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    RollNo,
    Name,
    Contact,
    Username,
}

impl SearchField {
    /// Unrecognized fields search by name.
    pub fn parse_or_name(s: &str) -> Self {
        match s.trim() {
            "roll_no" => Self::RollNo,
            "contact" => Self::Contact,
            "username" => Self::Username,
            _ => Self::Name,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::RollNo => "roll_no",
            Self::Name => "name",
            Self::Contact => "contact",
            Self::Username => "username",
        }
    }
}

fn normalize_link(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn like_escape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('%');
    for ch in pattern.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn roll_no_exists(tx: &Transaction<'_>, roll_no: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM students WHERE roll_no = ?", [roll_no], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn link_owner(tx: &Transaction<'_>, username: &str) -> Result<Option<String>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT roll_no FROM students WHERE username = ?",
            [username],
            |r| r.get(0),
        )
        .optional()?)
}

fn query_records(
    conn: &Connection,
    sql: &str,
    binds: Vec<Value>,
) -> Result<Vec<StudentRecord>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), StudentRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Scope clause for the caller, as (`WHERE` fragment, binds).
fn scope_filter(caller: &Session) -> (Option<&'static str>, Vec<Value>) {
    match caller.capabilities().read_scope {
        ReadScope::All => (None, Vec::new()),
        ReadScope::OwnRecord => (
            Some("username = ?"),
            vec![Value::Text(caller.username.clone())],
        ),
    }
}

pub fn create(
    conn: &mut Connection,
    caller: &Session,
    record: StudentRecord,
) -> Result<StudentRecord, StoreError> {
    caller.require_manage_students()?;

    let record = record.normalized();
    if record.roll_no.is_empty() || record.name.is_empty() {
        return Err(StoreError::Validation(
            "roll no and name are required".into(),
        ));
    }

    let tx = conn.transaction()?;
    if roll_no_exists(&tx, &record.roll_no)? {
        return Err(StoreError::Conflict(format!(
            "roll no {} already exists",
            record.roll_no
        )));
    }
    if let Some(link) = record.username.as_deref() {
        if let Some(owner) = link_owner(&tx, link)? {
            return Err(StoreError::Conflict(format!(
                "username {} is already linked to roll no {}",
                link, owner
            )));
        }
    }
    tx.execute(
        "INSERT INTO students(roll_no, name, email, gender, contact, dob, address, username)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record.roll_no,
            &record.name,
            &record.email,
            &record.gender,
            &record.contact,
            &record.dob,
            &record.address,
            record.username.as_deref(),
        ),
    )?;
    tx.commit()?;

    tracing::info!(
        by = caller.username.as_str(),
        roll_no = record.roll_no.as_str(),
        "student created"
    );
    Ok(record)
}

pub fn update(
    conn: &mut Connection,
    caller: &Session,
    roll_no: &str,
    patch: StudentPatch,
) -> Result<StudentRecord, StoreError> {
    caller.require_manage_students()?;

    let roll_no = roll_no.trim();
    if roll_no.is_empty() {
        return Err(StoreError::Validation("missing roll no".into()));
    }
    if patch.is_empty() {
        return Err(StoreError::Validation(
            "patch must include at least one field".into(),
        ));
    }

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some(name) = patch.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("name must not be empty".into()));
        }
        set_parts.push("name = ?");
        bind_values.push(Value::Text(name.to_string()));
    }
    for (column, value) in [
        ("email = ?", &patch.email),
        ("gender = ?", &patch.gender),
        ("contact = ?", &patch.contact),
        ("dob = ?", &patch.dob),
        ("address = ?", &patch.address),
    ] {
        if let Some(v) = value {
            set_parts.push(column);
            bind_values.push(Value::Text(v.trim().to_string()));
        }
    }
    let link = patch
        .username
        .as_ref()
        .map(|v| normalize_link(v.as_deref()));
    if let Some(link) = &link {
        set_parts.push("username = ?");
        bind_values.push(match link {
            Some(u) => Value::Text(u.clone()),
            None => Value::Null,
        });
    }

    let tx = conn.transaction()?;
    if !roll_no_exists(&tx, roll_no)? {
        return Err(StoreError::NotFound(format!("roll no {} not found", roll_no)));
    }
    if let Some(Some(u)) = &link {
        if let Some(owner) = link_owner(&tx, u)? {
            if owner != roll_no {
                return Err(StoreError::Conflict(format!(
                    "username {} is already linked to roll no {}",
                    u, owner
                )));
            }
        }
    }

    let sql = format!(
        "UPDATE students SET {} WHERE roll_no = ?",
        set_parts.join(", ")
    );
    bind_values.push(Value::Text(roll_no.to_string()));
    tx.execute(&sql, params_from_iter(bind_values))?;

    let updated = tx.query_row(
        &format!("{} WHERE roll_no = ?", SELECT_COLUMNS),
        [roll_no],
        StudentRecord::from_row,
    )?;
    tx.commit()?;

    tracing::info!(
        by = caller.username.as_str(),
        roll_no,
        fields = set_parts.len(),
        "student updated"
    );
    Ok(updated)
}

/// Irreversible. Confirmation belongs to the caller.
pub fn delete(conn: &mut Connection, caller: &Session, roll_no: &str) -> Result<(), StoreError> {
    caller.require_manage_students()?;

    let roll_no = roll_no.trim();
    if roll_no.is_empty() {
        return Err(StoreError::Validation("missing roll no".into()));
    }

    let tx = conn.transaction()?;
    let changed = tx.execute("DELETE FROM students WHERE roll_no = ?", [roll_no])?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("roll no {} not found", roll_no)));
    }
    tx.commit()?;

    tracing::info!(by = caller.username.as_str(), roll_no, "student deleted");
    Ok(())
}

pub fn list(conn: &Connection, caller: &Session) -> Result<Vec<StudentRecord>, StoreError> {
    let (scope, binds) = scope_filter(caller);
    let sql = match scope {
        Some(clause) => format!("{} WHERE {} ORDER BY name, roll_no", SELECT_COLUMNS, clause),
        None => format!("{} ORDER BY name, roll_no", SELECT_COLUMNS),
    };
    query_records(conn, &sql, binds)
}

pub fn search(
    conn: &Connection,
    caller: &Session,
    field: SearchField,
    pattern: &str,
) -> Result<Vec<StudentRecord>, StoreError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(StoreError::Validation("enter a value to search".into()));
    }

    let (scope, mut binds) = scope_filter(caller);
    let like = format!("{} LIKE ? ESCAPE '\\'", field.column());
    let sql = match scope {
        Some(clause) => format!(
            "{} WHERE {} AND {} ORDER BY name, roll_no",
            SELECT_COLUMNS, clause, like
        ),
        None => format!("{} WHERE {} ORDER BY name, roll_no", SELECT_COLUMNS, like),
    };
    binds.push(Value::Text(like_escape(pattern)));
    query_records(conn, &sql, binds)
}

/// Re-reads a single record under the caller's read scope.
pub fn get(conn: &Connection, caller: &Session, roll_no: &str) -> Result<StudentRecord, StoreError> {
    let roll_no = roll_no.trim();
    let (scope, mut binds) = scope_filter(caller);
    let sql = match scope {
        Some(clause) => format!("{} WHERE {} AND roll_no = ?", SELECT_COLUMNS, clause),
        None => format!("{} WHERE roll_no = ?", SELECT_COLUMNS),
    };
    binds.push(Value::Text(roll_no.to_string()));
    query_records(conn, &sql, binds)?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(format!("roll no {} not found", roll_no)))
}
