use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::auth;
use crate::error::StoreError;

pub const DB_FILE: &str = "students.sqlite3";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

/// Opens a short-lived connection for a single operation. The caller drops it
/// when the operation finishes; nothing keeps it around between requests.
pub fn connect(workspace: &Path) -> Result<Connection, StoreError> {
    let path = db_path(workspace);
    if !path.is_file() {
        return Err(StoreError::NotFound(format!(
            "database not found: {}",
            path.to_string_lossy()
        )));
    }
    Ok(Connection::open(path)?)
}

/// Creates the workspace store if needed and seeds the default admin login.
/// Safe to call on every start.
pub fn initialize(workspace: &Path, admin_password: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let mut conn = Connection::open(db_path(workspace))
        .with_context(|| format!("failed to open {}", db_path(workspace).to_string_lossy()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin','staff','student'))
        )",
        [],
    )?;

    // username is UNIQUE but nullable: one login links to at most one record,
    // while any number of records may have no link at all.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            roll_no TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            gender TEXT,
            contact TEXT,
            dob TEXT,
            address TEXT,
            username TEXT UNIQUE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    let tx = conn.transaction()?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM users WHERE username = ?",
            [DEFAULT_ADMIN_USERNAME],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_none() {
        tx.execute(
            "INSERT INTO users(username, password, role) VALUES(?, ?, 'admin')",
            (DEFAULT_ADMIN_USERNAME, auth::hash_password(admin_password)?),
        )
        .context("failed to seed default admin")?;
        tracing::info!(username = DEFAULT_ADMIN_USERNAME, "seeded default admin login");
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn temp_workspace(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}-{}",
            prefix,
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        super::initialize(&p, "admin123").expect("initialize workspace");
        p
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_workspace;
    use super::*;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).expect("count")
    }

    #[test]
    fn initialize_is_idempotent() {
        let ws = temp_workspace("studentd-db-init");
        initialize(&ws, "admin123").expect("second initialize");
        initialize(&ws, "other").expect("third initialize");

        let conn = connect(&ws).expect("connect");
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM users"), 1);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM users WHERE username = 'admin' AND role = 'admin'"),
            1
        );
    }

    #[test]
    fn role_check_constraint_rejects_unknown_roles() {
        let ws = temp_workspace("studentd-db-role");
        let conn = connect(&ws).expect("connect");
        let res = conn.execute(
            "INSERT INTO users(username, password, role) VALUES('x', 'y', 'janitor')",
            [],
        );
        assert!(res.is_err());
    }

    #[test]
    fn null_links_do_not_collide() {
        let ws = temp_workspace("studentd-db-null-link");
        let conn = connect(&ws).expect("connect");
        for roll in ["A", "B", "C"] {
            conn.execute(
                "INSERT INTO students(roll_no, name, username) VALUES(?, 'n', NULL)",
                [roll],
            )
            .expect("insert unlinked");
        }
        conn.execute(
            "INSERT INTO students(roll_no, name, username) VALUES('D', 'n', 'bob')",
            [],
        )
        .expect("insert linked");
        assert!(conn
            .execute(
                "INSERT INTO students(roll_no, name, username) VALUES('E', 'n', 'bob')",
                [],
            )
            .is_err());
    }

    #[test]
    fn student_link_needs_no_account() {
        let ws = temp_workspace("studentd-db-link-no-fk");
        let conn = connect(&ws).expect("connect");
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM pragma_foreign_key_list('students')"),
            0
        );
        conn.execute(
            "INSERT INTO students(roll_no, name, username) VALUES('R1', 'n', 'not-yet-a-user')",
            [],
        )
        .expect("link before the account exists");
    }

    #[test]
    fn connect_requires_initialized_workspace() {
        let missing = std::env::temp_dir().join("studentd-db-missing-never-created");
        assert!(matches!(connect(&missing), Err(StoreError::NotFound(_))));
    }
}
