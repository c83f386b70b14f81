//! Logins, roles, and the role → capability table.
//!
//! The session role is decided once by [`authenticate`] and never changes for
//! that session. Every operation in [`crate::students`] and [`provision`]
//! re-checks the caller against [`capabilities`] instead of trusting the UI.
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Every bcrypt variant (`$2a$`, `$2b$`, `$2y$`) starts with this.
const BCRYPT_PREFIX: &str = "$2";
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "student" => Ok(Self::Student),
            other => Err(StoreError::Validation(format!(
                "role must be one of admin, staff, student (got {:?})",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadScope {
    All,
    OwnRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub manage_students: bool,
    pub read_scope: ReadScope,
    pub provision_users: bool,
    pub export: bool,
}

pub const fn capabilities(role: Role) -> Capabilities {
    match role {
        Role::Admin => Capabilities {
            manage_students: true,
            read_scope: ReadScope::All,
            provision_users: true,
            export: true,
        },
        Role::Staff => Capabilities {
            manage_students: true,
            read_scope: ReadScope::All,
            provision_users: false,
            export: true,
        },
        Role::Student => Capabilities {
            manage_students: false,
            read_scope: ReadScope::OwnRecord,
            provision_users: false,
            export: true,
        },
    }
}

/// The logged-in caller. Every record operation takes one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Session {
            username: username.into(),
            role,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        capabilities(self.role)
    }

    pub fn require_manage_students(&self) -> Result<(), StoreError> {
        if self.capabilities().manage_students {
            Ok(())
        } else {
            Err(StoreError::Permission(format!(
                "role {} may not modify student records",
                self.role
            )))
        }
    }

    pub fn require_provision_users(&self) -> Result<(), StoreError> {
        if self.capabilities().provision_users {
            Ok(())
        } else {
            Err(StoreError::Permission(format!(
                "role {} may not create users",
                self.role
            )))
        }
    }

    pub fn require_export(&self) -> Result<(), StoreError> {
        if self.capabilities().export {
            Ok(())
        } else {
            Err(StoreError::Permission(format!(
                "role {} may not export",
                self.role
            )))
        }
    }
}

/// Hashes a password with bcrypt; the salt and cost live in the output.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Stores without a bcrypt prefix hold plaintext and are compared as-is.
pub fn verify_password(stored: &str, password: &str) -> bool {
    if !stored.starts_with(BCRYPT_PREFIX) {
        return stored == password;
    }
    match bcrypt::verify(password, stored) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!("unreadable password hash: {e}");
            false
        }
    }
}

pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Role, StoreError> {
    let username = username.trim();
    if username.is_empty() || password.trim().is_empty() {
        return Err(StoreError::AuthFailure);
    }

    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT password, role FROM users WHERE username = ?",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((stored, role)) = row else {
        // The attempted name may be a mistyped password; keep it out of logs.
        tracing::debug!("login rejected: unknown user");
        return Err(StoreError::AuthFailure);
    };
    if !verify_password(&stored, password) {
        tracing::debug!("login rejected: bad password");
        return Err(StoreError::AuthFailure);
    }

    let role = Role::from_str(&role)?;
    tracing::info!(username, role = role.as_str(), "login accepted");
    Ok(role)
}

pub fn provision(
    conn: &mut Connection,
    caller: &Session,
    username: &str,
    password: &str,
    role: &str,
) -> Result<(String, Role), StoreError> {
    caller.require_provision_users()?;

    let username = username.trim().to_string();
    if username.is_empty() || password.trim().is_empty() {
        return Err(StoreError::Validation(
            "username and password are required".into(),
        ));
    }
    let role = Role::from_str(role)?;

    let tx = conn.transaction()?;
    let exists: Option<i64> = tx
        .query_row("SELECT 1 FROM users WHERE username = ?", [&username], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_some() {
        return Err(StoreError::Conflict(format!(
            "username {} already exists",
            username
        )));
    }
    tx.execute(
        "INSERT INTO users(username, password, role) VALUES(?, ?, ?)",
        (&username, hash_password(password)?, role.as_str()),
    )?;
    tx.commit()?;

    tracing::info!(
        by = caller.username.as_str(),
        username = username.as_str(),
        role = role.as_str(),
        "user provisioned"
    );
    Ok((username, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, test_support::temp_workspace};

    fn admin() -> Session {
        Session::new("admin", Role::Admin)
    }

    #[test]
    fn policy_table_matches_roles() {
        let a = capabilities(Role::Admin);
        assert!(a.manage_students && a.provision_users && a.export);
        assert_eq!(a.read_scope, ReadScope::All);

        let s = capabilities(Role::Staff);
        assert!(s.manage_students && !s.provision_users && s.export);
        assert_eq!(s.read_scope, ReadScope::All);

        let st = capabilities(Role::Student);
        assert!(!st.manage_students && !st.provision_users && st.export);
        assert_eq!(st.read_scope, ReadScope::OwnRecord);
    }

    #[test]
    fn role_parsing_is_closed() {
        assert_eq!("staff".parse::<Role>().ok(), Some(Role::Staff));
        assert!(matches!(
            "Teacher".parse::<Role>(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn hashed_and_plain_passwords_verify() {
        let h = hash_password("pw1").expect("hash");
        assert!(h.starts_with(BCRYPT_PREFIX));
        assert!(verify_password(&h, "pw1"));
        assert!(!verify_password(&h, "pw2"));
        assert_ne!(hash_password("pw1").expect("hash"), h, "salt must differ per call");

        assert!(verify_password("admin123", "admin123"));
        assert!(!verify_password("admin123", "admin1234"));
    }

    #[test]
    fn stored_hashes_carry_the_bcrypt_cost() {
        let h = hash_password("pw1").expect("hash");
        let parts = bcrypt::HashParts::from_str(&h).expect("bcrypt hash parts");
        assert_eq!(parts.get_cost(), BCRYPT_COST);
        // A truncated hash is rejected, not treated as plaintext.
        assert!(!verify_password(&h[..20], "pw1"));
    }

    #[test]
    fn seeded_admin_password_is_hashed() {
        let ws = temp_workspace("studentd-auth-seed-hash");
        let conn = db::connect(&ws).expect("connect");
        let stored: String = conn
            .query_row("SELECT password FROM users WHERE username = 'admin'", [], |r| {
                r.get(0)
            })
            .expect("admin row");
        assert!(stored.starts_with(BCRYPT_PREFIX));
        assert_ne!(stored, "admin123");
    }

    #[test]
    fn default_admin_can_log_in() {
        let ws = temp_workspace("studentd-auth-admin");
        let conn = db::connect(&ws).expect("connect");
        assert_eq!(authenticate(&conn, "admin", "admin123").ok(), Some(Role::Admin));
        assert_eq!(authenticate(&conn, " admin ", "admin123").ok(), Some(Role::Admin));
    }

    #[test]
    fn authenticate_rejects_bad_input() {
        let ws = temp_workspace("studentd-auth-reject");
        let conn = db::connect(&ws).expect("connect");
        for (u, p) in [
            ("admin", "wrong"),
            ("nobody", "admin123"),
            ("", "admin123"),
            ("admin", ""),
            ("   ", "admin123"),
            ("admin", "   "),
            ("admin", "admin123 "),
        ] {
            assert!(
                matches!(authenticate(&conn, u, p), Err(StoreError::AuthFailure)),
                "expected failure for {:?}/{:?}",
                u,
                p
            );
        }
    }

    #[test]
    fn provisioned_users_authenticate_with_their_role() {
        let ws = temp_workspace("studentd-auth-provision");
        let mut conn = db::connect(&ws).expect("connect");
        for (u, p, r) in [("bob", "pw1", Role::Staff), ("amy", "s3cret", Role::Student), ("root2", "x", Role::Admin)] {
            provision(&mut conn, &admin(), u, p, r.as_str()).expect("provision");
            assert_eq!(authenticate(&conn, u, p).ok(), Some(r));
        }
    }

    #[test]
    fn provision_enforces_rules() {
        let ws = temp_workspace("studentd-auth-provision-rules");
        let mut conn = db::connect(&ws).expect("connect");

        let staff = Session::new("bob", Role::Staff);
        assert!(matches!(
            provision(&mut conn, &staff, "eve", "pw", "student"),
            Err(StoreError::Permission(_))
        ));
        assert!(matches!(
            provision(&mut conn, &admin(), "", "pw", "student"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            provision(&mut conn, &admin(), "eve", " ", "student"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            provision(&mut conn, &admin(), "eve", "pw", "owner"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            provision(&mut conn, &admin(), "admin", "pw", "staff"),
            Err(StoreError::Conflict(_))
        ));
        // The failed duplicate must not touch the existing admin credential.
        assert_eq!(authenticate(&conn, "admin", "admin123").ok(), Some(Role::Admin));
    }
}
