use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::Session;
use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the sidecar remembers between requests. The database itself is
/// opened per request from `workspace`.
pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            workspace: None,
            session: None,
        }
    }
}
