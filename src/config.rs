use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "studentd=info";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const ENV_PREFIX: &str = "STUDENTD";

#[derive(Debug, Parser)]
#[command(name = "studentd", version, about = "Student records sidecar")]
struct Args {
    /// Workspace directory to open at startup (overrides STUDENTD_WORKSPACE).
    workspace: Option<String>,
}

/// `STUDENTD_*` variables, keyed without the prefix.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnvSettings {
    workspace: Option<String>,
    log: String,
    admin_password: String,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            workspace: None,
            log: DEFAULT_LOG_FILTER.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

/// Startup settings, read once from the environment and argv.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub admin_password: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let args = Args::parse();
        Self::from_sources(args, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(args: Args, env: config::Environment) -> anyhow::Result<Self> {
        let settings: EnvSettings = config::Config::builder()
            .add_source(env.ignore_empty(true))
            .build()
            .context("read STUDENTD_* environment")?
            .try_deserialize()
            .context("parse STUDENTD_* environment")?;

        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let workspace = non_blank(args.workspace)
            .or_else(|| non_blank(settings.workspace))
            .map(PathBuf::from);
        let log_filter =
            non_blank(Some(settings.log)).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        // The seed password is used verbatim; only a blank value falls back.
        let admin_password = Some(settings.admin_password)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

        Ok(Config {
            workspace,
            log_filter,
            admin_password,
        })
    }
}
