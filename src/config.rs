//! Environment-driven configuration

use std::path::PathBuf;

use crate::error::{PlannerError, Result};

pub const DEFAULT_PORT: u16 = 11400;
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaybookConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// When set, the CLI talks to a running server instead of the database
    pub api_url: Option<String>,
    pub owner_id: String,
    pub log_retention_days: u32,
}

/// `~/.daybook`, or `./.daybook` when there is no home directory
pub fn daybook_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".daybook"))
        .unwrap_or_else(|| PathBuf::from(".daybook"))
}

impl DaybookConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let db_path = non_empty_var("DAYBOOK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| daybook_home().join("daybook.db"));

        let port = match non_empty_var("DAYBOOK_PORT") {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };

        let api_url = non_empty_var("DAYBOOK_API_URL");

        let owner_id = non_empty_var("DAYBOOK_OWNER")
            .or_else(|| non_empty_var("USER"))
            .unwrap_or_else(|| "local".into());

        let log_retention_days = non_empty_var("DAYBOOK_LOG_RETENTION_DAYS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_LOG_RETENTION_DAYS);

        Ok(Self {
            db_path,
            port,
            api_url,
            owner_id,
            log_retention_days,
        })
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        api_url: Option<String>,
        owner_id: Option<String>,
        port: Option<u16>,
    ) -> Result<Self> {
        if let Some(db_path) = db_path {
            self.db_path = db_path;
        }
        if let Some(api_url) = api_url {
            self.api_url = Some(api_url);
        }
        if let Some(owner_id) = owner_id {
            if owner_id.trim().is_empty() {
                return Err(PlannerError::InvalidInput(
                    "Owner cannot be empty".to_string(),
                ));
            }
            self.owner_id = owner_id.trim().to_string();
        }
        if let Some(port) = port {
            self.port = port;
        }
        Ok(self)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .ok()
        .filter(|&port| port != 0)
        .ok_or_else(|| PlannerError::InvalidInput(format!("Invalid port: '{}'", raw)))
}
