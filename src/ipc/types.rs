use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::SessionGate;
use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Admin session token from `auth.login`.
    #[serde(default)]
    pub session: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub gate: Box<dyn SessionGate>,
}

impl AppState {
    pub fn new(config: Config, gate: Box<dyn SessionGate>) -> Self {
        Self {
            workspace: None,
            db: None,
            config,
            gate,
        }
    }

    pub fn is_admin(&self, req: &Request) -> bool {
        req.session
            .as_deref()
            .map(|t| self.gate.is_authenticated(t))
            .unwrap_or(false)
    }
}
