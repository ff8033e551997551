use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_TOP_PERFORMER_THRESHOLD: i64 = 700;
pub const DEFAULT_MAX_POINTS_AWARDED: i64 = 100;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone)]
pub struct Config {
    pub admin_password: String,
    pub top_performer_threshold: i64,
    pub max_points_awarded: i64,
    pub session_ttl_hours: i64,
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_password = match lookup("RANKD_ADMIN_PASSWORD") {
            Some(v) if !v.is_empty() => v,
            _ => {
                warn!("RANKD_ADMIN_PASSWORD not set, using the built-in default password");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let workspace = lookup("RANKD_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            admin_password,
            top_performer_threshold: try_load(
                &lookup,
                "RANKD_TOP_PERFORMER_THRESHOLD",
                DEFAULT_TOP_PERFORMER_THRESHOLD,
                |v| *v >= 0,
            ),
            max_points_awarded: try_load(
                &lookup,
                "RANKD_MAX_POINTS_AWARDED",
                DEFAULT_MAX_POINTS_AWARDED,
                |v| *v > 0,
            ),
            session_ttl_hours: try_load(
                &lookup,
                "RANKD_SESSION_TTL_HOURS",
                DEFAULT_SESSION_TTL_HOURS,
                |v| (1..=24 * 365).contains(v),
            ),
            workspace,
        }
    }
}

fn try_load<F, T, V>(lookup: &F, key: &str, default: T, valid: V) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
    T::Err: Display,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        Ok(v) => {
            warn!("{key}={v} is out of range, using default: {default}");
            default
        }
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }
    }
}
