use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Student proficiency level. Declaration order is the ordering table:
/// Beginner < Elementary < Intermediate < Advanced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String")]
pub enum Level {
    #[default]
    Beginner,
    Elementary,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown level: {0:?} (expected Beginner, Elementary, Intermediate or Advanced)")]
pub struct ParseLevelError(pub String);

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Beginner,
        Level::Elementary,
        Level::Intermediate,
        Level::Advanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Elementary => "Elementary",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }

    /// Theme color token the UI uses for the level pill.
    pub fn color(self) -> &'static str {
        match self {
            Level::Advanced => "primary",
            Level::Intermediate => "secondary",
            Level::Elementary => "accent",
            Level::Beginner => "muted",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Level::Advanced => "🌟",
            Level::Intermediate => "⭐",
            Level::Elementary => "✨",
            Level::Beginner => "💫",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Level::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl TryFrom<String> for Level {
    type Error = ParseLevelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl ToSql for Level {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Level {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Leaderboard marker for a 1-based position: medals for the podium,
/// ordinal text for everyone else.
pub fn podium_label(position: usize) -> String {
    match position {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("{n}º"),
    }
}
