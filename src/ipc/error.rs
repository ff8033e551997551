use serde_json::json;
use tracing::error;

use crate::ledger::LedgerError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a domain failure onto the wire. Store failures are logged here since
/// the caller only sees the message.
pub fn ledger_err(id: &str, e: &LedgerError) -> serde_json::Value {
    if let LedgerError::Internal(inner) = e {
        error!(request_id = id, error = %inner, "store operation failed");
    }
    err(id, e.code(), e.to_string(), None)
}
