use crate::auth::AuthError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::{error, info, warn};

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(password) = req.params.get("password").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing password", None);
    };
    match state.gate.login(password) {
        Ok(token) => {
            info!("admin session opened");
            ok(&req.id, json!({ "success": true, "session": token }))
        }
        Err(AuthError::InvalidPassword) => {
            warn!("admin login failed");
            err(&req.id, "unauthorized", AuthError::InvalidPassword.to_string(), None)
        }
        Err(e) => {
            error!("admin login errored: {e}");
            err(&req.id, "auth_failed", e.to_string(), None)
        }
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let closed = req
        .session
        .as_deref()
        .map(|t| state.gate.logout(t))
        .unwrap_or(false);
    if closed {
        info!("admin session closed");
    }
    ok(&req.id, json!({ "success": true, "closed": closed }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "authenticated": state.is_admin(req) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
