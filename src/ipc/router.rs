use tracing::{debug, warn};

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

/// Methods that change data or expose admin-only figures.
const ADMIN_METHODS: &[&str] = &[
    "workspace.seed",
    "students.create",
    "students.update",
    "students.delete",
    "activities.create",
    "activities.update",
    "activities.delete",
    "points.add",
    "dashboard.stats",
];

pub fn requires_admin(method: &str) -> bool {
    ADMIN_METHODS.contains(&method)
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");

    if requires_admin(&req.method) && !state.is_admin(&req) {
        warn!(method = %req.method, "rejected admin request without a valid session");
        return err(&req.id, "unauthorized", "admin session required", None);
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::activities::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::points::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::ranking::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
