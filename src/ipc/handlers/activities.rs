use crate::ipc::error::{err, ledger_err, ok};
use crate::ipc::helpers::{no_workspace, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, ActivityUpdate, NewActivity};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRef {
    activity_id: i64,
}

fn handle_activities_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    match ledger::list_active_activities(conn) {
        Ok(activities) => ok(&req.id, json!({ "activities": activities })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_activities_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let input: ActivityRef = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ledger::get_activity(conn, input.activity_id) {
        Ok(Some(activity)) => ok(&req.id, json!({ "activity": activity })),
        Ok(None) => err(&req.id, "not_found", "activity not found", None),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_activities_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: NewActivity = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ledger::create_activity(conn, &input) {
        Ok(activity_id) => {
            info!(activity_id, point_value = input.point_value, "activity created");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Activity created successfully!",
                    "activityId": activity_id,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_activities_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: ActivityUpdate = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ledger::update_activity(conn, &input) {
        Ok(()) => {
            info!(activity_id = input.activity_id, "activity updated");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Activity updated successfully!",
                    "activityId": input.activity_id,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_activities_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: ActivityRef = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ledger::delete_activity(conn, input.activity_id) {
        Ok(mode) => {
            info!(activity_id = input.activity_id, ?mode, "activity removed");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Activity removed successfully!",
                    "mode": mode,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "activities.list" => Some(handle_activities_list(state, req)),
        "activities.get" => Some(handle_activities_get(state, req)),
        "activities.create" => Some(handle_activities_create(state, req)),
        "activities.update" => Some(handle_activities_update(state, req)),
        "activities.delete" => Some(handle_activities_delete(state, req)),
        _ => None,
    }
}
