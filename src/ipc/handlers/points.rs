use crate::ipc::error::{err, ledger_err, ok};
use crate::ipc::helpers::{no_workspace, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, PointAward};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const DEFAULT_RECENT_LIMIT: usize = 10;
const MAX_RECENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentRef {
    student_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RecentParams {
    #[serde(default)]
    limit: Option<i64>,
}

fn handle_points_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let max_points = state.config.max_points_awarded;
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let award: PointAward = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger::add_points(conn, &award, max_points) {
        Ok(receipt) => {
            info!(
                entry_id = receipt.entry_id,
                student_id = receipt.student_id,
                activity_id = receipt.activity_id,
                points = receipt.points_awarded,
                "points awarded"
            );
            let message = format!(
                "+{} points added for {}!",
                receipt.points_awarded, receipt.student_name
            );
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": message,
                    "entryId": receipt.entry_id,
                    "studentId": receipt.student_id,
                    "studentName": receipt.student_name,
                    "activityId": receipt.activity_id,
                    "activityDescription": receipt.activity_description,
                    "pointsAwarded": receipt.points_awarded,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_points_list_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let input: StudentRef = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match ledger::get_student(conn, input.student_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return ledger_err(&req.id, &e),
    }
    match ledger::entries_for_student(conn, input.student_id) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_points_recent(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let input: RecentParams = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let limit = input
        .limit
        .map(|l| l.clamp(1, MAX_RECENT_LIMIT as i64) as usize)
        .unwrap_or(DEFAULT_RECENT_LIMIT);
    match ledger::recent_entries(conn, limit) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "points.add" => Some(handle_points_add(state, req)),
        "points.listByStudent" => Some(handle_points_list_by_student(state, req)),
        "points.recent" => Some(handle_points_recent(state, req)),
        _ => None,
    }
}
