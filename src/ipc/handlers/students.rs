use crate::calc;
use crate::ipc::error::{err, ledger_err, ok};
use crate::ipc::helpers::{no_workspace, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, NewStudent, StudentUpdate};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentRef {
    student_id: i64,
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    match ledger::list_active_students(conn) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let input: StudentRef = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let scored = match calc::student_score(conn, input.student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return ledger_err(&req.id, &e),
    };
    // Inactive students keep their score but hold no leaderboard position.
    let position = if scored.student.is_active {
        match calc::active_scores(conn) {
            Ok(all) => calc::position_of(&calc::rank_students(all), input.student_id),
            Err(e) => return ledger_err(&req.id, &e),
        }
    } else {
        None
    };
    let level = scored.student.level;
    ok(
        &req.id,
        json!({
            "student": scored,
            "position": position,
            "levelColor": level.color(),
            "levelBadge": level.badge(),
        }),
    )
}

fn handle_students_level_breakdown(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    match calc::level_breakdown(conn) {
        Ok(breakdown) => ok(&req.id, json!(breakdown)),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: NewStudent = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger::create_student(conn, &input) {
        Ok(student_id) => {
            info!(student_id, "student created");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Student created successfully!",
                    "studentId": student_id,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: StudentUpdate = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger::update_student(conn, &input) {
        Ok(()) => {
            info!(student_id = input.student_id, active = input.is_active, "student updated");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Student updated successfully!",
                    "studentId": input.student_id,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(req);
    };
    let input: StudentRef = match parse_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger::delete_student(conn, input.student_id) {
        Ok(mode) => {
            info!(student_id = input.student_id, ?mode, "student removed");
            ok(
                &req.id,
                json!({
                    "success": true,
                    "message": "Student removed successfully!",
                    "mode": mode,
                }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.levelBreakdown" => Some(handle_students_level_breakdown(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
