use crate::calc;
use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::no_workspace;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_ranking_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let threshold = state.config.top_performer_threshold;
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    match calc::active_scores(conn) {
        Ok(scored) => ok(&req.id, json!(calc::build_leaderboard(scored, threshold))),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    match calc::dashboard_stats(conn) {
        Ok(stats) => ok(&req.id, json!(stats)),
        Err(e) => ledger_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ranking.get" => Some(handle_ranking_get(state, req)),
        "dashboard.stats" => Some(handle_dashboard_stats(state, req)),
        _ => None,
    }
}
