use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const ADMIN_PASSWORD: &str = "test-admin-secret";

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

struct Sidecar {
    _child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    session: Option<String>,
    seq: u64,
}

impl Sidecar {
    fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_rankd");
        let mut child = Command::new(exe)
            .env("RANKD_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .env_remove("RANKD_WORKSPACE")
            .env_remove("RANKD_TOP_PERFORMER_THRESHOLD")
            .env_remove("RANKD_MAX_POINTS_AWARDED")
            .env_remove("RANKD_SESSION_TTL_HOURS")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn rankd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            _child: child,
            stdin,
            reader: BufReader::new(stdout),
            session: None,
            seq: 0,
        }
    }

    fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.seq += 1;
        let id = self.seq.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
            "session": self.session,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    fn open_workspace(&mut self, prefix: &str) -> PathBuf {
        let workspace = temp_dir(prefix);
        let _ = self.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        workspace
    }

    fn login(&mut self) {
        let res = self.request_ok("auth.login", json!({ "password": ADMIN_PASSWORD }));
        let token = res
            .get("session")
            .and_then(|v| v.as_str())
            .expect("session token")
            .to_string();
        self.session = Some(token);
    }

    fn create_student(&mut self, name: &str, points: i64) -> i64 {
        self.request_ok("students.create", json!({ "name": name, "points": points }))
            .get("studentId")
            .and_then(|v| v.as_i64())
            .expect("studentId")
    }

    fn create_activity(&mut self, description: &str, point_value: i64) -> i64 {
        self.request_ok(
            "activities.create",
            json!({ "description": description, "pointValue": point_value }),
        )
        .get("activityId")
        .and_then(|v| v.as_i64())
        .expect("activityId")
    }
}

fn ranking_rows(sidecar: &mut Sidecar) -> (serde_json::Value, Vec<serde_json::Value>) {
    let board = sidecar.request_ok("ranking.get", json!({}));
    let rows = board
        .get("ranking")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("ranking");
    (board, rows)
}

fn ids(rows: &[serde_json::Value]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).expect("id"))
        .collect()
}

#[test]
fn ranking_sorts_by_calculated_points_with_id_tie_break() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-ranking-ties");
    sidecar.login();

    let a = sidecar.create_student("A", 10);
    let b = sidecar.create_student("B", 30);
    let c = sidecar.create_student("C", 10);
    let d = sidecar.create_student("D", 0);
    let act = sidecar.create_activity("Checking Out", 20);
    // D: running total 20 + ledger 20 = 40, overtaking B on calculated points only.
    let _ = sidecar.request_ok("points.add", json!({ "studentId": d, "activityId": act }));

    let (_, rows) = ranking_rows(&mut sidecar);
    assert_eq!(ids(&rows), vec![d, b, a, c]);

    let scores: Vec<i64> = rows
        .iter()
        .map(|r| r.get("calculatedPoints").and_then(|v| v.as_i64()).expect("score"))
        .collect();
    assert_eq!(scores, vec![40, 30, 10, 10]);
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1]);
    }

    let positions: Vec<i64> = rows
        .iter()
        .map(|r| r.get("position").and_then(|v| v.as_i64()).expect("position"))
        .collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);
    assert_eq!(rows[0].get("podium").and_then(|v| v.as_str()), Some("🥇"));
    assert_eq!(rows[3].get("podium").and_then(|v| v.as_str()), Some("4º"));
    assert_eq!(rows[0].get("levelBadge").and_then(|v| v.as_str()), Some("💫"));

    let pos_c = sidecar
        .request_ok("students.get", json!({ "studentId": c }))
        .get("position")
        .and_then(|v| v.as_i64());
    assert_eq!(pos_c, Some(4));
}

#[test]
fn cohorts_and_stats_follow_threshold() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-ranking-cohorts");
    sidecar.login();

    let star = sidecar.create_student("Star", 700);
    let _near = sidecar.create_student("Near", 699);
    let _low = sidecar.create_student("Low", 1);

    let (board, rows) = ranking_rows(&mut sidecar);
    assert_eq!(rows.len(), 3);

    let top3 = board.get("top3").and_then(|v| v.as_array()).expect("top3");
    assert_eq!(ids(top3), ids(&rows));

    let performers = board
        .get("topPerformers")
        .and_then(|v| v.as_array())
        .expect("topPerformers");
    assert_eq!(ids(performers), vec![star]);

    let stats = board.get("stats").expect("stats");
    assert_eq!(stats.get("totalStudents").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(stats.get("topPerformers").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(stats.get("topPerformerThreshold").and_then(|v| v.as_i64()), Some(700));
    // (700 + 699 + 1) / 3 = 466.67
    assert_eq!(stats.get("averagePoints").and_then(|v| v.as_i64()), Some(467));
}

#[test]
fn inactive_students_leave_the_leaderboard() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-ranking-inactive");
    sidecar.login();

    let keep = sidecar.create_student("Keep", 5);
    let hide = sidecar.create_student("Hide", 50);
    let _ = sidecar.request_ok(
        "students.update",
        json!({
            "studentId": hide,
            "name": "Hide",
            "level": "Advanced",
            "points": 50,
            "isActive": false
        }),
    );
    let (board, rows) = ranking_rows(&mut sidecar);
    assert_eq!(ids(&rows), vec![keep]);
    assert_eq!(
        board
            .get("stats")
            .and_then(|s| s.get("totalStudents"))
            .and_then(|v| v.as_i64()),
        Some(1)
    );

    let hidden = sidecar.request_ok("students.get", json!({ "studentId": hide }));
    assert!(hidden.get("position").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn empty_workspace_ranks_nobody() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-ranking-empty");
    let (board, rows) = ranking_rows(&mut sidecar);
    assert!(rows.is_empty());
    assert_eq!(
        board
            .get("stats")
            .and_then(|s| s.get("averagePoints"))
            .and_then(|v| v.as_i64()),
        Some(0)
    );
}
