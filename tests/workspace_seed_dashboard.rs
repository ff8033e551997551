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

}

fn names(list: &serde_json::Value, key: &str, field: &str) -> Vec<String> {
    list.get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.get(field).and_then(|n| n.as_str()).map(|s| s.to_string()))
        .collect()
}

fn student_id(sidecar: &mut Sidecar, name: &str) -> i64 {
    sidecar
        .request_ok("students.list", json!({}))
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.get("name").and_then(|v| v.as_str()) == Some(name))
        .and_then(|s| s.get("id").and_then(|v| v.as_i64()))
        .expect("student id")
}

fn activity_id(sidecar: &mut Sidecar, description: &str) -> i64 {
    sidecar
        .request_ok("activities.list", json!({}))
        .get("activities")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .find(|a| a.get("description").and_then(|v| v.as_str()) == Some(description))
        .and_then(|a| a.get("id").and_then(|v| v.as_i64()))
        .expect("activity id")
}

#[test]
fn seed_populates_once_and_lists_are_ordered() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-seed");
    sidecar.login();

    let first = sidecar.request_ok("workspace.seed", json!({}));
    assert_eq!(first.get("skipped").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(first.get("insertedActivities").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(first.get("insertedStudents").and_then(|v| v.as_i64()), Some(7));

    let second = sidecar.request_ok("workspace.seed", json!({}));
    assert_eq!(second.get("skipped").and_then(|v| v.as_bool()), Some(true));

    let activities = sidecar.request_ok("activities.list", json!({}));
    let descriptions = names(&activities, "activities", "description");
    assert_eq!(descriptions.len(), 10);
    let mut sorted = descriptions.clone();
    sorted.sort();
    assert_eq!(descriptions, sorted);

    let students = sidecar.request_ok("students.list", json!({}));
    let student_names = names(&students, "students", "name");
    assert_eq!(
        student_names,
        vec![
            "Emanuel",
            "Ana Clara",
            "Enzo",
            "Louise",
            "Manuella Madoglio",
            "Henzo",
            "Manuela Marques",
        ]
    );
}

#[test]
fn dashboard_stats_and_recent_feed() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-dashboard");
    sidecar.login();
    let _ = sidecar.request_ok("workspace.seed", json!({}));

    let ana = student_id(&mut sidecar, "Ana Clara");
    let henzo = student_id(&mut sidecar, "Henzo");
    let checking_out = activity_id(&mut sidecar, "Checking Out");
    let week_bonus = activity_id(&mut sidecar, "Week Bonus");

    let _ = sidecar.request_ok(
        "points.add",
        json!({ "studentId": ana, "activityId": checking_out }),
    );
    let _ = sidecar.request_ok(
        "points.add",
        json!({ "studentId": henzo, "activityId": week_bonus, "notes": "perfect week" }),
    );

    let stats = sidecar.request_ok("dashboard.stats", json!({}));
    assert_eq!(stats.get("totalStudents").and_then(|v| v.as_i64()), Some(7));
    assert_eq!(stats.get("totalActivities").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(stats.get("totalPoints").and_then(|v| v.as_i64()), Some(60));
    // round(60 / 7) = 9
    assert_eq!(stats.get("averagePoints").and_then(|v| v.as_i64()), Some(9));

    let recent = stats
        .get("recentEntries")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("recentEntries");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].get("studentName").and_then(|v| v.as_str()), Some("Henzo"));
    assert_eq!(recent[0].get("notes").and_then(|v| v.as_str()), Some("perfect week"));
    assert_eq!(
        recent[1].get("activityDescription").and_then(|v| v.as_str()),
        Some("Checking Out")
    );

    let limited = sidecar.request_ok("points.recent", json!({ "limit": 1 }));
    assert_eq!(
        limited.get("entries").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
}

#[test]
fn level_breakdown_counts_active_students() {
    let mut sidecar = Sidecar::spawn();
    sidecar.open_workspace("rankd-levels");
    sidecar.login();
    let _ = sidecar.request_ok("workspace.seed", json!({}));

    let emanuel = student_id(&mut sidecar, "Emanuel");
    let _ = sidecar.request_ok(
        "students.update",
        json!({
            "studentId": emanuel,
            "name": "Emanuel",
            "level": "advanced",
            "points": 70,
            "isActive": true
        }),
    );
    let got = sidecar.request_ok("students.get", json!({ "studentId": emanuel }));
    assert_eq!(got.get("levelBadge").and_then(|v| v.as_str()), Some("🌟"));
    assert_eq!(got.get("levelColor").and_then(|v| v.as_str()), Some("primary"));

    let breakdown = sidecar.request_ok("students.levelBreakdown", json!({}));
    assert_eq!(breakdown.get("advanced").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(breakdown.get("beginner").and_then(|v| v.as_i64()), Some(6));
    assert_eq!(breakdown.get("intermediate").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        breakdown.get("elementaryOrBeginner").and_then(|v| v.as_i64()),
        Some(6)
    );
}
