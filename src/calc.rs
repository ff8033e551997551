use crate::ledger::{self, LedgerResult, RecentEntry, Student, STUDENT_COLUMNS};
use crate::level::{podium_label, Level};
use rusqlite::Connection;
use serde::Serialize;
use std::cmp::Ordering;

/// Entries shown on the dashboard activity feed.
pub const DASHBOARD_RECENT_ENTRIES: usize = 5;

/// Sum of `points_awarded` over a student's ledger entries; 0 when empty.
pub fn ledger_total<I>(entries: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    entries.into_iter().fold(0, i64::saturating_add)
}

/// Displayed and ranked score: the student's running total plus the ledger
/// total. `add_points` already folds each award into the running total, so
/// every awarded point counts twice here. Kept as is; rankings depend on it.
/// Saturates instead of overflowing.
pub fn compute_score(running_total: i64, ledger_total: i64) -> i64 {
    running_total.saturating_add(ledger_total)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredStudent {
    #[serde(flatten)]
    pub student: Student,
    pub ledger_points: i64,
    pub calculated_points: i64,
}

impl ScoredStudent {
    pub fn new(student: Student, ledger_points: i64) -> Self {
        let calculated_points = compute_score(student.points, ledger_points);
        Self {
            student,
            ledger_points,
            calculated_points,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    /// 1-based; distinct even when scores tie.
    pub position: usize,
    pub podium: String,
    pub level_color: &'static str,
    pub level_badge: &'static str,
    #[serde(flatten)]
    pub scored: ScoredStudent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStats {
    pub total_students: usize,
    pub average_points: i64,
    pub top_performers: usize,
    pub top_performer_threshold: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub ranking: Vec<RankedStudent>,
    pub top3: Vec<RankedStudent>,
    pub top_performers: Vec<RankedStudent>,
    pub stats: LeaderboardStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_activities: i64,
    pub total_points: i64,
    pub average_points: i64,
    pub recent_entries: Vec<RecentEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelBreakdown {
    pub beginner: i64,
    pub elementary: i64,
    pub intermediate: i64,
    pub advanced: i64,
    /// The student list page groups the two entry levels together.
    pub elementary_or_beginner: i64,
}

/// Calculated scores for every active student, in store order
/// (`points DESC, id ASC`). Soft-deleted students are left out, but entries
/// of inactive activities still count.
pub fn active_scores(conn: &Connection) -> LedgerResult<Vec<ScoredStudent>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS}, COALESCE(SUM(pe.points_awarded), 0)
         FROM students s
         LEFT JOIN point_entries pe ON pe.student_id = s.id
         WHERE s.is_active = 1
         GROUP BY s.id
         ORDER BY s.points DESC, s.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let student = ledger::student_from_row(row)?;
            let ledger_points: i64 = row.get(7)?;
            Ok(ScoredStudent::new(student, ledger_points))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// One student's calculated score, active or not.
pub fn student_score(conn: &Connection, student_id: i64) -> LedgerResult<Option<ScoredStudent>> {
    let Some(student) = ledger::get_student(conn, student_id)? else {
        return Ok(None);
    };
    let mut stmt = conn.prepare("SELECT points_awarded FROM point_entries WHERE student_id = ?")?;
    let awarded = stmt
        .query_map([student_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(ScoredStudent::new(student, ledger_total(awarded))))
}

fn rank_order(a: &ScoredStudent, b: &ScoredStudent) -> Ordering {
    b.calculated_points
        .cmp(&a.calculated_points)
        .then_with(|| a.student.id.cmp(&b.student.id))
}

/// Orders by calculated points descending, ties by id ascending (creation
/// order), and numbers positions `1..=N` with no shared ranks.
pub fn rank_students(mut scored: Vec<ScoredStudent>) -> Vec<RankedStudent> {
    scored.sort_by(rank_order);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let position = i + 1;
            RankedStudent {
                position,
                podium: podium_label(position),
                level_color: s.student.level.color(),
                level_badge: s.student.level.badge(),
                scored: s,
            }
        })
        .collect()
}

fn rounded_average(total: i64, count: i64) -> i64 {
    if count <= 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as i64
}

pub fn build_leaderboard(scored: Vec<ScoredStudent>, top_performer_threshold: i64) -> Leaderboard {
    let ranking = rank_students(scored);
    let total = ranking
        .iter()
        .map(|r| r.scored.calculated_points)
        .fold(0, i64::saturating_add);
    let top_performers: Vec<RankedStudent> = ranking
        .iter()
        .filter(|r| r.scored.calculated_points >= top_performer_threshold)
        .cloned()
        .collect();
    let stats = LeaderboardStats {
        total_students: ranking.len(),
        average_points: rounded_average(total, ranking.len() as i64),
        top_performers: top_performers.len(),
        top_performer_threshold,
    };
    Leaderboard {
        top3: ranking.iter().take(3).cloned().collect(),
        top_performers,
        ranking,
        stats,
    }
}

pub fn dashboard_stats(conn: &Connection) -> LedgerResult<DashboardStats> {
    let (total_students, total_activities, total_points): (i64, i64, i64) = conn.query_row(
        "SELECT
           (SELECT COUNT(*) FROM students WHERE is_active = 1),
           (SELECT COUNT(*) FROM point_activities WHERE is_active = 1),
           (SELECT COALESCE(SUM(points_awarded), 0) FROM point_entries)",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    Ok(DashboardStats {
        total_students,
        total_activities,
        total_points,
        average_points: rounded_average(total_points, total_students),
        recent_entries: ledger::recent_entries(conn, DASHBOARD_RECENT_ENTRIES)?,
    })
}

pub fn level_breakdown(conn: &Connection) -> LedgerResult<LevelBreakdown> {
    let mut out = LevelBreakdown {
        beginner: 0,
        elementary: 0,
        intermediate: 0,
        advanced: 0,
        elementary_or_beginner: 0,
    };
    let mut stmt =
        conn.prepare("SELECT level, COUNT(*) FROM students WHERE is_active = 1 GROUP BY level")?;
    let rows = stmt
        .query_map([], |r| {
            Ok((r.get::<_, Level>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (level, count) in rows {
        match level {
            Level::Beginner => out.beginner = count,
            Level::Elementary => out.elementary = count,
            Level::Intermediate => out.intermediate = count,
            Level::Advanced => out.advanced = count,
        }
    }
    out.elementary_or_beginner = out.elementary + out.beginner;
    Ok(out)
}

/// 1-based leaderboard position of a student; `None` when not ranked.
pub fn position_of(ranking: &[RankedStudent], student_id: i64) -> Option<usize> {
    ranking
        .iter()
        .find(|r| r.scored.student.id == student_id)
        .map(|r| r.position)
}
