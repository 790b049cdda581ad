//! Relational store for users and tasks.
//!
//! A thin layer over SQLite: schema creation, row mapping, and the small set
//! of guarded write paths the lifecycle engine is allowed to use. Status
//! transitions are compare-and-set (`WHERE ... AND status IN (...)`) so a
//! concurrent second writer loses cleanly instead of racing, and the approve
//! path updates the task row and credits the recipient inside one immediate
//! transaction.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::{Error, Result};
use crate::stats::LeaderboardEntry;
use crate::task::{Task, TaskStatus, TaskType};
use crate::user::{Role, User};

/// Database file name inside the data directory
pub const DB_FILENAME: &str = "merit.db";

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('user', 'admin')),
    total_points  INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    description      TEXT NOT NULL,
    task_type        TEXT NOT NULL,
    status           TEXT NOT NULL,
    points           INTEGER NOT NULL,
    awarded_points   INTEGER,
    submitted_by     TEXT REFERENCES users(id),
    assigned_to      TEXT REFERENCES users(id),
    assigned_by      TEXT REFERENCES users(id),
    reviewed_by      TEXT REFERENCES users(id),
    rejection_reason TEXT,
    proof_file       TEXT,
    deadline         TEXT,
    created_at       TEXT NOT NULL,
    reviewed_at      TEXT,
    completed_at     TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_submitted_by ON tasks(submitted_by);
CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to);
";

const TASK_COLUMNS: &str = "id, title, description, task_type, status, points, awarded_points, \
     submitted_by, assigned_to, assigned_by, reviewed_by, rejection_reason, proof_file, \
     deadline, created_at, reviewed_at, completed_at";

/// Store over a single SQLite connection. Open one per thread; the database
/// file is safe to share across connections (WAL + busy timeout).
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (and if necessary create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open the store inside a data directory, using the standard file name.
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        Self::open(&dir.join(DB_FILENAME))
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns a row, so pragma_update would error out
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO users (id, username, password_hash, role, total_points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.total_points,
                user.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::DuplicateUsername(user.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, password_hash, role, total_points, created_at
                 FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, password_hash, role, total_points, created_at
                 FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Ids of every admin account, for submit-notification fan-out.
    pub fn admin_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE role = 'admin' ORDER BY username")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"),
            params![
                task.id,
                task.title,
                task.description,
                task.task_type.as_str(),
                task.status.as_str(),
                task.points,
                task.awarded_points,
                task.submitted_by,
                task.assigned_to,
                task.assigned_by,
                task.reviewed_by,
                task.rejection_reason,
                task.proof_file,
                task.deadline.map(|ts| ts.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.reviewed_at.map(|ts| ts.to_rfc3339()),
                task.completed_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn task_by_id(&self, id: &str) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn tasks_submitted_by(&self, user_id: &str) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE submitted_by = ?1
                 ORDER BY created_at DESC, id"
            ),
            params![user_id],
        )
    }

    pub fn tasks_assigned_to(&self, user_id: &str) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE assigned_to = ?1
                 ORDER BY created_at DESC, id"
            ),
            params![user_id],
        )
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1
                 ORDER BY created_at, id"
            ),
            params![status.as_str()],
        )
    }

    fn query_tasks(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tasks = stmt
            .query_map(args, task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    // =========================================================================
    // Guarded transitions
    // =========================================================================

    /// assigned -> in_progress for the task's assignee. Returns false when
    /// the row did not match (wrong owner or wrong status).
    pub fn mark_started(&self, task_id: &str, assignee_id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = 'in_progress'
             WHERE id = ?1 AND assigned_to = ?2 AND status = 'assigned'",
            params![task_id, assignee_id],
        )?;
        Ok(changed == 1)
    }

    /// {assigned, in_progress} -> completed for the task's assignee.
    pub fn mark_completed(
        &self,
        task_id: &str,
        assignee_id: &str,
        completed_at: DateTime<Utc>,
        proof_file: Option<&str>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = 'completed', completed_at = ?1,
                 proof_file = COALESCE(?2, proof_file)
             WHERE id = ?3 AND assigned_to = ?4 AND status IN ('assigned', 'in_progress')",
            params![completed_at.to_rfc3339(), proof_file, task_id, assignee_id],
        )?;
        Ok(changed == 1)
    }

    /// Apply a review decision: set the terminal status and, on approval,
    /// credit the recipient's total, as a single atomic unit. The status
    /// predicate makes re-review lose the race: if another reviewer got there
    /// first the UPDATE matches no row and the transaction rolls back,
    /// returning false without touching any points.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_review(
        &mut self,
        task_id: &str,
        reviewer_id: &str,
        status: TaskStatus,
        awarded_points: i64,
        rejection_reason: Option<&str>,
        reviewed_at: DateTime<Utc>,
        recipient_id: Option<&str>,
    ) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE tasks SET status = ?1, reviewed_by = ?2, reviewed_at = ?3,
                 awarded_points = ?4, rejection_reason = ?5
             WHERE id = ?6 AND status NOT IN ('approved', 'rejected')",
            params![
                status.as_str(),
                reviewer_id,
                reviewed_at.to_rfc3339(),
                awarded_points,
                rejection_reason,
                task_id,
            ],
        )?;

        if changed == 0 {
            // dropped transaction rolls back
            return Ok(false);
        }

        if status == TaskStatus::Approved {
            if let Some(recipient) = recipient_id {
                tx.execute(
                    "UPDATE users SET total_points = total_points + ?1 WHERE id = ?2",
                    params![awarded_points, recipient],
                )?;
            }
        }

        tx.commit()?;
        Ok(true)
    }

    // =========================================================================
    // Read-side projections
    // =========================================================================

    /// Top accounts with role=user, points descending. Exact-point ties are
    /// ordered by username for stable output; callers must not treat that as
    /// a ranking guarantee.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, total_points FROM users WHERE role = 'user'
             ORDER BY total_points DESC, username ASC LIMIT ?1",
        )?;
        let mut entries = Vec::new();
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for (position, row) in rows.enumerate() {
            let (user_id, username, total_points) = row?;
            entries.push(LeaderboardEntry {
                rank: position as u64 + 1,
                user_id,
                username,
                total_points,
            });
        }
        Ok(entries)
    }

    /// 1-based rank for a point total: one plus the number of role=user
    /// accounts strictly above it. Exact ties share a rank.
    pub fn rank_for_points(&self, total_points: i64) -> Result<u64> {
        let above: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'user' AND total_points > ?1",
            params![total_points],
            |row| row.get(0),
        )?;
        Ok(above as u64 + 1)
    }

    /// Count of a user's own tasks (submitted or assigned) in a status.
    pub fn count_user_tasks(&self, user_id: &str, status: TaskStatus) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks
             WHERE (submitted_by = ?1 OR assigned_to = ?1) AND status = ?2",
            params![user_id, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_tasks(&self, status: TaskStatus) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Review timestamps of all approved tasks, for the approved-today stat.
    pub fn approved_review_times(&self) -> Result<Vec<DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(
            "SELECT reviewed_at FROM tasks
             WHERE status = 'approved' AND reviewed_at IS NOT NULL",
        )?;
        let times = stmt
            .query_map([], |row| parse_timestamp(row.get::<_, String>(0)?))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(times)
    }

    /// Sum of total points across role=user accounts.
    pub fn points_distributed(&self) -> Result<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_points), 0) FROM users WHERE role = 'user'",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn count_users(&self, role: Role) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: parse_with(row.get::<_, String>(3)?, 3)?,
        total_points: row.get(4)?,
        created_at: parse_timestamp(row.get::<_, String>(5)?)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        task_type: parse_with(row.get::<_, String>(3)?, 3)?,
        status: parse_with(row.get::<_, String>(4)?, 4)?,
        points: row.get(5)?,
        awarded_points: row.get(6)?,
        submitted_by: row.get(7)?,
        assigned_to: row.get(8)?,
        assigned_by: row.get(9)?,
        reviewed_by: row.get(10)?,
        rejection_reason: row.get(11)?,
        proof_file: row.get(12)?,
        deadline: row
            .get::<_, Option<String>>(13)?
            .map(parse_timestamp)
            .transpose()?,
        created_at: parse_timestamp(row.get::<_, String>(14)?)?,
        reviewed_at: row
            .get::<_, Option<String>>(15)?
            .map(parse_timestamp)
            .transpose()?,
        completed_at: row
            .get::<_, Option<String>>(16)?
            .map(parse_timestamp)
            .transpose()?,
    })
}

fn parse_timestamp(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
        })
}

fn parse_with<T>(raw: String, column: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    raw.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string(),
            )),
        )
    })
}
