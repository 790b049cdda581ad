//! Task domain model and lifecycle state machine.
//!
//! A task enters the system on one of two paths:
//! - self-submitted by a user (`pending`, submitter set), or
//! - assigned by an admin (`assigned`, assignee and assigner set).
//!
//! Terminal states are `approved` and `rejected`; no transition leaves them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed enumeration of task kinds. Each kind carries a nominal point value
/// that seeds `Task::points` at creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ContentCreation,
    BugReport,
    FeatureRequest,
    CommunityHelp,
    Documentation,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::ContentCreation,
        TaskType::BugReport,
        TaskType::FeatureRequest,
        TaskType::CommunityHelp,
        TaskType::Documentation,
    ];

    /// Built-in nominal point value for this kind. The config file may
    /// override these per deployment.
    pub fn default_points(&self) -> i64 {
        match self {
            TaskType::ContentCreation => 50,
            TaskType::BugReport => 25,
            TaskType::FeatureRequest => 30,
            TaskType::CommunityHelp => 20,
            TaskType::Documentation => 40,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ContentCreation => "content_creation",
            TaskType::BugReport => "bug_report",
            TaskType::FeatureRequest => "feature_request",
            TaskType::CommunityHelp => "community_help",
            TaskType::Documentation => "documentation",
        }
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "content_creation" => Ok(TaskType::ContentCreation),
            "bug_report" => Ok(TaskType::BugReport),
            "feature_request" => Ok(TaskType::FeatureRequest),
            "community_help" => Ok(TaskType::CommunityHelp),
            "documentation" => Ok(TaskType::Documentation),
            other => Err(Error::Validation(format!(
                "unknown task type '{other}' (expected one of: content_creation, bug_report, feature_request, community_help, documentation)"
            ))),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Exactly one per task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Approved,
    Rejected,
}

impl TaskStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Rejected)
    }

    /// Statuses from which the assignee may mark the task completed.
    pub fn completable(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }

    /// Statuses an admin review may act on: anything not yet terminal.
    pub fn reviewable(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            other => Err(Error::Validation(format!("unknown task status '{other}'"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review outcome requested by an admin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn status(&self) -> TaskStatus {
        match self {
            ReviewDecision::Approved => TaskStatus::Approved,
            ReviewDecision::Rejected => TaskStatus::Rejected,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "approved" | "approve" => Ok(ReviewDecision::Approved),
            "rejected" | "reject" => Ok(ReviewDecision::Rejected),
            other => Err(Error::Validation(format!(
                "unknown decision '{other}' (expected approved or rejected)"
            ))),
        }
    }
}

/// A unit of work with a type, point value, and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Nominal value fixed at creation (type table, or admin override on
    /// assignment). Never touched by review.
    pub points: i64,
    /// Value actually credited at review time; may differ from `points`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// The account that receives points when this task is approved:
    /// the submitter on the self-submitted path, the assignee otherwise.
    pub fn award_recipient(&self) -> Option<&str> {
        self.submitted_by
            .as_deref()
            .or(self.assigned_to.as_deref())
    }
}

/// Payload for the self-submission path.
#[derive(Debug, Clone)]
pub struct SubmitTask {
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
}

/// Payload for the admin-assignment path.
#[derive(Debug, Clone)]
pub struct AssignTask {
    pub assignee: String,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    /// Admin override for the nominal point value.
    pub points: Option<i64>,
    pub deadline: DateTime<Utc>,
}

/// Payload for an admin review.
#[derive(Debug, Clone)]
pub struct ReviewTask {
    pub task_id: String,
    pub decision: ReviewDecision,
    /// Overrides the task's nominal value when set.
    pub awarded_points: Option<i64>,
    pub rejection_reason: Option<String>,
}

/// Reject empty or whitespace-only required text fields.
pub fn require_field(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Parse a deadline from CLI input: RFC 3339, or a bare `YYYY-MM-DD`
/// (interpreted as end of that day, UTC).
pub fn parse_deadline(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("deadline must not be empty".to_string()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let end_of_day = date.and_hms_opt(23, 59, 59).expect("valid wall clock");
        return Ok(DateTime::from_naive_utc_and_offset(end_of_day, Utc));
    }

    Err(Error::Validation(format!(
        "deadline '{trimmed}' is not RFC 3339 or YYYY-MM-DD"
    )))
}
