//! Task lifecycle engine.
//!
//! The single authority for creating tasks, validating and applying status
//! transitions, computing point awards, and authorizing actions by role.
//! All writes to task status, review fields, and user point totals go
//! through here; nothing else is a sanctioned write path.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::relay::{ConnectionRegistry, Notification};
use crate::stats::{self, AdminStats, LeaderboardEntry, UserStats};
use crate::store::Store;
use crate::task::{
    require_field, AssignTask, ReviewDecision, ReviewTask, SubmitTask, Task, TaskStatus,
};
use crate::user::{hash_password, NewUser, User};

pub struct Engine {
    store: Store,
    registry: Arc<ConnectionRegistry>,
    config: Config,
}

impl Engine {
    pub fn new(store: Store, registry: Arc<ConnectionRegistry>, config: Config) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register a new account. Usernames are unique and immutable; the role
    /// is fixed here for the account's lifetime.
    pub fn register_user(&self, new_user: NewUser) -> Result<User> {
        let username = require_field(&new_user.username, "username")?;
        if new_user.password.trim().is_empty() {
            return Err(Error::Validation("password must not be empty".to_string()));
        }

        let salt = Uuid::new_v4().simple().to_string();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: hash_password(&new_user.password, &salt),
            role: new_user.role,
            total_points: 0,
            created_at: Utc::now(),
        };
        self.store.insert_user(&user)?;
        debug!(username = %user.username, role = %user.role, "registered user");
        Ok(user)
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Self-submission path: any authenticated user, status starts at
    /// `pending`, nominal points come from the configured type table.
    pub fn submit_task(&self, submitter: &User, request: SubmitTask) -> Result<Task> {
        let title = require_field(&request.title, "title")?;
        let description = require_field(&request.description, "description")?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            task_type: request.task_type,
            status: TaskStatus::Pending,
            points: self.config.points.for_type(request.task_type),
            awarded_points: None,
            submitted_by: Some(submitter.id.clone()),
            assigned_to: None,
            assigned_by: None,
            reviewed_by: None,
            rejection_reason: None,
            proof_file: None,
            deadline: None,
            created_at: Utc::now(),
            reviewed_at: None,
            completed_at: None,
        };
        self.store.insert_task(&task)?;
        debug!(task_id = %task.id, task_type = %task.task_type, "task submitted");

        let admins = self.store.admin_ids()?;
        self.registry.broadcast(
            &admins,
            &Notification::TaskSubmitted {
                task_id: task.id.clone(),
                submitter_id: submitter.id.clone(),
                task_type: task.task_type,
                title: task.title.clone(),
            },
        );

        Ok(task)
    }

    /// Admin-assignment path: status starts at `assigned`, the submitter is
    /// absent, and the admin may override the nominal point value.
    pub fn assign_task(&self, assigner: &User, request: AssignTask) -> Result<Task> {
        assigner.role.require_admin("assign tasks")?;

        let title = require_field(&request.title, "title")?;
        let description = require_field(&request.description, "description")?;

        let assignee = self
            .store
            .user_by_username(&request.assignee)?
            .ok_or_else(|| {
                Error::Validation(format!("assignee '{}' does not exist", request.assignee))
            })?;

        let points = match request.points {
            Some(points) if points < 0 => {
                return Err(Error::Validation(format!(
                    "point override must not be negative (got {points})"
                )));
            }
            Some(points) => points,
            None => self.config.points.for_type(request.task_type),
        };

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            task_type: request.task_type,
            status: TaskStatus::Assigned,
            points,
            awarded_points: None,
            submitted_by: None,
            assigned_to: Some(assignee.id.clone()),
            assigned_by: Some(assigner.id.clone()),
            reviewed_by: None,
            rejection_reason: None,
            proof_file: None,
            deadline: Some(request.deadline),
            created_at: Utc::now(),
            reviewed_at: None,
            completed_at: None,
        };
        self.store.insert_task(&task)?;
        debug!(task_id = %task.id, assignee = %assignee.username, "task assigned");

        self.registry.send(
            &assignee.id,
            Notification::TaskAssigned {
                task_id: task.id.clone(),
                assignee_id: assignee.id.clone(),
                task_type: task.task_type,
                title: task.title.clone(),
                deadline: request.deadline,
            },
        );

        Ok(task)
    }

    /// assigned -> in_progress, by the assignee only.
    pub fn start_task(&self, caller: &User, task_id: &str) -> Result<Task> {
        let task = self.owned_assigned_task(caller, task_id)?;
        if task.status != TaskStatus::Assigned {
            return Err(Error::InvalidState {
                task_id: task.id,
                status: task.status,
                action: "started",
            });
        }

        if !self.store.mark_started(task_id, &caller.id)? {
            // Lost a race; report against the current row.
            return self.transition_conflict(caller, task_id, "started");
        }
        self.require_task(task_id)
    }

    /// {assigned, in_progress} -> completed, by the assignee only, with an
    /// optional proof-file reference.
    pub fn complete_task(
        &self,
        caller: &User,
        task_id: &str,
        proof_file: Option<String>,
    ) -> Result<Task> {
        let task = self.owned_assigned_task(caller, task_id)?;
        if !task.status.completable() {
            return Err(Error::InvalidState {
                task_id: task.id,
                status: task.status,
                action: "completed",
            });
        }

        if !self
            .store
            .mark_completed(task_id, &caller.id, Utc::now(), proof_file.as_deref())?
        {
            return self.transition_conflict(caller, task_id, "completed");
        }
        let task = self.require_task(task_id)?;
        debug!(task_id = %task.id, "task completed");

        if let Some(assigner_id) = task.assigned_by.as_deref() {
            self.registry.send(
                assigner_id,
                Notification::TaskCompleted {
                    task_id: task.id.clone(),
                    assigner_id: assigner_id.to_string(),
                    title: task.title.clone(),
                },
            );
        }

        Ok(task)
    }

    /// Admin review: the only path into a terminal state, and the only write
    /// path for point totals. Approval applies the status change and the
    /// point credit in one transaction; a task already terminal is rejected
    /// outright, so points are awarded at most once per task.
    pub fn review_task(&mut self, reviewer: &User, request: ReviewTask) -> Result<Task> {
        reviewer.role.require_admin("review tasks")?;

        let task = self.require_task(&request.task_id)?;
        if !task.status.reviewable() {
            return Err(Error::InvalidState {
                task_id: task.id,
                status: task.status,
                action: "reviewed",
            });
        }

        let (awarded_points, rejection_reason) = match request.decision {
            ReviewDecision::Approved => {
                // The award is whatever the reviewer grants, defaulting to
                // the task's nominal value; it is not recomputed from type.
                let points = request.awarded_points.unwrap_or(task.points);
                if points < 0 {
                    return Err(Error::Validation(format!(
                        "awarded points must not be negative (got {points})"
                    )));
                }
                (points, None)
            }
            ReviewDecision::Rejected => {
                let reason = request
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .ok_or_else(|| {
                        Error::Validation("rejection requires a non-empty reason".to_string())
                    })?;
                (0, Some(reason.to_string()))
            }
        };

        let status = request.decision.status();
        let recipient_id = task.award_recipient().map(str::to_string);

        let applied = self.store.apply_review(
            &request.task_id,
            &reviewer.id,
            status,
            awarded_points,
            rejection_reason.as_deref(),
            Utc::now(),
            recipient_id.as_deref(),
        )?;
        if !applied {
            // A concurrent review won; re-read for the terminal status.
            let current = self.require_task(&request.task_id)?;
            return Err(Error::InvalidState {
                task_id: current.id,
                status: current.status,
                action: "reviewed",
            });
        }

        let task = self.require_task(&request.task_id)?;
        debug!(task_id = %task.id, status = %task.status, points = awarded_points, "task reviewed");

        if let Some(recipient_id) = recipient_id {
            self.registry.send(
                &recipient_id,
                Notification::TaskReviewed {
                    task_id: task.id.clone(),
                    recipient_id: recipient_id.clone(),
                    status,
                    points: awarded_points,
                    title: task.title.clone(),
                    rejection_reason: task.rejection_reason.clone(),
                },
            );
        }

        Ok(task)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn my_tasks(&self, caller: &User) -> Result<Vec<Task>> {
        self.store.tasks_submitted_by(&caller.id)
    }

    pub fn assigned_tasks(&self, caller: &User) -> Result<Vec<Task>> {
        self.store.tasks_assigned_to(&caller.id)
    }

    pub fn pending_tasks(&self, caller: &User) -> Result<Vec<Task>> {
        caller.role.require_admin("list pending tasks")?;
        self.store.tasks_with_status(TaskStatus::Pending)
    }

    pub fn task(&self, caller: &User, task_id: &str) -> Result<Task> {
        let task = self.require_task(task_id)?;
        if caller.role.is_admin() || task_participant(&task, &caller.id) {
            Ok(task)
        } else {
            Err(Error::TaskNotFound(task_id.to_string()))
        }
    }

    pub fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        stats::leaderboard(&self.store, limit.unwrap_or(self.config.leaderboard.limit))
    }

    pub fn user_stats(&self, caller: &User) -> Result<UserStats> {
        stats::user_stats(&self.store, caller)
    }

    pub fn admin_stats(&self, caller: &User) -> Result<AdminStats> {
        caller.role.require_admin("view admin stats")?;
        stats::admin_stats(&self.store)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .task_by_id(task_id)?
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    /// Fetch a task for an assignee-only operation. A task that exists but
    /// belongs to someone else reads as not found, matching the ownership
    /// contract rather than leaking other users' tasks.
    fn owned_assigned_task(&self, caller: &User, task_id: &str) -> Result<Task> {
        let task = self.require_task(task_id)?;
        if task.assigned_to.as_deref() != Some(caller.id.as_str()) {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        Ok(task)
    }

    fn transition_conflict(&self, caller: &User, task_id: &str, action: &'static str) -> Result<Task> {
        let current = self.owned_assigned_task(caller, task_id)?;
        Err(Error::InvalidState {
            task_id: current.id,
            status: current.status,
            action,
        })
    }
}

fn task_participant(task: &Task, user_id: &str) -> bool {
    let matches_ref = |field: &Option<String>| field.as_deref() == Some(user_id);
    matches_ref(&task.submitted_by)
        || matches_ref(&task.assigned_to)
        || matches_ref(&task.assigned_by)
}
