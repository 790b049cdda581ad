//! Read-side projections: leaderboard, user stats, admin stats.
//!
//! None of these maintain state of their own; every number is computed from
//! the users/tasks tables at query time.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::store::Store;
use crate::task::TaskStatus;
use crate::user::{Role, User};

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: String,
    pub username: String,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: String,
    pub username: String,
    pub total_points: i64,
    pub completed_tasks: u64,
    pub pending_tasks: u64,
    /// 1-based; accounts with equal points share a rank.
    pub rank: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub pending_tasks: u64,
    pub approved_today: u64,
    pub points_distributed: i64,
    /// Count of role=user accounts; no recency filter is applied.
    pub active_users: u64,
}

pub fn leaderboard(store: &Store, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    store.leaderboard(limit)
}

pub fn user_stats(store: &Store, user: &User) -> Result<UserStats> {
    Ok(UserStats {
        user_id: user.id.clone(),
        username: user.username.clone(),
        total_points: user.total_points,
        completed_tasks: store.count_user_tasks(&user.id, TaskStatus::Approved)?,
        pending_tasks: store.count_user_tasks(&user.id, TaskStatus::Pending)?,
        rank: store.rank_for_points(user.total_points)?,
    })
}

pub fn admin_stats(store: &Store) -> Result<AdminStats> {
    Ok(AdminStats {
        pending_tasks: store.count_tasks(TaskStatus::Pending)?,
        approved_today: approved_today(store, Local::now().with_timezone(&Utc))?,
        points_distributed: store.points_distributed()?,
        active_users: store.count_users(Role::User)?,
    })
}

/// Count approvals whose review time falls on the same local calendar day
/// as `now`. The day boundary is the server's local timezone.
pub fn approved_today(store: &Store, now: DateTime<Utc>) -> Result<u64> {
    let today = now.with_timezone(&Local).date_naive();
    let count = store
        .approved_review_times()?
        .into_iter()
        .filter(|reviewed_at| reviewed_at.with_timezone(&Local).date_naive() == today)
        .count();
    Ok(count as u64)
}
