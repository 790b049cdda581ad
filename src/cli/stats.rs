//! Read-side commands: leaderboard and stats projections.

use serde::Serialize;

use crate::cli::CommandContext;
use crate::error::Result;
use crate::output::{self, HumanOutput};
use crate::stats::LeaderboardEntry;

#[derive(Serialize)]
struct LeaderboardReport {
    count: usize,
    entries: Vec<LeaderboardEntry>,
}

pub(crate) fn leaderboard(ctx: &CommandContext, limit: Option<usize>) -> Result<()> {
    let engine = ctx.engine()?;
    // Readable by any authenticated account, so the caller must still resolve.
    let _caller = ctx.caller(&engine)?;
    let entries = engine.leaderboard(limit)?;

    let mut human = HumanOutput::new(format!("Leaderboard (top {})", entries.len()));
    for entry in &entries {
        human.push_detail(format!(
            "#{}  {}  {} points",
            entry.rank, entry.username, entry.total_points
        ));
    }

    let report = LeaderboardReport {
        count: entries.len(),
        entries,
    };
    output::emit_success(ctx.options, "leaderboard", &report, Some(&human))
}

pub(crate) fn user(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;
    let stats = engine.user_stats(&caller)?;

    let mut human = HumanOutput::new(format!("Stats for {}", stats.username));
    human.push_summary("total points", stats.total_points.to_string());
    human.push_summary("rank", format!("#{}", stats.rank));
    human.push_summary("approved tasks", stats.completed_tasks.to_string());
    human.push_summary("pending tasks", stats.pending_tasks.to_string());

    output::emit_success(ctx.options, "stats user", &stats, Some(&human))
}

pub(crate) fn admin(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;
    let stats = engine.admin_stats(&caller)?;

    let mut human = HumanOutput::new("System stats");
    human.push_summary("pending tasks", stats.pending_tasks.to_string());
    human.push_summary("approved today", stats.approved_today.to_string());
    human.push_summary("points distributed", stats.points_distributed.to_string());
    human.push_summary("active users", stats.active_users.to_string());

    output::emit_success(ctx.options, "stats admin", &stats, Some(&human))
}
