//! Admin commands: assign and review.

use serde_json::json;

use crate::cli::CommandContext;
use crate::error::Result;
use crate::events::{self, Event, EventKind};
use crate::output::{self, HumanOutput};
use crate::task::{parse_deadline, AssignTask, ReviewDecision, ReviewTask, TaskType};

#[allow(clippy::too_many_arguments)]
pub(crate) fn assign(
    ctx: &CommandContext,
    to: &str,
    title: &str,
    description: &str,
    task_type: &str,
    points: Option<i64>,
    deadline: &str,
) -> Result<()> {
    let task_type: TaskType = task_type.parse()?;
    let deadline = parse_deadline(deadline)?;
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let task = engine.assign_task(
        &caller,
        AssignTask {
            assignee: to.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            task_type,
            points,
            deadline,
        },
    )?;

    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(EventKind::TaskAssigned, Some(caller.username.clone())).with_data(json!({
            "task_id": task.id,
            "assignee": to,
            "type": task.task_type,
            "points": task.points,
            "deadline": task.deadline,
        }))?,
    )?;

    let mut human = HumanOutput::new(format!("Assigned task {} to {}", task.id, to));
    human.push_summary("title", &task.title);
    human.push_summary("type", task.task_type.as_str());
    human.push_summary("points", task.points.to_string());
    if let Some(deadline) = task.deadline {
        human.push_summary("deadline", deadline.to_rfc3339());
    }
    human.push_next_step(format!("merit --as {to} start {}", task.id));

    output::emit_success(ctx.options, "assign", &task, Some(&human))
}

pub(crate) fn review(
    ctx: &CommandContext,
    id: &str,
    decision: &str,
    points: Option<i64>,
    reason: Option<String>,
) -> Result<()> {
    let decision: ReviewDecision = decision.parse()?;
    let mut engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let task = engine.review_task(
        &caller,
        ReviewTask {
            task_id: id.to_string(),
            decision,
            awarded_points: points,
            rejection_reason: reason,
        },
    )?;

    let kind = match decision {
        ReviewDecision::Approved => EventKind::TaskApproved,
        ReviewDecision::Rejected => EventKind::TaskRejected,
    };
    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(kind, Some(caller.username.clone())).with_data(json!({
            "task_id": task.id,
            "status": task.status,
            "awarded_points": task.awarded_points,
            "rejection_reason": task.rejection_reason,
        }))?,
    )?;

    let mut human = HumanOutput::new(format!("Task {} {}", task.id, task.status));
    human.push_summary("title", &task.title);
    match decision {
        ReviewDecision::Approved => {
            let awarded = task.awarded_points.unwrap_or(0);
            human.push_summary("awarded", format!("{awarded} points"));
        }
        ReviewDecision::Rejected => {
            if let Some(reason) = &task.rejection_reason {
                human.push_summary("reason", reason);
            }
        }
    }
    human.push_next_step("merit stats admin");

    output::emit_success(ctx.options, "review", &task, Some(&human))
}
