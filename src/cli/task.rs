//! Task lifecycle commands: submit, start, complete, listings, proof fetch.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::cli::CommandContext;
use crate::error::Result;
use crate::events::{self, Event, EventKind};
use crate::files::ProofStore;
use crate::output::{self, HumanOutput};
use crate::task::{SubmitTask, Task, TaskType};

pub(crate) fn submit(
    ctx: &CommandContext,
    title: &str,
    description: &str,
    task_type: &str,
) -> Result<()> {
    let task_type: TaskType = task_type.parse()?;
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let task = engine.submit_task(
        &caller,
        SubmitTask {
            title: title.to_string(),
            description: description.to_string(),
            task_type,
        },
    )?;

    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(EventKind::TaskSubmitted, Some(caller.username.clone())).with_data(json!({
            "task_id": task.id,
            "type": task.task_type,
            "points": task.points,
        }))?,
    )?;

    let mut human = HumanOutput::new(format!("Submitted task {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step("merit tasks mine".to_string());

    output::emit_success(ctx.options, "submit", &task, Some(&human))
}

pub(crate) fn start(ctx: &CommandContext, id: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let task = engine.start_task(&caller, id)?;

    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(EventKind::TaskStarted, Some(caller.username.clone()))
            .with_data(json!({ "task_id": task.id }))?,
    )?;

    let mut human = HumanOutput::new(format!("Started task {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("merit complete {} [--proof <file.pdf>]", task.id));

    output::emit_success(ctx.options, "start", &task, Some(&human))
}

pub(crate) fn complete(ctx: &CommandContext, id: &str, proof: Option<&Path>) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let proofs = ProofStore::new(&ctx.data_dir, ctx.config.uploads.max_bytes);
    let proof_file = match proof {
        Some(path) => Some(proofs.store_from(path)?),
        None => None,
    };

    let task = match engine.complete_task(&caller, id, proof_file.clone()) {
        Ok(task) => task,
        Err(err) => {
            // A rejected completion must not strand the upload on disk.
            if let Some(reference) = &proof_file {
                if let Ok(path) = proofs.resolve(reference) {
                    let _ = fs::remove_file(path);
                }
            }
            return Err(err);
        }
    };

    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(EventKind::TaskCompleted, Some(caller.username.clone())).with_data(json!({
            "task_id": task.id,
            "proof_file": task.proof_file,
        }))?,
    )?;

    let mut human = HumanOutput::new(format!("Completed task {}", task.id));
    push_task_summary(&mut human, &task);
    if let Some(reference) = &task.proof_file {
        human.push_detail(format!("proof stored as {reference}"));
    }

    output::emit_success(ctx.options, "complete", &task, Some(&human))
}

pub(crate) fn list_mine(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;
    let tasks = engine.my_tasks(&caller)?;
    emit_task_list(ctx, "tasks mine", "Tasks you submitted", tasks)
}

pub(crate) fn list_assigned(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;
    let tasks = engine.assigned_tasks(&caller)?;
    emit_task_list(ctx, "tasks assigned", "Tasks assigned to you", tasks)
}

pub(crate) fn list_pending(ctx: &CommandContext) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;
    let tasks = engine.pending_tasks(&caller)?;
    emit_task_list(ctx, "tasks pending", "Tasks awaiting review", tasks)
}

#[derive(Serialize)]
struct ProofReport {
    task_id: String,
    proof_file: String,
    path: String,
}

pub(crate) fn proof(ctx: &CommandContext, id: &str, out: Option<&Path>) -> Result<()> {
    let engine = ctx.engine()?;
    let caller = ctx.caller(&engine)?;

    let task = engine.task(&caller, id)?;
    let reference = task.proof_file.clone().ok_or_else(|| {
        crate::error::Error::Validation(format!("task {} has no proof file", task.id))
    })?;

    let store = ProofStore::new(&ctx.data_dir, ctx.config.uploads.max_bytes);
    let source = store.resolve(&reference)?;

    let path = match out {
        Some(destination) => {
            fs::copy(&source, destination)?;
            destination.to_path_buf()
        }
        None => source,
    };

    let report = ProofReport {
        task_id: task.id.clone(),
        proof_file: reference,
        path: path.display().to_string(),
    };

    let mut human = HumanOutput::new(format!("Proof for task {}", task.id));
    human.push_summary("file", &report.proof_file);
    human.push_summary("path", &report.path);

    output::emit_success(ctx.options, "proof", &report, Some(&human))
}

#[derive(Serialize)]
struct TaskListReport {
    count: usize,
    tasks: Vec<Task>,
}

fn emit_task_list(
    ctx: &CommandContext,
    command: &str,
    header: &str,
    tasks: Vec<Task>,
) -> Result<()> {
    let mut human = HumanOutput::new(format!("{} ({})", header, tasks.len()));
    for task in &tasks {
        human.push_detail(format!(
            "{}  {}  {}pt  {}",
            task.id, task.status, task.points, task.title
        ));
    }

    let report = TaskListReport {
        count: tasks.len(),
        tasks,
    };
    output::emit_success(ctx.options, command, &report, Some(&human))
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("title", &task.title);
    human.push_summary("type", task.task_type.as_str());
    human.push_summary("status", task.status.as_str());
    human.push_summary("points", task.points.to_string());
    if let Some(deadline) = task.deadline {
        human.push_summary("deadline", deadline.to_rfc3339());
    }
}
