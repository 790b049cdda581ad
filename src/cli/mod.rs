//! Command-line interface for merit
//!
//! This module defines the CLI structure using clap derive macros.
//! The CLI is the boundary layer: it resolves the caller's identity, builds
//! the engine, and translates typed errors into exit codes. All business
//! rules live in the engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::events::EventDestination;
use crate::output::OutputOptions;
use crate::relay::ConnectionRegistry;
use crate::session;
use crate::store::Store;
use crate::user::User;

mod admin;
mod init;
mod register;
mod stats;
mod task;

pub const DATA_DIR_ENV: &str = "MERIT_DATA";
pub const DEFAULT_DATA_DIR: &str = ".merit";

/// merit - task submission and point rewards
///
/// Users submit or receive tasks, admins review them, approved tasks award
/// points, and a leaderboard ranks users by their totals.
#[derive(Parser, Debug)]
#[command(name = "merit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Act as this username (also MERIT_USER)
    #[arg(long = "as", global = true)]
    pub caller: Option<String>,

    /// Data directory (defaults to ./.merit, also MERIT_DATA)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data dir>/merit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit audit events as JSONL to "-" (stdout) or a file path
    #[arg(long, global = true)]
    pub events: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Register a new account
    Register {
        /// Unique username
        username: String,

        /// Account password
        #[arg(long)]
        password: String,

        /// Role: user or admin (fixed at creation)
        #[arg(long, default_value = "user")]
        role: String,
    },

    /// Submit a task for review
    Submit {
        /// Short task title
        #[arg(long)]
        title: String,

        /// What was done (or should be done)
        #[arg(long)]
        description: String,

        /// Task type: content_creation, bug_report, feature_request,
        /// community_help, documentation
        #[arg(long = "type")]
        task_type: String,
    },

    /// Assign a task to a user (admin)
    Assign {
        /// Assignee username
        #[arg(long)]
        to: String,

        /// Short task title
        #[arg(long)]
        title: String,

        /// What should be done
        #[arg(long)]
        description: String,

        /// Task type
        #[arg(long = "type")]
        task_type: String,

        /// Override the nominal point value
        #[arg(long)]
        points: Option<i64>,

        /// Deadline (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        deadline: String,
    },

    /// Start work on an assigned task
    Start {
        /// Task id
        id: String,
    },

    /// Mark an assigned task completed, optionally attaching a PDF proof
    Complete {
        /// Task id
        id: String,

        /// Path to a PDF proof file
        #[arg(long)]
        proof: Option<PathBuf>,
    },

    /// Review a task: approve and award points, or reject with a reason (admin)
    Review {
        /// Task id
        id: String,

        /// Decision: approved or rejected
        #[arg(long)]
        decision: String,

        /// Points to award (defaults to the task's nominal value)
        #[arg(long)]
        points: Option<i64>,

        /// Rejection reason (required when rejecting)
        #[arg(long)]
        reason: Option<String>,
    },

    /// Task listings
    #[command(subcommand)]
    Tasks(TasksCommands),

    /// Top users by total points
    Leaderboard {
        /// Number of entries to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Stats projections
    #[command(subcommand)]
    Stats(StatsCommands),

    /// Fetch the proof file attached to a task
    Proof {
        /// Task id
        id: String,

        /// Copy the proof to this path instead of printing its location
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// Tasks you submitted
    Mine,

    /// Tasks assigned to you
    Assigned,

    /// All tasks awaiting review (admin)
    Pending,
}

#[derive(Subcommand, Debug)]
pub enum StatsCommands {
    /// Your points, counts, and rank
    User,

    /// System-wide review and point totals (admin)
    Admin,
}

/// Shared per-invocation state: resolved paths, config, engine.
pub(crate) struct CommandContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub options: OutputOptions,
    pub events: Option<EventDestination>,
    caller_name: Option<String>,
}

impl CommandContext {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = resolve_data_dir(cli.data_dir.clone());
        let config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::load_from_dir(&data_dir),
        };
        let events = EventDestination::parse(cli.events.as_deref());
        let events_to_stdout = matches!(events, Some(EventDestination::Stdout));

        Ok(Self {
            data_dir,
            config,
            options: OutputOptions {
                // Keep stdout parseable when events stream there
                json: cli.json && !events_to_stdout,
                quiet: cli.quiet,
            },
            events,
            caller_name: cli.caller.clone(),
        })
    }

    pub fn engine(&self) -> Result<Engine> {
        let store = Store::open_in_dir(&self.data_dir)?;
        Ok(Engine::new(
            store,
            Arc::new(ConnectionRegistry::new()),
            self.config.clone(),
        ))
    }

    pub fn caller(&self, engine: &Engine) -> Result<User> {
        session::resolve_caller(engine.store(), self.caller_name.as_deref())
    }
}

fn resolve_data_dir(cli_dir: Option<PathBuf>) -> PathBuf {
    cli_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext::from_cli(&self)?;

        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Register {
                username,
                password,
                role,
            } => register::run(&ctx, &username, &password, &role),
            Commands::Submit {
                title,
                description,
                task_type,
            } => task::submit(&ctx, &title, &description, &task_type),
            Commands::Assign {
                to,
                title,
                description,
                task_type,
                points,
                deadline,
            } => admin::assign(&ctx, &to, &title, &description, &task_type, points, &deadline),
            Commands::Start { id } => task::start(&ctx, &id),
            Commands::Complete { id, proof } => task::complete(&ctx, &id, proof.as_deref()),
            Commands::Review {
                id,
                decision,
                points,
                reason,
            } => admin::review(&ctx, &id, &decision, points, reason),
            Commands::Tasks(tasks) => match tasks {
                TasksCommands::Mine => task::list_mine(&ctx),
                TasksCommands::Assigned => task::list_assigned(&ctx),
                TasksCommands::Pending => task::list_pending(&ctx),
            },
            Commands::Leaderboard { limit } => stats::leaderboard(&ctx, limit),
            Commands::Stats(stats_cmd) => match stats_cmd {
                StatsCommands::User => stats::user(&ctx),
                StatsCommands::Admin => stats::admin(&ctx),
            },
            Commands::Proof { id, out } => task::proof(&ctx, &id, out.as_deref()),
        }
    }
}
