//! merit - Task Submission and Point Rewards
//!
//! This library provides the core functionality for the merit CLI tool:
//! users submit or receive tasks, admins review them, approved tasks credit
//! points exactly once, and a leaderboard ranks users by their totals.
//!
//! # Core Concepts
//!
//! - **Tasks**: Typed units of work moving through a fixed lifecycle
//! - **Reviews**: Admin approval/rejection, the only path into terminal states
//! - **Points**: Credited atomically with approval, at most once per task
//! - **Notifications**: Best-effort delivery to connected users via the relay
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `merit.toml`
//! - `engine`: Task lifecycle engine, the single write authority
//! - `error`: Error types and result aliases
//! - `events`: Audit event output (JSONL)
//! - `files`: Proof-file storage with locking and atomic writes
//! - `relay`: In-process notification relay
//! - `session`: Caller identity resolution
//! - `stats`: Leaderboard and stats projections
//! - `store`: SQLite persistence layer
//! - `task`, `user`: Domain model

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod files;
pub mod output;
pub mod relay;
pub mod session;
pub mod stats;
pub mod store;
pub mod task;
pub mod user;

pub use error::{Error, Result};
