//! Caller identity resolution.
//!
//! The CLI stands in for the session layer: the caller names an account via
//! `--as <username>` or the `MERIT_USER` environment variable, and every
//! command resolves that to a stored user before touching the engine. A
//! missing or unknown identity is an authentication failure, distinct from
//! the role checks the engine applies afterwards.

use crate::error::{Error, Result};
use crate::store::Store;
use crate::user::User;

pub const USER_ENV: &str = "MERIT_USER";

/// Resolve the caller: CLI flag first, then environment.
pub fn resolve_caller(store: &Store, cli_user: Option<&str>) -> Result<User> {
    let username = match non_empty(cli_user) {
        Some(name) => name.to_string(),
        None => match std::env::var(USER_ENV) {
            Ok(value) if non_empty(Some(value.as_str())).is_some() => value.trim().to_string(),
            _ => return Err(Error::Unauthenticated),
        },
    };

    store
        .user_by_username(&username)?
        .ok_or(Error::UnknownCaller(username))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
