//! `merit register` - create an account.

use serde_json::json;

use crate::cli::CommandContext;
use crate::error::Result;
use crate::events::{self, Event, EventKind};
use crate::output::{self, HumanOutput};
use crate::user::{NewUser, Role};

pub(crate) fn run(ctx: &CommandContext, username: &str, password: &str, role: &str) -> Result<()> {
    let role: Role = role.parse()?;
    let engine = ctx.engine()?;

    let user = engine.register_user(NewUser {
        username: username.to_string(),
        password: password.to_string(),
        role,
    })?;

    events::emit_to(
        ctx.events.as_ref(),
        &Event::new(EventKind::UserRegistered, Some(user.username.clone())).with_data(json!({
            "user_id": user.id,
            "role": user.role.as_str(),
        }))?,
    )?;

    let mut human = HumanOutput::new(format!("Registered {}", user.username));
    human.push_summary("id", &user.id);
    human.push_summary("role", user.role.as_str());
    human.push_next_step(format!(
        "merit --as {} submit --title <title> --description <text> --type <type>",
        user.username
    ));

    output::emit_success(ctx.options, "register", &user, Some(&human))
}
