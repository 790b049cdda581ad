//! `merit init` - set up the data directory.

use std::fs;

use serde::Serialize;

use crate::cli::CommandContext;
use crate::config::{Config, CONFIG_FILENAME};
use crate::error::Result;
use crate::files::PROOFS_DIR;
use crate::output::{self, HumanOutput};
use crate::store::{Store, DB_FILENAME};

#[derive(Serialize)]
struct InitReport {
    data_dir: String,
    database: String,
    config: String,
    config_created: bool,
}

pub(crate) fn run(ctx: &CommandContext) -> Result<()> {
    fs::create_dir_all(&ctx.data_dir)?;
    fs::create_dir_all(ctx.data_dir.join(PROOFS_DIR))?;

    // Opening the store creates the database and applies the schema.
    let _store = Store::open_in_dir(&ctx.data_dir)?;

    let config_path = ctx.data_dir.join(CONFIG_FILENAME);
    let config_created = if config_path.exists() {
        false
    } else {
        Config::default().save(&config_path)?;
        true
    };

    let report = InitReport {
        data_dir: ctx.data_dir.display().to_string(),
        database: ctx.data_dir.join(DB_FILENAME).display().to_string(),
        config: config_path.display().to_string(),
        config_created,
    };

    let mut human = HumanOutput::new(format!("Initialized {}", report.data_dir));
    human.push_summary("database", &report.database);
    human.push_summary(
        "config",
        if config_created {
            format!("{} (created)", report.config)
        } else {
            format!("{} (kept)", report.config)
        },
    );
    human.push_next_step("merit register <username> --password <password>");

    output::emit_success(ctx.options, "init", &report, Some(&human))
}
