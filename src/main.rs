use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tasksetu::cli::Cli;
use tasksetu::cmd::*;
use tasksetu::config::Config;
use tasksetu::db::Database;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,tasksetu=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), CmdError> {
    // Commands that don't touch storage.
    match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return Ok(());
        }
        Commands::Next { from, count, repeat } => return cmd_next(from, count, repeat),
        _ => {}
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let data_dir = PathBuf::from(home).join(".tasksetu");
    let db_path = cli.db.unwrap_or_else(|| data_dir.join("tasks.json"));
    let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));

    let config = Config::load(&config_path)?;
    let mut db = Database::load(&db_path)?;
    tracing::debug!(db = %db_path.display(), tasks = db.tasks.len(), "database loaded");

    match cli.command {
        Commands::Completions { .. } | Commands::Next { .. } => unreachable!("handled above"),

        Commands::Add { title, desc, assignee, tags, priority, kind, start, due, repeat } =>
            cmd_add(&mut db, &db_path, &config, title, desc, assignee, tags, priority, kind,
                    start, due, repeat),

        Commands::List { all, recurring, series, sort, limit } =>
            cmd_list(&db, all, recurring, series, sort, limit),

        Commands::View { id } => cmd_view(&db, id),

        Commands::Comment { id, text, author } => cmd_comment(&mut db, &db_path, id, text, author),

        Commands::Complete { id, at } => cmd_complete(&mut db, &db_path, &config, id, at),

        Commands::Generate { horizon_days } =>
            cmd_generate(&mut db, &db_path, &config, horizon_days),

        Commands::Skip { id } => cmd_skip(&mut db, &db_path, id),

        Commands::Stop { id } => cmd_stop(&mut db, &db_path, id),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
