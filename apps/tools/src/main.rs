use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::Member;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/roster.db")]
    database_url: String,
    /// Tracing filter directives; falls back to `ROSTER_LOG`, then `info`.
    #[arg(long)]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the roster to stdout as a JSON array.
    Export,
    /// Replace the whole roster with the JSON array in PATH.
    Import { path: PathBuf },
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = log_filter(cli.log.as_deref(), std::env::var("ROSTER_LOG").ok())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Export => {
            let members = storage.load_members().await?;
            println!("{}", serde_json::to_string_pretty(&members)?);
        }
        Command::Import { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            let members: Vec<Member> =
                serde_json::from_str(&raw).context("import file is not a member array")?;
            for member in &members {
                member
                    .validate()
                    .with_context(|| format!("invalid member {}", member.id))?;
            }
            storage.replace_members(&members).await?;
            info!(members = members.len(), "roster imported");
        }
        Command::Count => {
            println!("{}", storage.member_count().await?);
        }
    }

    Ok(())
}

fn log_filter(flag: Option<&str>, env_value: Option<String>) -> Result<EnvFilter> {
    let directives = match (flag, env_value) {
        (Some(flag), _) => flag.to_string(),
        (None, Some(env_value)) if !env_value.trim().is_empty() => env_value,
        _ => "info".to_string(),
    };
    EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
