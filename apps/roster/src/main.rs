use std::{fs::File, io::BufReader, path::PathBuf, rc::Rc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use roster_core::{
    Closable, FormHost, NotificationBus, RosterChange, RosterCoordinator, StorageGateway,
    SurfaceKind,
};
use shared::domain::{Member, MemberId, MemberPatch, MembershipStatus};
use tracing_subscriber::EnvFilter;

mod config;
mod script;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "roster", about = "Manage the gym member roster")]
struct Cli {
    /// Config file; `roster.toml` in the working directory is read when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every member in roster order.
    List,
    Add(AddArgs),
    Edit {
        member_id: MemberId,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Delete {
        member_id: MemberId,
    },
    /// Apply a JSON-lines notification script.
    Replay {
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    status: Option<MembershipStatus>,
}

#[derive(Args, Debug)]
struct FieldArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    status: Option<MembershipStatus>,
}

impl From<AddArgs> for MemberPatch {
    fn from(args: AddArgs) -> Self {
        Self {
            first_name: Some(args.first_name),
            last_name: Some(args.last_name),
            email: args.email,
            phone: args.phone,
            status: args.status,
        }
    }
}

impl From<FieldArgs> for MemberPatch {
    fn from(args: FieldArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            phone: args.phone,
            status: args.status,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let database_url = settings.sqlite_url();
    let bus = Rc::new(NotificationBus::new());
    let forms = Rc::new(FormHost::new(Rc::clone(&bus)));
    let gateway = StorageGateway::open(&database_url)?;
    let coordinator = RosterCoordinator::start(Box::new(gateway), forms.clone(), Rc::clone(&bus))?;
    coordinator.subscribe_changes(print_change);

    match cli.command {
        Command::List => {
            for member in coordinator.members() {
                print_member(&member);
            }
        }
        Command::Add(args) => {
            coordinator.request_add();
            let form = forms
                .latest(SurfaceKind::Add)
                .context("add surface did not open")?;
            let result = form.submit(args.into());
            coordinator.request_exit(Some(form.as_ref() as &dyn Closable));
            result?;
        }
        Command::Edit { member_id, fields } => {
            let patch = MemberPatch::from(fields);
            if patch.is_empty() {
                bail!("nothing to change; pass at least one field flag");
            }
            select_existing(&coordinator, member_id)?;
            coordinator.request_edit()?;
            let form = forms
                .latest(SurfaceKind::Edit)
                .context("edit surface did not open")?;
            let result = form.submit(patch);
            coordinator.request_exit(Some(form.as_ref() as &dyn Closable));
            result?;
        }
        Command::Delete { member_id } => {
            select_existing(&coordinator, member_id)?;
            coordinator.request_edit()?;
            let form = forms
                .latest(SurfaceKind::Edit)
                .context("edit surface did not open")?;
            let result = form.delete();
            coordinator.request_exit(Some(form.as_ref() as &dyn Closable));
            result?;
        }
        Command::Replay { path } => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open script '{}'", path.display()))?;
            let summary = script::replay(&coordinator, &bus, BufReader::new(file))?;
            println!(
                "replayed {} steps ({} skipped)",
                summary.applied, summary.skipped
            );
        }
    }

    Ok(())
}

fn select_existing(coordinator: &RosterCoordinator, member_id: MemberId) -> Result<()> {
    if !coordinator.select(Some(member_id)) {
        bail!("no member with id {member_id}");
    }
    Ok(())
}

fn print_member(member: &Member) {
    println!(
        "{}  {:<24} {:<28} {:<14} {}",
        member.id,
        member.display_name(),
        member.email,
        member.phone,
        member.status
    );
}

fn print_change(change: &RosterChange) {
    match change {
        RosterChange::Added(member) => println!("added {} ({})", member.display_name(), member.id),
        RosterChange::Updated { member, .. } => {
            println!("updated {} ({})", member.display_name(), member.id)
        }
        RosterChange::Removed(id) => println!("removed {id}"),
    }
}
