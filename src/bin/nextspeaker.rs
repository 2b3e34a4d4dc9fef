//! Terminal client for Next Speaker.
//!
//! Usage:
//!   nextspeaker create "Daily standup"
//!   nextspeaker join <TEAM_ID> Ada --color "#3B82F6"
//!   nextspeaker watch <TEAM_ID>
//!   nextspeaker ping <TEAM_ID> Grace
//!   nextspeaker teams
//!
//! Environment variables:
//!   NEXTSPEAKER_API_URL      : API base URL (default: http://localhost:8080)
//!   NEXTSPEAKER_SESSION_FILE : identity cache (default: platform data dir)

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use nextspeaker_api::client::{
    alert::AlertPolicy,
    api::ApiClient,
    notifier::TerminalNotifier,
    session::SessionStore,
    view::TeamView,
};

#[derive(Parser)]
#[command(name = "nextspeaker", about = "Ping a teammate when it's their turn")]
struct Args {
    /// Base URL of the Next Speaker API
    #[arg(long, env = "NEXTSPEAKER_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Where this device remembers its teams and identities
    #[arg(long, env = "NEXTSPEAKER_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a team and print its id
    Create { name: String },
    /// List the teams this device knows about
    Teams,
    /// Join a team as a new member
    Join {
        team: Uuid,
        name: String,
        /// #RRGGBB; a palette color is picked when omitted
        #[arg(long)]
        color: Option<String>,
    },
    /// Ping a member of a team you belong to
    Ping { team: Uuid, member: String },
    /// Open a live view of a team
    Watch {
        team: Uuid,
        #[command(flatten)]
        timing: Timing,
    },
}

#[derive(clap::Args)]
struct Timing {
    #[arg(long, env = "NEXTSPEAKER_REFRESH_MS", default_value_t = 1000)]
    refresh_ms: u64,
    #[arg(long, env = "NEXTSPEAKER_FLASH_MS", default_value_t = 3500)]
    flash_ms: u64,
    #[arg(long, env = "NEXTSPEAKER_COALESCE_MS", default_value_t = 4000)]
    coalesce_ms: u64,
    #[arg(long, env = "NEXTSPEAKER_STUCK_MS", default_value_t = 5000)]
    stuck_ms: u64,
    #[arg(long, env = "NEXTSPEAKER_WATCHDOG_MS", default_value_t = 1000)]
    watchdog_ms: u64,
}

impl Timing {
    fn policy(&self) -> AlertPolicy {
        let stuck_ms = self.stuck_ms.max(self.flash_ms);
        AlertPolicy {
            flash_duration: Duration::from_millis(self.flash_ms),
            coalesce_window: Duration::from_millis(self.coalesce_ms.min(stuck_ms)),
            stuck_after: Duration::from_millis(stuck_ms),
            watchdog_interval: Duration::from_millis(self.watchdog_ms.max(50)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let api = ApiClient::new(&args.api_url);
    let session = match args.session_file.or_else(SessionStore::default_path) {
        Some(path) => SessionStore::open(path),
        None => {
            tracing::warn!("No data directory available, identities will not be remembered");
            SessionStore::in_memory()
        }
    };

    match args.command {
        Command::Create { name } => {
            let team_id = api.create_team(&name).await.context("Failed to create team")?;
            let mut session = session;
            session.remember_team(team_id);
            if let Err(e) = session.save() {
                tracing::warn!("Could not save session: {:#}", e);
            }
            println!("Team created: {team_id}");
        }
        Command::Teams => list_teams(&api, session).await?,
        Command::Join { team, name, color } => {
            let mut view = open(api, team, session, AlertPolicy::default()).await?;
            let member_id = view.join(&name, color.as_deref()).await?;
            println!("Joined {} as {name} ({member_id})", view.team().name);
        }
        Command::Ping { team, member } => {
            let mut view = open(api, team, session, AlertPolicy::default()).await?;
            let target = view.ping(&member).await?;
            println!("Pinged {}", target.name);
        }
        Command::Watch { team, timing } => {
            let view = TeamView::open(
                api,
                team,
                session,
                TerminalNotifier::new(),
                timing.policy(),
                Duration::from_millis(timing.refresh_ms.max(100)),
            )
            .await?;
            view.run(stdin_lines()).await;
        }
    }

    Ok(())
}

/// Lines typed on stdin. Read on a plain thread so a pending read never holds
/// up runtime shutdown.
fn stdin_lines() -> UnboundedReceiverStream<std::io::Result<String>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    UnboundedReceiverStream::new(rx)
}

async fn open(
    api: ApiClient,
    team: Uuid,
    session: SessionStore,
    policy: AlertPolicy,
) -> anyhow::Result<TeamView<TerminalNotifier>> {
    TeamView::open(api, team, session, TerminalNotifier::new(), policy, Duration::from_secs(1))
        .await
        .with_context(|| format!("Failed to open team {team}"))
}

/// Print known teams with their members; teams that no longer exist are
/// dropped from the session.
async fn list_teams(api: &ApiClient, mut session: SessionStore) -> anyhow::Result<()> {
    let teams = session.teams().to_vec();
    if teams.is_empty() {
        println!("No teams yet. Create one with `nextspeaker create <name>`.");
        return Ok(());
    }

    for team_id in teams {
        let Some(team) = api.get_team(team_id).await? else {
            println!("{team_id}: no longer exists, forgetting it");
            session.forget_team(team_id);
            continue;
        };
        let members = api.members(team_id).await?;
        let me = session.reconcile(team_id, &members);
        let names: Vec<String> = members
            .iter()
            .map(|m| {
                if Some(m.id) == me {
                    format!("{} (you)", m.name)
                } else {
                    m.name.clone()
                }
            })
            .collect();
        println!("{} ({}): {}", team.name, team.id, names.join(", "));
    }

    if let Err(e) = session.save() {
        tracing::warn!("Could not save session: {:#}", e);
    }
    Ok(())
}
