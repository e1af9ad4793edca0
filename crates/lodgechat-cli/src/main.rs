use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use uuid::Uuid;

use lodgechat_core::config::{self, ChatConfig};
use lodgechat_core::inference::InferenceClient;
use lodgechat_core::markdown;
use lodgechat_core::model::{ChatSession, Feedback, Role, SessionOrigin};
use lodgechat_core::reconciler::Reconciler;
use lodgechat_core::store::{LocalCacheStore, RemoteStore};

#[derive(Parser)]
#[command(name = "lodgechat", about = "Lodgechat: portal assistant chat", version)]
enum Cli {
    /// Write a default config to ~/.config/lodgechat/config.toml
    Init,
    /// Send a message and print the reply
    Send {
        /// The message text
        message: String,
        /// Continue an existing session instead of starting a new chat
        #[arg(short, long)]
        session: Option<Uuid>,
    },
    /// List all sessions, local cache and account store merged, newest first
    Sessions,
    /// Print a session transcript
    History {
        /// Session ID
        session: Uuid,
        /// Render the markdown subset in bot replies to HTML
        #[arg(long)]
        html: bool,
    },
    /// Rename a session
    Rename {
        session: Uuid,
        title: String,
    },
    /// Delete a session
    Delete {
        session: Uuid,
    },
    /// Record thumbs up/down on a message
    Feedback {
        session: Uuid,
        /// Message ID within the session
        message: i64,
        #[arg(long, conflicts_with = "down")]
        up: bool,
        #[arg(long)]
        down: bool,
    },
    /// Migrate locally cached sessions to the signed-in account
    Migrate,
}

type CliReconciler = Reconciler<LocalCacheStore, RemoteStore, InferenceClient>;

fn build_reconciler(config: &ChatConfig) -> Result<CliReconciler> {
    let cache_path = match &config.cache.path {
        Some(p) => std::path::PathBuf::from(p),
        None => LocalCacheStore::default_path()?,
    };
    let local = LocalCacheStore::open(cache_path);
    let remote = RemoteStore::from_config(&config.api).context("failed to build store client")?;
    let inference =
        InferenceClient::from_config(&config.api).context("failed to build inference client")?;

    let reconciler = Reconciler::new(local, remote, inference)
        .with_max_message_len(config.chat.max_message_len);
    reconciler.set_authenticated(config.api.auth_token.is_some());
    Ok(reconciler)
}

/// Find a listed session by id so actions can dispatch on its origin tag.
async fn find_session(reconciler: &CliReconciler, id: Uuid) -> Result<ChatSession> {
    reconciler
        .load_history()
        .await?
        .into_iter()
        .find(|s| s.session_id == id)
        .with_context(|| format!("no session {id}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lodgechat=info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    if let Cli::Init = cli {
        let path = config::default_config_path()?;
        config::save_default_config(&path)?;
        println!("wrote {}", path.display().green());
        return Ok(());
    }

    let config = config::load(None).context("failed to load config")?;
    let reconciler = build_reconciler(&config)?;

    match cli {
        Cli::Init => unreachable!("handled above"),

        Cli::Send { message, session } => {
            if let Some(id) = session {
                let listed = find_session(&reconciler, id).await?;
                reconciler.select_session(listed.session_id, listed.origin).await?;
            }
            let reply = reconciler
                .send_message(&message)
                .await?
                .context("a reply is already in flight")?;
            println!("{} {}", "you:".dimmed(), message);
            println!("{} {}", "bot:".cyan().bold(), reply);
            println!(
                "{} {}",
                "session".dimmed(),
                reconciler.session_id()?.to_string().dimmed()
            );
        }

        Cli::Sessions => {
            let sessions = reconciler.load_history().await?;
            if sessions.is_empty() {
                println!("no sessions yet");
                return Ok(());
            }
            for session in sessions {
                let origin = match session.origin {
                    SessionOrigin::Local => "local ".yellow().to_string(),
                    SessionOrigin::Remote => "account".green().to_string(),
                };
                println!(
                    "{}  {}  {}  {}",
                    session.session_id.to_string().dimmed(),
                    origin,
                    session.timestamp.format("%Y-%m-%d %H:%M"),
                    session.title.bold()
                );
                if !session.preview.is_empty() {
                    println!("    {}", session.preview.dimmed());
                }
            }
        }

        Cli::History { session, html } => {
            let listed = find_session(&reconciler, session).await?;
            reconciler.select_session(listed.session_id, listed.origin).await?;
            let transcript = reconciler.snapshot()?;
            println!("{}", transcript.title.bold());
            for message in &transcript.messages {
                let label = match message.role {
                    Role::User => "you:".dimmed().to_string(),
                    Role::Bot => "bot:".cyan().bold().to_string(),
                };
                let text = if html && message.role == Role::Bot {
                    markdown::render(&message.text)
                } else {
                    message.text.clone()
                };
                println!("{} [{}] {}", label, message.id, text);
            }
        }

        Cli::Rename { session, title } => {
            let listed = find_session(&reconciler, session).await?;
            reconciler
                .rename_session(listed.session_id, listed.origin, &title)
                .await?;
            println!("renamed to {}", title.bold());
        }

        Cli::Delete { session } => {
            let listed = find_session(&reconciler, session).await?;
            reconciler
                .delete_session(listed.session_id, listed.origin)
                .await?;
            println!("deleted {}", session.to_string().dimmed());
        }

        Cli::Feedback { session, message, up, down } => {
            if !up && !down {
                anyhow::bail!("pass --up or --down");
            }
            let listed = find_session(&reconciler, session).await?;
            reconciler.select_session(listed.session_id, listed.origin).await?;
            let value = if up { Feedback::Positive } else { Feedback::Negative };
            reconciler.record_feedback(message, value).await?;
            println!("feedback recorded");
        }

        Cli::Migrate => {
            if !reconciler.is_authenticated() {
                anyhow::bail!("set api.auth_token in the config to migrate into an account");
            }
            let report = reconciler.migrate_local_sessions().await?;
            if !report.ran {
                println!("a migration pass is already running");
            } else if report.migrated.is_empty() && report.failed.is_empty() {
                println!("local cache is empty, nothing to migrate");
            } else {
                println!(
                    "{} migrated, {} failed{}",
                    report.migrated.len().to_string().green(),
                    report.failed.len().to_string().red(),
                    if report.cache_cleared {
                        ", local cache cleared"
                    } else {
                        ", local cache kept"
                    }
                );
                for (old, new) in &report.migrated {
                    println!("  {} {} {}", old.to_string().dimmed(), "→".dimmed(), new);
                }
            }
        }
    }

    Ok(())
}
