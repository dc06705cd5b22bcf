use chrono::{Duration, Utc};
use clap::Subcommand;
use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::session::{NewSession, PgSessionStore, SessionFilter, SessionStore, SessionUpdate};

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Create an active session for a user")]
    Create {
        #[arg(long, help = "Owning user id")]
        user_id: Uuid,
        #[arg(long, help = "Hours until the session expires; never when omitted")]
        ttl_hours: Option<i64>,
        #[arg(long)]
        platform: Option<String>,
    },

    #[command(about = "List sessions, newest first")]
    List {
        #[arg(long)]
        user_id: Option<Uuid>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    #[command(about = "Deactivate a session")]
    Revoke {
        #[arg(help = "Session id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: SessionCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = DatabaseManager::connect(&config.database).await?;
    let store = PgSessionStore::new(db.pool().clone());
    store.ensure_schema().await?;

    let result = run(cmd, &store, output_format).await;
    db.close().await;
    result
}

async fn run(cmd: SessionCommands, store: &PgSessionStore, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Create {
            user_id,
            ttl_hours,
            platform,
        } => {
            let session = store
                .create(NewSession {
                    user_id,
                    platform,
                    expires_at: ttl_hours.map(|h| Utc::now() + Duration::hours(h)),
                    ..Default::default()
                })
                .await?;
            output_success(output_format, "session created", Some(serde_json::to_value(&session)?))
        }
        SessionCommands::List {
            user_id,
            active,
            page,
            limit,
        } => {
            let list = store
                .list(&SessionFilter {
                    page,
                    limit,
                    user_id,
                    is_active: active,
                })
                .await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list)?),
                OutputFormat::Text => {
                    println!("{} session(s)", list.count);
                    for s in &list.sessions {
                        println!(
                            "{}  user={}  active={}  created={}",
                            s.id, s.user_id, s.is_active, s.created_at
                        );
                    }
                }
            }
            Ok(())
        }
        SessionCommands::Revoke { id } => {
            let session = store
                .update(SessionUpdate {
                    id,
                    ip_address: None,
                    is_active: Some(false),
                })
                .await?;
            output_success(output_format, &format!("session {} revoked", session.id), None)
        }
    }
}
