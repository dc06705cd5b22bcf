use anyhow::Context;
use chrono::Duration;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::auth::{fingerprint, Claims, TokenIssuer};
use crate::cli::utils::{output_success, parse_claim};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a token carrying the given role")]
    Issue {
        #[arg(long, help = "Role claim value")]
        role: String,
        #[arg(long, help = "Subject (sub claim)")]
        sub: Option<String>,
        #[arg(long, help = "Session id to embed as the session_id claim")]
        session: Option<String>,
        #[arg(long, help = "Lifetime in hours (defaults to the configured expiry)")]
        ttl_hours: Option<i64>,
        #[arg(long = "claim", help = "Extra claim as key=value; repeatable")]
        claims: Vec<String>,
    },
}

pub fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue {
            role,
            sub,
            session,
            ttl_hours,
            claims,
        } => {
            if config.security.jwt_secret.is_empty() {
                anyhow::bail!("JWT_SECRET must be set to issue tokens");
            }

            let payload = build_claims(config, &role, sub, session, &claims)?;
            let (hours, ttl) = token_ttl(config, ttl_hours)?;
            let issuer = TokenIssuer::new(&config.security.jwt_secret, ttl)?;
            let token = issuer.issue(payload)?;

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "token issued",
                    Some(json!({
                        "token": token,
                        "role": role,
                        "expires_in_hours": hours,
                    })),
                ),
                OutputFormat::Text => {
                    tracing::debug!("Issued token {} for role {}", fingerprint(&token), role);
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}

/// `--claim` pairs first, so the configured role claim, `sub` and `session_id` always win
fn build_claims(
    config: &AppConfig,
    role: &str,
    sub: Option<String>,
    session: Option<String>,
    extra: &[String],
) -> anyhow::Result<Claims> {
    let mut payload = Claims::new();
    for raw in extra {
        let (key, value) = parse_claim(raw)?;
        payload.insert(key, value);
    }
    payload.insert(config.security.role_claim.clone(), Value::String(role.to_string()));
    if let Some(sub) = sub {
        payload.insert("sub".to_string(), Value::String(sub));
    }
    if let Some(session) = session {
        payload.insert("session_id".to_string(), Value::String(session));
    }
    Ok(payload)
}

fn token_ttl(config: &AppConfig, ttl_hours: Option<i64>) -> anyhow::Result<(i64, Duration)> {
    let hours = match ttl_hours {
        Some(hours) => hours,
        None => i64::try_from(config.security.jwt_expiry_hours)
            .context("configured JWT expiry does not fit in an i64")?,
    };
    let ttl = Duration::try_hours(hours)
        .with_context(|| format!("token lifetime of {} hours is out of range", hours))?;
    Ok((hours, ttl))
}
