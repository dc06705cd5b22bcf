use std::path::PathBuf;

use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::policy::PolicyEngine;

#[derive(Subcommand)]
pub enum PolicyCommands {
    #[command(about = "Decide one role/resource/action triple")]
    Check {
        #[arg(help = "Role, e.g. user")]
        role: String,
        #[arg(help = "Route template, e.g. /v1/session/:id")]
        resource: String,
        #[arg(help = "HTTP method")]
        action: String,
        #[arg(long, help = "Model file (defaults to POLICY_MODEL_PATH or the embedded model)")]
        model: Option<PathBuf>,
        #[arg(long, help = "Rule file (defaults to POLICY_RULES_PATH or the embedded rules)")]
        rules: Option<PathBuf>,
    },

    #[command(about = "Load the model and rules and report what was found")]
    Lint {
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

pub async fn handle(cmd: PolicyCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Check {
            role,
            resource,
            action,
            model,
            rules,
        } => {
            let engine = load(config, model, rules).await?;
            let (allowed, data) = check(&engine, &role, &resource, &action)?;

            if allowed {
                output_success(output_format, "allowed", Some(data))
            } else {
                output_error(
                    output_format,
                    &format!("{} {} denied for role '{}'", action.to_uppercase(), resource, role),
                    Some("DENIED"),
                )?;
                std::process::exit(2);
            }
        }
        PolicyCommands::Lint { model, rules } => match load(config, model, rules).await {
            Ok(engine) => {
                let stats = serde_json::to_value(engine.stats())?;
                output_success(output_format, "policy loaded", Some(stats))
            }
            Err(e) => {
                output_error(output_format, &e.to_string(), Some("POLICY_INVALID"))?;
                std::process::exit(1);
            }
        },
    }
}

/// Evaluate one triple; the verb is upper-cased the way axum reports methods
fn check(engine: &PolicyEngine, role: &str, resource: &str, action: &str) -> anyhow::Result<(bool, Value)> {
    let action = action.to_uppercase();
    let allowed = engine.enforce(role, resource, &action)?;
    let data = json!({
        "role": role,
        "resource": resource,
        "action": action,
        "allowed": allowed,
    });
    Ok((allowed, data))
}

/// Command-line paths win over the configured ones; both fall back to the embedded policy
async fn load(config: &AppConfig, model: Option<PathBuf>, rules: Option<PathBuf>) -> anyhow::Result<PolicyEngine> {
    let model = model.or_else(|| config.policy.model_path.clone());
    let rules = rules.or_else(|| config.policy.rules_path.clone());
    Ok(PolicyEngine::from_paths(model.as_deref(), rules.as_deref()).await?)
}
