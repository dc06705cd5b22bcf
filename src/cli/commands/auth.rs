use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Show the identity a running server resolves for a token")]
    Whoami {
        #[arg(long, default_value = "http://localhost:8080", help = "Server base URL")]
        url: String,
        #[arg(long, help = "Bearer token")]
        token: String,
        #[arg(long, help = "Session id sent in the session header")]
        session: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Whoami { url, token, session } => {
            let endpoint = format!("{}/v1/auth/whoami", url.trim_end_matches('/'));
            let client = reqwest::Client::new();

            let mut request = client.get(&endpoint).bearer_auth(token);
            if let Some(session) = session {
                request = request.header(config.security.session_header.as_str(), session);
            }

            let response = request.send().await?;
            let status = response.status();
            let body: Value = response.json().await?;

            if status.is_success() {
                output_success(output_format, "authorized", body.get("data").cloned())
            } else {
                let message = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("request failed");
                output_error(output_format, &format!("{} ({})", message, status), None)?;
                std::process::exit(1);
            }
        }
    }
}
