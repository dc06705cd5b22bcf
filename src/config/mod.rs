use std::env;
use std::path::PathBuf;

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Absent selects the in-memory session store
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_leeway_secs: u64,
    pub jwt_expiry_hours: u64,
    pub role_claim: String,
    pub session_header: String,
    pub session_lookup_timeout_ms: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub model_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// [`AppConfig::resolve`] followed by [`AppConfig::validate`]
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// Preset for `APP_ENV`, layered with `CONFIG_FILE` (YAML) and then with
    /// individual environment variables
    pub fn resolve() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();

        let mut config = Self::preset(Self::environment_from(lookup("APP_ENV").as_deref()));
        if let Some(path) = lookup("CONFIG_FILE") {
            let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            config = config.with_yaml(&source)?;
        }

        Ok(config.with_overrides(&lookup))
    }

    fn environment_from(value: Option<&str>) -> Environment {
        match value {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Overlay a YAML document; keys it leaves out keep their current value
    pub fn with_yaml(self, source: &str) -> Result<Self, ConfigError> {
        let mut base = serde_yaml::to_value(&self)?;
        let overlay: serde_yaml::Value = serde_yaml::from_str(source)?;
        merge_yaml(&mut base, overlay);
        Ok(serde_yaml::from_value(base)?)
    }

    pub fn with_overrides(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        // Server overrides
        if let Some(v) = lookup("HTTP_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("HTTP_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.is_empty());
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("JWT_LEEWAY_SECS") {
            self.security.jwt_leeway_secs = v.parse().unwrap_or(self.security.jwt_leeway_secs);
        }
        if let Some(v) = lookup("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Some(v) = lookup("AUTH_ROLE_CLAIM") {
            self.security.role_claim = v;
        }
        if let Some(v) = lookup("AUTH_SESSION_HEADER") {
            self.security.session_header = v.to_ascii_lowercase();
        }
        if let Some(v) = lookup("AUTH_SESSION_TIMEOUT_MS") {
            self.security.session_lookup_timeout_ms =
                v.parse().unwrap_or(self.security.session_lookup_timeout_ms);
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Policy overrides
        if let Some(v) = lookup("POLICY_MODEL_PATH") {
            self.policy.model_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("POLICY_RULES_PATH") {
            self.policy.rules_path = Some(PathBuf::from(v));
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET must be set".to_string()));
        }
        if self.security.role_claim.trim().is_empty() {
            return Err(ConfigError::Invalid("role claim name must not be empty".to_string()));
        }

        let header = HeaderName::from_bytes(self.security.session_header.as_bytes())
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "'{}' is not a valid session header name",
                    self.security.session_header
                ))
            })?;
        if header == axum::http::header::AUTHORIZATION {
            return Err(ConfigError::Invalid(
                "session header must differ from the authorization header".to_string(),
            ));
        }

        if self.security.session_lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "session lookup timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_leeway_secs: 0,
                jwt_expiry_hours: 24 * 7, // 1 week
                role_claim: "role".to_string(),
                session_header: "session_id".to_string(),
                session_lookup_timeout_ms: 5_000,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            policy: PolicyConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_leeway_secs: 0,
                jwt_expiry_hours: 24,
                role_claim: "role".to_string(),
                session_header: "session_id".to_string(),
                session_lookup_timeout_ms: 2_000,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            policy: PolicyConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_leeway_secs: 0,
                jwt_expiry_hours: 4,
                role_claim: "role".to_string(),
                session_header: "session_id".to_string(),
                session_lookup_timeout_ms: 1_000,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            policy: PolicyConfig::default(),
        }
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
