use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Key used when no API key is configured. Logged loudly at startup.
pub const DEV_API_KEY: &str = "hrag-dev-key";

/// Environment prefix: `HRAG_SERVER__PORT=9000`, `HRAG_SERVER__AUTH__API_KEYS=a,b`.
pub const ENV_PREFIX: &str = "HRAG_SERVER";

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("failed to load server config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid server config: {0}")]
    Invalid(String),
}

/// HTTP listener, limits and auth for the retrieval API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Whole-request timeout, covering embedding and search.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// `EnvFilter` directive, e.g. `info` or `server=debug,index=info`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Install the Prometheus recorder and serve it on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Pipeline YAML (`HragConfig`). Offline stub defaults when unset.
    #[serde(default)]
    pub pipeline_config: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Guards the `/api/v1` routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: HashSet<String>,

    /// Requests per key per one-minute window.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: HashSet::new(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            pipeline_config: None,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `.env`, then an optional `server.{yaml,toml,json}` in the working
    /// directory, then `HRAG_SERVER__*` variables; later sources win.
    pub fn load() -> Result<Self, ServerConfigError> {
        dotenvy::dotenv().ok();
        let file = config::File::with_name("server").required(false);
        Self::from_builder(config::Config::builder().add_source(file))
    }

    /// Parse a YAML document, still letting the environment override it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ServerConfigError> {
        let file = config::File::from_str(yaml, config::FileFormat::Yaml);
        Self::from_builder(config::Config::builder().add_source(file))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ServerConfigError> {
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.api_keys")
            .try_parsing(true);

        let mut config: ServerConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;

        if config.auth.api_keys.is_empty() {
            tracing::warn!(
                key = DEV_API_KEY,
                "No API keys configured, /api/v1 accepts the development key"
            );
            config.auth.api_keys.insert(DEV_API_KEY.to_string());
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        if self.timeout_secs == 0 {
            return Err(ServerConfigError::Invalid(
                "timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.max_body_size_mb == 0 {
            return Err(ServerConfigError::Invalid(
                "max_body_size_mb must be >= 1".to_string(),
            ));
        }
        if self.auth.rate_limit_per_minute == 0 {
            return Err(ServerConfigError::Invalid(
                "auth.rate_limit_per_minute must be >= 1".to_string(),
            ));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| ServerConfigError::Invalid(format!("bind address: {e}")))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_rate_limit_per_minute() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
