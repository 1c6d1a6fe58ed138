use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Directory where uploaded profile pictures are stored and served from
    pub uploads_path: String,

    /// Posts per page for the feed and per-user listings
    pub posts_per_page: u64,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/inkpress.db".to_string(),
            log_level: "info".to_string(),
            uploads_path: "uploads".to_string(),
            posts_per_page: 4,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this many minutes of inactivity
    pub session_ttl_minutes: i64,

    /// Lifetime of a "remember me" session
    pub remember_me_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            secure_cookies: true,
            session_ttl_minutes: 60,
            remember_me_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When false, reset links are logged instead of emailed
    pub enabled: bool,

    pub smtp_host: String,

    /// SMTP account. Overridable via `INKPRESS_MAIL_USERNAME`.
    pub username: String,

    /// SMTP password. Overridable via `INKPRESS_MAIL_PASSWORD`.
    #[serde(skip_serializing)]
    pub password: String,

    /// From address; falls back to `username` when empty
    pub from: String,

    /// Public base URL used to build links in outbound mail
    pub base_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "smtp.googlemail.com".to_string(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Signing secret for reset tokens. Overridable via `INKPRESS_SECRET_KEY`;
    /// an ephemeral secret is generated when left empty.
    #[serde(skip_serializing)]
    pub secret_key: String,

    /// How long an issued password-reset token stays valid
    pub reset_token_ttl_seconds: u64,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            reset_token_ttl_seconds: 600,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl SecurityConfig {
    /// Fill in a random signing secret if none was configured. Reset links
    /// issued with an ephemeral secret do not survive a restart.
    pub fn ensure_secret(&mut self) {
        if self.secret_key.is_empty() {
            self.secret_key = generate_secret();
            tracing::warn!(
                "No signing secret configured; generated an ephemeral one. \
                 Set INKPRESS_SECRET_KEY (or security.secret_key) to keep reset links valid across restarts"
            );
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "inkpress".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            mail: MailConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_disk()?;

        config.apply_env_overrides();
        config.security.ensure_secret();

        Ok(config)
    }

    fn load_from_disk() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets come from the environment when present: the mail account
    /// credentials and the application signing secret.
    fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var("INKPRESS_MAIL_USERNAME") {
            self.mail.username = username;
        }
        if let Ok(password) = std::env::var("INKPRESS_MAIL_PASSWORD") {
            self.mail.password = password;
        }
        if let Ok(secret) = std::env::var("INKPRESS_SECRET_KEY") {
            self.security.secret_key = secret;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("inkpress").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".inkpress").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.posts_per_page == 0 {
            anyhow::bail!("posts_per_page must be at least 1");
        }

        if self.server.session_ttl_minutes <= 0 {
            anyhow::bail!("session_ttl_minutes must be positive");
        }

        if self.mail.enabled && (self.mail.username.is_empty() || self.mail.password.is_empty()) {
            anyhow::bail!(
                "Mail credentials are required when mail is enabled \
                 (set INKPRESS_MAIL_USERNAME / INKPRESS_MAIL_PASSWORD)"
            );
        }

        if self.security.reset_token_ttl_seconds == 0 {
            anyhow::bail!("reset_token_ttl_seconds must be at least 1");
        }

        Ok(())
    }
}

/// Generate a random signing secret (64 character hex string)
#[must_use]
pub fn generate_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
