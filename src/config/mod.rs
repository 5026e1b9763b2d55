use anyhow::{bail, Context, Result};
use chrono::{Duration, SecondsFormat, Utc};
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Take the client IP from X-Forwarded-For / X-Real-IP instead of the
    /// peer address. Only enable behind a reverse proxy that sets them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    #[serde(default)]
    pub access_secret: String,
    /// HMAC secret for refresh tokens, must differ from `access_secret`
    #[serde(default)]
    pub refresh_secret: String,
    /// Shared secret the per-email OTP keys are derived from
    #[serde(default)]
    pub otp_secret: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
    /// Sessions not seen for this many days stop satisfying the auth gate
    #[serde(default = "default_session_idle_days")]
    pub session_idle_days: i64,
    #[serde(default = "default_session_cleanup_interval_secs")]
    pub session_cleanup_interval_secs: u64,
    /// Optional admin account created (already active) on startup
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            otp_secret: String::new(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_days: default_refresh_ttl_days(),
            session_idle_days: default_session_idle_days(),
            session_cleanup_interval_secs: default_session_cleanup_interval_secs(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

fn default_access_ttl_minutes() -> i64 {
    40
}

fn default_refresh_ttl_days() -> i64 {
    14
}

fn default_session_idle_days() -> i64 {
    30
}

fn default_session_cleanup_interval_secs() -> u64 {
    3600
}

/// Generate a random secret (hex-encoded 32 bytes)
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Upper bound for `auth.access_ttl_minutes` (30 days)
const MAX_ACCESS_TTL_MINUTES: i64 = 30 * 24 * 60;
/// Upper bound for `auth.refresh_ttl_days` and `auth.session_idle_days`
const MAX_DAYS: i64 = 3650;

impl AuthConfig {
    /// Fill in any secret that was left empty with a random one.
    ///
    /// Generated secrets only live for the process lifetime, so every token
    /// and pending OTP is invalidated on restart. Fails when the access and
    /// refresh secrets are identical.
    pub fn ensure_secrets(&mut self) -> Result<()> {
        for (name, secret) in [
            ("access_secret", &mut self.access_secret),
            ("refresh_secret", &mut self.refresh_secret),
            ("otp_secret", &mut self.otp_secret),
        ] {
            if secret.is_empty() {
                warn!(
                    "auth.{} not configured, generated a random one for this run",
                    name
                );
                *secret = generate_secret();
            }
        }

        if self.access_secret == self.refresh_secret {
            bail!("auth.access_secret and auth.refresh_secret must differ");
        }

        Ok(())
    }

    /// Reject lifetimes that are zero, negative or too large to add to a timestamp
    pub fn validate(&self) -> Result<()> {
        for (name, value, max) in [
            ("access_ttl_minutes", self.access_ttl_minutes, MAX_ACCESS_TTL_MINUTES),
            ("refresh_ttl_days", self.refresh_ttl_days, MAX_DAYS),
            ("session_idle_days", self.session_idle_days, MAX_DAYS),
        ] {
            if !(1..=max).contains(&value) {
                bail!("auth.{} must be between 1 and {}, got {}", name, max, value);
            }
        }
        Ok(())
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::try_minutes(self.access_ttl_minutes.clamp(1, MAX_ACCESS_TTL_MINUTES))
            .unwrap_or_else(Duration::zero)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::try_days(self.refresh_ttl_days.clamp(1, MAX_DAYS)).unwrap_or_else(Duration::zero)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::try_days(self.session_idle_days.clamp(1, MAX_DAYS)).unwrap_or_else(Duration::zero)
    }

    /// Timestamp before which a session counts as idle
    pub fn session_idle_cutoff(&self) -> String {
        (Utc::now() - self.session_idle()).to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Bazaar".to_string()
}

impl EmailConfig {
    /// SMTP delivery needs at least a host and a sender address
    pub fn is_configured(&self) -> bool {
        self.smtp_host.as_deref().is_some_and(|h| !h.is_empty())
            && self.from_address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_page_limit")]
    pub max_limit: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

fn default_page_limit() -> i64 {
    10
}

fn default_max_page_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist.
    ///
    /// Secrets left empty stay empty here; call
    /// [`AuthConfig::ensure_secrets`] once logging is up.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.auth.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_ttl_minutes, 40);
        assert_eq!(config.auth.refresh_ttl_days, 14);
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 100);
        assert!(!config.server.trust_proxy_headers);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [auth]
            access_secret = "a"
            refresh_secret = "b"

            [email]
            smtp_host = "smtp.example.com"
            from_address = "shop@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.access_secret, "a");
        assert_eq!(config.auth.session_idle_days, 30);
        assert!(config.email.is_configured());
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_ensure_secrets_fills_only_missing() {
        let mut auth = AuthConfig {
            access_secret: "kept".to_string(),
            ..AuthConfig::default()
        };
        auth.ensure_secrets().unwrap();

        assert_eq!(auth.access_secret, "kept");
        assert_eq!(auth.refresh_secret.len(), 64);
        assert_eq!(auth.otp_secret.len(), 64);
        assert_ne!(auth.refresh_secret, auth.otp_secret);
    }

    #[test]
    fn test_ensure_secrets_rejects_shared_token_secret() {
        let mut auth = AuthConfig {
            access_secret: "same".to_string(),
            refresh_secret: "same".to_string(),
            ..AuthConfig::default()
        };
        let err = auth.ensure_secrets().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_out_of_range_lifetimes_are_rejected() {
        for toml in [
            "[auth]\nsession_idle_days = 9223372036854775807",
            "[auth]\nrefresh_ttl_days = 0",
            "[auth]\naccess_ttl_minutes = -5",
            "[auth]\naccess_ttl_minutes = 9223372036854775807",
        ] {
            let err = Config::from_toml(toml).unwrap_err();
            assert!(err.to_string().contains("must be between"), "{}", toml);
        }
    }

    #[test]
    fn test_lifetime_durations() {
        let auth = AuthConfig::default();
        assert_eq!(auth.access_ttl(), Duration::minutes(40));
        assert_eq!(auth.refresh_ttl(), Duration::days(14));
        assert_eq!(auth.session_idle(), Duration::days(30));

        // Unvalidated values are clamped instead of overflowing
        let absurd = AuthConfig {
            session_idle_days: i64::MAX,
            ..AuthConfig::default()
        };
        assert_eq!(absurd.session_idle(), Duration::days(MAX_DAYS));
        assert!(!absurd.session_idle_cutoff().is_empty());
    }
}
