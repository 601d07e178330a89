//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Document storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Outbound notification configuration.
    #[serde(default)]
    pub notifications: NotificationSettings,
    /// Application numbering and workflow settings.
    #[serde(default)]
    pub application: ApplicationSettings,
    /// Administrator account ensured at startup.
    #[serde(default)]
    pub admin: Option<AdminBootstrap>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of the portal (used in password reset links).
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing bearer tokens.
    pub jwt_secret: String,
    /// Token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Password reset token lifetime in minutes.
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
}

/// Document storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded documents are written under.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Outbound notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Portal name used in email templates.
    #[serde(default = "default_portal_name")]
    pub portal_name: String,
    /// Sender address for outbound email.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// SMTP relay; email is logged instead of sent when absent.
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
    /// SMS gateway; SMS delivery fails when absent.
    #[serde(default)]
    pub sms: Option<SmsSettings>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            portal_name: default_portal_name(),
            from_address: default_from_address(),
            smtp: None,
            sms: None,
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Twilio-compatible SMS gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsSettings {
    /// Gateway base URL.
    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
    /// Account SID.
    pub account_sid: String,
    /// Auth token.
    pub auth_token: String,
    /// Sender phone number.
    pub from_number: String,
}

/// Application workflow settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    /// Prefix of generated application numbers.
    #[serde(default = "default_number_prefix")]
    pub number_prefix: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            number_prefix: default_number_prefix(),
        }
    }
}

/// Bootstrap administrator.
///
/// An account with this email is created at startup if missing; an existing
/// account is granted the admin role. The password only applies on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrap {
    /// Sign-in email.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// First name of a newly created account.
    #[serde(default = "default_admin_first_name")]
    pub first_name: String,
    /// Last name of a newly created account.
    #[serde(default = "default_admin_last_name")]
    pub last_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_token_ttl_hours() -> i64 {
    24 * 30
}

const fn default_reset_ttl_minutes() -> i64 {
    10
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

const fn default_max_upload_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_portal_name() -> String {
    "Admissions Portal".to_string()
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_number_prefix() -> String {
    "BSU".to_string()
}

fn default_admin_first_name() -> String {
    "Admin".to_string()
}

fn default_admin_last_name() -> String {
    "User".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `ADMISSIONS_ENV`)
    /// 4. Environment variables with `ADMISSIONS_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("ADMISSIONS_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ADMISSIONS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ADMISSIONS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = config::Config::builder()
            .set_override("server.url", "https://portal.example.org")
            .and_then(|b| b.set_override("database.url", "postgres://localhost/admissions"))
            .and_then(|b| b.set_override("auth.jwt_secret", "secret"))
            .and_then(|b| b.build())
            .and_then(config::Config::try_deserialize)
            .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.application.number_prefix, "BSU");
        assert_eq!(config.auth.reset_token_ttl_minutes, 10);
        assert!(config.notifications.smtp.is_none());
        assert!(config.notifications.sms.is_none());
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_admin_block_fills_name_defaults() {
        let config: Config = config::Config::builder()
            .set_override("server.url", "https://portal.example.org")
            .and_then(|b| b.set_override("database.url", "postgres://localhost/admissions"))
            .and_then(|b| b.set_override("auth.jwt_secret", "secret"))
            .and_then(|b| b.set_override("admin.email", "registrar@example.org"))
            .and_then(|b| b.set_override("admin.password", "change-me-now"))
            .and_then(|b| b.build())
            .and_then(config::Config::try_deserialize)
            .unwrap();

        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "registrar@example.org");
        assert_eq!(admin.first_name, "Admin");
        assert_eq!(admin.last_name, "User");
    }
}
