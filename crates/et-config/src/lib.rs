//! # et-config
//!
//! Layered runtime settings: built-in defaults, then an optional
//! `config/eventthreads.toml`, then `ET__`-prefixed environment variables
//! (e.g. `ET__SERVER__PORT=9000`). A `.env` file is loaded first if present.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "config/eventthreads";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    #[serde(default)]
    pub admin: AdminSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin (the web client is served separately)
    pub cors_allow_any_origin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    pub format: LogFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminSettings {
    pub username: Option<String>,
    /// PHC-formatted Argon2 hash of the admin password
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password_hash: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

impl Settings {
    /// Loads settings from `.env`, the default config file and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let builder = defaults()?
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("ET").separator("__").try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        match (&self.admin.username, &self.admin.password_hash) {
            (Some(name), _) if name.trim().is_empty() => {
                Err(SettingsError::Invalid("admin.username must not be blank".into()))
            }
            (Some(_), None) => Err(SettingsError::Invalid(
                "admin.password_hash is required when admin.username is set".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Built-in defaults every other source is layered over.
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, SettingsError> {
    Ok(Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5000)?
        .set_default("server.cors_allow_any_origin", true)?
        .set_default("log.filter", "info")?
        .set_default("log.format", "pretty")?)
}

#[cfg(test)]
mod tests {
    use config::FileFormat;
    use secrecy::ExposeSecret;

    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, SettingsError> {
        let source = File::from_str(toml, FileFormat::Toml);
        Settings::from_builder(defaults().unwrap().add_source(source))
    }

    #[test]
    fn test_defaults_apply() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.bind_addr(), "127.0.0.1:5000");
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert!(settings.admin.username.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let settings = from_toml(
            r#"
            [server]
            port = 8080
            [log]
            format = "json"
            [admin]
            username = "root"
            password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$aGFzaA"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.admin.username.as_deref(), Some("root"));
        assert!(settings.admin.password_hash.unwrap().expose_secret().starts_with("$argon2id$"));
    }

    #[test]
    fn test_admin_without_hash_is_rejected() {
        let err = from_toml("[admin]\nusername = \"root\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }
}
