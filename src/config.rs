use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
pub const DEFAULT_CUTOFF_HOUR: u32 = 20;
const REPORT_FILE_NAME: &str = "it_vacancies_report.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REPORT_TIMEZONE '{0}' is not a known time zone")]
    InvalidTimezone(String),
    #[error("REPORT_CUTOFF_HOUR '{0}' must be an hour between 0 and 23")]
    InvalidCutoffHour(String),
}

/// Credentials for the destination channel. Present only when all four are set.
#[derive(Clone)]
pub struct ChannelConfig {
    pub api_id: i64,
    pub api_hash: String,
    pub session: String,
    pub destination: String,
}

// Secrets never reach the logs.
impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &redacted(&self.api_hash))
            .field("session", &redacted(&self.session))
            .field("destination", &self.destination)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

/// Why the channel configuration could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSetup {
    Missing(Vec<&'static str>),
    InvalidApiId(String),
}

impl std::fmt::Display for ChannelSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelSetup::Missing(names) => {
                write!(f, "missing environment variables: {}", names.join(", "))
            }
            ChannelSetup::InvalidApiId(value) => {
                write!(f, "API_ID must be a number, got: {}", value)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_path: PathBuf,
    pub timezone: Tz,
    pub cutoff_hour: u32,
    pub log_level: String,
    pub channel: Result<ChannelConfig, ChannelSetup>,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let output_path = var("OUTPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_output_path);

        let tz_name = var("REPORT_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = tz_name
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name.clone()))?;

        let cutoff_hour = match var("REPORT_CUTOFF_HOUR") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|h| *h < 24)
                .ok_or(ConfigError::InvalidCutoffHour(raw))?,
            None => DEFAULT_CUTOFF_HOUR,
        };

        let log_level = var("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            output_path,
            timezone,
            cutoff_hour,
            log_level,
            channel: channel_from_lookup(&var),
        })
    }
}

fn channel_from_lookup<F>(var: &F) -> Result<ChannelConfig, ChannelSetup>
where
    F: Fn(&str) -> Option<String>,
{
    let api_id = var("API_ID");
    let api_hash = var("API_HASH");
    let session = var("TELETHON_SESSION_STRING");
    let destination = var("DEST_CHANNEL");

    let mut missing = Vec::new();
    if api_id.is_none() {
        missing.push("API_ID");
    }
    if api_hash.is_none() {
        missing.push("API_HASH");
    }
    if session.is_none() {
        missing.push("TELETHON_SESSION_STRING");
    }
    if destination.is_none() {
        missing.push("DEST_CHANNEL");
    }

    let (Some(api_id), Some(api_hash), Some(session), Some(destination)) =
        (api_id, api_hash, session, destination)
    else {
        return Err(ChannelSetup::Missing(missing));
    };

    let api_id = api_id
        .trim()
        .parse::<i64>()
        .map_err(|_| ChannelSetup::InvalidApiId(api_id.clone()))?;

    Ok(ChannelConfig {
        api_id,
        api_hash,
        session,
        destination,
    })
}

fn default_output_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "it-vacancies") {
        proj_dirs.data_dir().join(REPORT_FILE_NAME)
    } else {
        PathBuf::from(REPORT_FILE_NAME)
    }
}

/// Contact strings go into the User-Agent; placeholders are rejected.
pub fn validate_contact(contact: Option<&str>) -> bool {
    let Some(contact) = contact.map(str::trim).filter(|c| !c.is_empty()) else {
        return false;
    };
    let lower = contact.to_lowercase();
    if ["example", "test", "your_email"]
        .iter()
        .any(|placeholder| lower.contains(placeholder))
    {
        return false;
    }
    contact.contains('@')
}
