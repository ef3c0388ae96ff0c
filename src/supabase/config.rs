//! Backend configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_PROFILE_TABLE: &str = "users";
pub const DEFAULT_PROFILE_COLUMNS: &str = "*,role";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL without trailing slash, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    pub profile_table: String,
    pub profile_columns: String,
    /// Where the current session is persisted between runs. `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
    pub timeouts: HttpTimeouts,
}

impl SupabaseConfig {
    /// Config with defaults for everything but the project URL and key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `url` is not an http(s) URL or the key is blank.
    pub fn new(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: normalize_url(url)?,
            anon_key: non_blank("SUPABASE_ANON_KEY", anon_key)?,
            profile_table: DEFAULT_PROFILE_TABLE.to_owned(),
            profile_columns: DEFAULT_PROFILE_COLUMNS.to_owned(),
            session_file: None,
            timeouts: HttpTimeouts::default(),
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `WOLVADMIN_PROFILE_TABLE`: default `users`
    /// - `WOLVADMIN_PROFILE_COLUMNS`: default `*,role`
    /// - `WOLVADMIN_SESSION_FILE`: unset keeps the session in memory only
    /// - `SUPABASE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SUPABASE_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing { var: "SUPABASE_URL" })?;
        let anon_key =
            std::env::var("SUPABASE_ANON_KEY").map_err(|_| ConfigError::Missing { var: "SUPABASE_ANON_KEY" })?;
        let mut config = Self::new(&url, &anon_key)?;

        if let Ok(table) = std::env::var("WOLVADMIN_PROFILE_TABLE") {
            config.profile_table = non_blank("WOLVADMIN_PROFILE_TABLE", &table)?;
        }
        if let Ok(columns) = std::env::var("WOLVADMIN_PROFILE_COLUMNS") {
            config.profile_columns = non_blank("WOLVADMIN_PROFILE_COLUMNS", &columns)?;
        }
        config.session_file = std::env::var_os("WOLVADMIN_SESSION_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        config.timeouts = HttpTimeouts {
            request_secs: env_parse_u64("SUPABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_u64("SUPABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(config)
    }

    /// Base URL of the hosted auth API.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url)
    }

    /// Base URL of the hosted row-store API.
    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }
}

fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| ConfigError::Invalid { var: "SUPABASE_URL", reason: e.to_string() })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            var: "SUPABASE_URL",
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_owned())
}

fn non_blank(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid { var, reason: "must not be empty".into() });
    }
    Ok(trimmed.to_owned())
}

fn env_parse_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid { var, reason: e.to_string() }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
