//! Configuration loading and resolution
//!
//! Sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! The result is one immutable [`AppConfig`] handed to every request
//! through the web crate's shared state.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::columns::{ColumnRule, ColumnRules};
use crate::stats::{PercentilePolicy, StatsSettings};
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_STUDENT_APP_NAME: &str = "Student Grade Portal";
pub const DEFAULT_ADMIN_APP_NAME: &str = "Teacher Admin Console";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Deployment flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// One subject per deployment; students and teachers
    #[default]
    Student,
    /// Teachers only, every subject
    Admin,
}

impl FromStr for AppMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "student" => Ok(AppMode::Student),
            "admin" => Ok(AppMode::Admin),
            other => Err(Error::Config(format!("unknown APP_MODE: {other}"))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error);
    /// RUST_LOG overrides it
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

/// `[oauth]` table of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OAuthToml {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

/// Bootstrap configuration loaded from the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub app_name: Option<String>,
    pub subject: Option<String>,
    pub mode: Option<AppMode>,
    pub teacher_whitelist: Vec<String>,
    pub known_subjects: Option<Vec<String>>,
    pub percentile_policy: Option<PercentilePolicy>,
    pub full_marks: Option<f64>,
    /// Extra or replacement column rules
    pub columns: Vec<ColumnRule>,
    pub oauth: OAuthToml,
    pub session_secret: Option<String>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_bytes: Option<usize>,
    pub logging: LoggingConfig,
}

/// Values coming from the command line or the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub app_name: Option<String>,
    pub subject: Option<String>,
    pub mode: Option<String>,
    /// Comma separated
    pub teacher_whitelist: Option<String>,
    /// Comma separated
    pub known_subjects: Option<String>,
    pub percentile_policy: Option<String>,
    pub session_secret: Option<String>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_url: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ConfigOverrides {
    /// Read the recognized environment variables
    pub fn from_env() -> Result<Self> {
        let port = match env_var("GRADE_PORT") {
            Some(p) => Some(
                p.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("invalid GRADE_PORT '{p}': {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            app_name: env_var("APP_NAME"),
            subject: env_var("APP_SUBJECT"),
            mode: env_var("APP_MODE"),
            teacher_whitelist: env_var("TEACHER_WHITELIST"),
            known_subjects: env_var("KNOWN_SUBJECTS"),
            percentile_policy: env_var("PERCENTILE_POLICY"),
            session_secret: env_var("SESSION_SECRET"),
            database_path: env_var("GRADE_DATABASE").map(PathBuf::from),
            host: env_var("GRADE_HOST"),
            port,
            oauth_client_id: env_var("GOOGLE_CLIENT_ID"),
            oauth_client_secret: env_var("GOOGLE_CLIENT_SECRET"),
            oauth_redirect_url: env_var("GOOGLE_REDIRECT_URL"),
        })
    }

    /// Fill every unset field from `lower`
    pub fn or(self, lower: ConfigOverrides) -> Self {
        Self {
            app_name: self.app_name.or(lower.app_name),
            subject: self.subject.or(lower.subject),
            mode: self.mode.or(lower.mode),
            teacher_whitelist: self.teacher_whitelist.or(lower.teacher_whitelist),
            known_subjects: self.known_subjects.or(lower.known_subjects),
            percentile_policy: self.percentile_policy.or(lower.percentile_policy),
            session_secret: self.session_secret.or(lower.session_secret),
            database_path: self.database_path.or(lower.database_path),
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            oauth_client_id: self.oauth_client_id.or(lower.oauth_client_id),
            oauth_client_secret: self.oauth_client_secret.or(lower.oauth_client_secret),
            oauth_redirect_url: self.oauth_redirect_url.or(lower.oauth_redirect_url),
        }
    }
}

/// OAuth2 client settings for the identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
        }
    }
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub mode: AppMode,
    /// Fixed subject in student mode
    pub subject: Option<String>,
    /// Lower-cased teacher emails
    pub teacher_whitelist: Vec<String>,
    pub known_subjects: Vec<String>,
    pub percentile_policy: PercentilePolicy,
    pub full_marks: f64,
    pub columns: ColumnRules,
    pub oauth: OAuthConfig,
    /// None: generate and persist one in the database
    pub session_secret: Option<String>,
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub logging: LoggingConfig,
}

/// Split a comma separated list, dropping blanks
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_known_subjects() -> Vec<String> {
    vec!["circuit".to_string(), "antenna".to_string()]
}

impl AppConfig {
    /// Combine TOML values with overrides (overrides win)
    pub fn resolve(toml: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let mode = match overrides.mode.as_deref() {
            Some(raw) => raw.parse::<AppMode>()?,
            None => toml.mode.unwrap_or_default(),
        };

        let subject = overrides
            .subject
            .or(toml.subject)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if mode == AppMode::Student && subject.is_none() {
            return Err(Error::Config(
                "a subject (APP_SUBJECT) is required in student mode".to_string(),
            ));
        }

        let app_name = overrides.app_name.or(toml.app_name).unwrap_or_else(|| {
            match mode {
                AppMode::Student => DEFAULT_STUDENT_APP_NAME,
                AppMode::Admin => DEFAULT_ADMIN_APP_NAME,
            }
            .to_string()
        });

        let teacher_whitelist = match overrides.teacher_whitelist {
            Some(raw) => parse_list(&raw),
            None => toml.teacher_whitelist,
        }
        .into_iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

        let known_subjects = match overrides.known_subjects {
            Some(raw) => parse_list(&raw),
            None => toml.known_subjects.unwrap_or_else(default_known_subjects),
        };

        let percentile_policy = match overrides.percentile_policy {
            Some(raw) => raw.parse::<PercentilePolicy>().map_err(Error::Config)?,
            None => toml.percentile_policy.unwrap_or_default(),
        };

        let full_marks = toml.full_marks.unwrap_or(100.0);
        if !full_marks.is_finite() || full_marks <= 0.0 {
            return Err(Error::Config(format!("full_marks must be positive, got {full_marks}")));
        }

        let defaults = OAuthConfig::default();
        let oauth = OAuthConfig {
            client_id: overrides
                .oauth_client_id
                .or(toml.oauth.client_id)
                .unwrap_or_default(),
            client_secret: overrides
                .oauth_client_secret
                .or(toml.oauth.client_secret)
                .unwrap_or_default(),
            redirect_url: overrides
                .oauth_redirect_url
                .or(toml.oauth.redirect_url)
                .unwrap_or_default(),
            auth_url: toml.oauth.auth_url.unwrap_or(defaults.auth_url),
            token_url: toml.oauth.token_url.unwrap_or(defaults.token_url),
            userinfo_url: toml.oauth.userinfo_url.unwrap_or(defaults.userinfo_url),
            scopes: defaults.scopes,
        };

        Ok(Self {
            app_name,
            mode,
            subject,
            teacher_whitelist,
            known_subjects,
            percentile_policy,
            full_marks,
            columns: ColumnRules::with_overrides(&toml.columns),
            oauth,
            session_secret: overrides.session_secret.or(toml.session_secret),
            database_path: overrides
                .database_path
                .or(toml.database_path)
                .unwrap_or_else(default_database_path),
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            logging: toml.logging,
        })
    }

    /// Load the TOML file (if any) and apply overrides.
    ///
    /// An explicitly named file must exist; the platform default may be
    /// missing, in which case compiled defaults are used.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml = match config_path {
            Some(path) => load_toml_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_toml_config(&path)?,
                _ => {
                    warn!("No config file found, using defaults and environment");
                    TomlConfig::default()
                }
            },
        };
        Self::resolve(toml, overrides)
    }

    pub fn is_admin(&self) -> bool {
        self.mode == AppMode::Admin
    }

    /// Exact, case-insensitive whitelist membership
    pub fn is_teacher(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        !email.is_empty() && self.teacher_whitelist.iter().any(|t| *t == email)
    }

    /// Subject a request operates on.
    ///
    /// Student mode always uses the configured subject; admin mode takes it
    /// from the request.
    pub fn subject_for(&self, requested: Option<&str>) -> Option<String> {
        match self.mode {
            AppMode::Student => self.subject.clone(),
            AppMode::Admin => requested
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    pub fn stats_settings(&self) -> StatsSettings {
        StatsSettings {
            percentile_policy: self.percentile_policy,
            full_marks: self.full_marks,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("invalid TOML in {}: {e}", path.display())))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Fill unset environment variables from a `.env` file.
///
/// `None` looks in the working directory and its parents. Variables already
/// present in the process environment are left alone. A missing file is
/// `Ok(None)`.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::Config(format!("invalid .env file: {e}"))),
    }
}

/// Platform config file location (`<config dir>/grade-report/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("grade-report").join("config.toml"))
}

/// Platform database location (`<local data dir>/grade-report/grades.db`)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("grade-report"))
        .unwrap_or_else(|| PathBuf::from("./grade_data"))
        .join("grades.db")
}
