//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and per-field mutation for overrides in tests.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    /// Maximum Euclidean distance at which a probe descriptor is accepted as a match.
    pub face_match_tolerance: f64,
    /// Base URL of the external face-encoding provider.
    pub face_encoder_url: String,
    /// Per-image timeout for encoder calls; an image whose call exceeds this is skipped.
    pub face_encoder_timeout_seconds: u64,
    /// Minutes after session start beyond which an entry is flagged `late_entry`.
    /// Unset means the late-entry check is disabled.
    pub late_entry_grace_minutes: Option<i64>,
    /// Minutes before session close within which an exit is considered normal;
    /// earlier exits are flagged `early_exit`. Unset disables the check.
    pub early_exit_cutoff_minutes: Option<i64>,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn optional_minutes(var: &str) -> Option<i64> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<i64>() {
            Ok(v) if v >= 0 => Some(v),
            _ => {
                tracing::warn!("Ignoring invalid {var}={raw}; expected a non-negative integer");
                None
            }
        },
        _ => None,
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "rollcall".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .expect("PORT must be a valid u16"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: env::var("JWT_DURATION_MINUTES")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .expect("JWT_DURATION_MINUTES must be a valid integer"),
            face_match_tolerance: env::var("FACE_MATCH_TOLERANCE")
                .unwrap_or_else(|_| "0.5".into())
                .parse()
                .expect("FACE_MATCH_TOLERANCE must be a valid float"),
            face_encoder_url: env::var("FACE_ENCODER_URL").unwrap_or_default(),
            face_encoder_timeout_seconds: env::var("FACE_ENCODER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .expect("FACE_ENCODER_TIMEOUT_SECONDS must be a valid integer"),
            late_entry_grace_minutes: optional_minutes("LATE_ENTRY_GRACE_MINUTES"),
            early_exit_cutoff_minutes: optional_minutes("EARLY_EXIT_CUTOFF_MINUTES"),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_face_match_tolerance(value: f64) {
        AppConfig::set_field(|cfg| cfg.face_match_tolerance = value);
    }

    pub fn set_face_encoder_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.face_encoder_url = value.into());
    }

    pub fn set_late_entry_grace_minutes(value: Option<i64>) {
        AppConfig::set_field(|cfg| cfg.late_entry_grace_minutes = value);
    }

    pub fn set_early_exit_cutoff_minutes(value: Option<i64>) {
        AppConfig::set_field(|cfg| cfg.early_exit_cutoff_minutes = value);
    }
}

// --- Free accessors used throughout the workspace ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn face_match_tolerance() -> f64 {
    AppConfig::global().face_match_tolerance
}

pub fn face_encoder_url() -> String {
    AppConfig::global().face_encoder_url.clone()
}

pub fn face_encoder_timeout_seconds() -> u64 {
    AppConfig::global().face_encoder_timeout_seconds
}

pub fn late_entry_grace_minutes() -> Option<i64> {
    AppConfig::global().late_entry_grace_minutes
}

pub fn early_exit_cutoff_minutes() -> Option<i64> {
    AppConfig::global().early_exit_cutoff_minutes
}
