//! Frozen, validated server configuration.
//!
//! Loading is env-var-first (the umbrella process manager / Docker entrypoint
//! that sets these variables is out of scope — see SPEC_FULL.md §1/§4.14);
//! what lives here is the frozen snapshot and its validation rules, built
//! once at startup the same way `server/src/main.rs` builds its `Cli` and
//! repo list once before anything else runs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

/// Frozen configuration snapshot. Constructed once via [`Config::from_env`]
/// and shared read-only (`Arc<Config>`) for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: Vec<u8>,
    pub library_directories: Vec<PathBuf>,
    pub port: u16,
    pub database_path: PathBuf,
    pub scan_interval: Duration,
    pub cleanup_interval: Duration,
    pub archive_retention: chrono::Duration,
    pub external_metadata_user_agent: Option<String>,
    pub google_books_api_key: Option<String>,
    pub dev_mode: bool,
}

const DEFAULT_PORT: u16 = 4001;
const DEFAULT_SCAN_MINUTES: u64 = 5;
const DEFAULT_CLEANUP_MINUTES: u64 = 60;
const DEFAULT_RETENTION_DAYS: i64 = 365;
const MIN_SECRET_BYTES: usize = 32;

impl Config {
    /// Build a `Config` from the process environment, applying defaults and
    /// validating everything that the rest of the system treats as a
    /// precondition (secret length, at least one library root, port range).
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid(
                "JWT_SECRET",
                format!("must be at least {MIN_SECRET_BYTES} bytes"),
            ));
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let library_directories: Vec<PathBuf> = std::env::var("DUST_DIRS")
            .map_err(|_| ConfigError::Missing("DUST_DIRS"))?
            .split(':')
            .filter(|s| !s.is_empty())
            .map(|s| resolve(&cwd, s))
            .collect();
        if library_directories.is_empty() {
            return Err(ConfigError::Invalid(
                "DUST_DIRS",
                "must name at least one directory".into(),
            ));
        }
        for dir in &library_directories {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(
                    "DUST_DIRS",
                    format!("{} must be absolute", dir.display()),
                ));
            }
        }

        let port = parse_env_or("PORT", DEFAULT_PORT)?;

        let database_path = std::env::var("DATABASE_URL")
            .map(|s| resolve(&cwd, &s))
            .unwrap_or_else(|_| cwd.join("stackhouse.db"));

        let scan_minutes: u64 = parse_env_or("SCAN_INTERVAL_MINUTES", DEFAULT_SCAN_MINUTES)?;
        let cleanup_minutes: u64 =
            parse_env_or("CLEANUP_INTERVAL_MINUTES", DEFAULT_CLEANUP_MINUTES)?;
        let retention_days: i64 = parse_env_or("ARCHIVE_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;

        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Config {
            jwt_secret,
            library_directories,
            port,
            database_path,
            scan_interval: Duration::from_secs(scan_minutes * 60),
            cleanup_interval: Duration::from_secs(cleanup_minutes * 60),
            archive_retention: chrono::Duration::days(retention_days),
            external_metadata_user_agent: std::env::var("EXTERNAL_METADATA_USER_AGENT").ok(),
            google_books_api_key: std::env::var("GOOGLE_BOOKS_API_KEY").ok(),
            dev_mode,
        })
    }
}

fn resolve(cwd: &std::path::Path, raw: &str) -> PathBuf {
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        p
    } else {
        cwd.join(p)
    }
}

fn parse_env_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid(key, format!("could not parse '{v}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `std::env` is process-global; serialize the env-mutating tests below
    // so they don't race each other under cargo's default parallel runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "JWT_SECRET",
            "DUST_DIRS",
            "PORT",
            "DATABASE_URL",
            "SCAN_INTERVAL_MINUTES",
            "CLEANUP_INTERVAL_MINUTES",
            "ARCHIVE_RETENTION_DAYS",
            "DEV_MODE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_secret_is_fatal() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("DUST_DIRS", "/tmp/lib");
        assert!(matches!(Config::from_env(), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn short_secret_is_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("JWT_SECRET", "too-short");
        std::env::set_var("DUST_DIRS", "/tmp/lib");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid("JWT_SECRET", _))));
    }

    #[test]
    fn defaults_apply() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("JWT_SECRET", "x".repeat(32));
        std::env::set_var("DUST_DIRS", "/tmp/lib");
        let cfg = Config::from_env().expect("valid config");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.library_directories, vec![PathBuf::from("/tmp/lib")]);
        assert_eq!(cfg.archive_retention, chrono::Duration::days(DEFAULT_RETENTION_DAYS));
    }

    #[test]
    fn relative_library_dir_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("JWT_SECRET", "x".repeat(32));
        std::env::set_var("DUST_DIRS", "relative/path");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid("DUST_DIRS", _))));
    }
}
