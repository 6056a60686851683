use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_ADVANCE_NOTICE_DAYS: i64 = 14;
const DEFAULT_APPROVAL_COST_THRESHOLD: f64 = 10_000.0;

/// Policy knobs consumed by the due calculator and the work-order engine.
///
/// These are deliberately configuration, not constants: fleets differ on how
/// far ahead "due soon" should warn and which work orders need sign-off.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MaintenancePolicy {
    /// How many days before a calendar due date a schedule reports "due soon"
    #[serde(default = "default_advance_notice_days")]
    #[validate(range(min = 0, message = "Advance notice days cannot be negative"))]
    pub advance_notice_days: i64,

    /// Estimated total cost above which a work order requires approval
    #[serde(default = "default_approval_cost_threshold")]
    #[validate(range(min = 0.0, message = "Approval cost threshold cannot be negative"))]
    pub approval_cost_threshold: f64,
}

impl Default for MaintenancePolicy {
    fn default() -> Self {
        Self {
            advance_notice_days: default_advance_notice_days(),
            approval_cost_threshold: default_approval_cost_threshold(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Maximum number of database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Acquire timeout in seconds
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Maintenance policy block
    #[serde(default)]
    pub maintenance: MaintenancePolicy,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_advance_notice_days() -> i64 {
    DEFAULT_ADVANCE_NOTICE_DAYS
}

fn default_approval_cost_threshold() -> f64 {
    DEFAULT_APPROVAL_COST_THRESHOLD
}

impl AppConfig {
    /// Loads configuration from layered sources: `config/default`, the
    /// environment-specific file, then `MAINT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let cfg = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
            .add_source(Environment::with_prefix("MAINT").separator("__"))
            .build()?;

        let app: AppConfig = cfg.try_deserialize()?;
        app.validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        app.maintenance
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(app)
    }

    /// Minimal configuration for tests backed by a throwaway database.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            maintenance: MaintenancePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_has_default_policy() {
        let cfg = AppConfig::for_tests("sqlite::memory:");
        assert_eq!(cfg.maintenance.advance_notice_days, 14);
        assert_eq!(cfg.maintenance.approval_cost_threshold, 10_000.0);
        assert_eq!(cfg.db_max_connections, 1);
    }

    #[test]
    fn negative_advance_notice_fails_validation() {
        let policy = MaintenancePolicy {
            advance_notice_days: -1,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
