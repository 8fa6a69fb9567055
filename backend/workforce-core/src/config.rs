// src/config.rs
use std::path::PathBuf;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

pub const ENV_PREFIX: &str = "WORKFORCE_";
pub const DEFAULT_DATA_FILE: &str = "workforce_data.json";
pub const DEFAULT_MODEL_FILE: &str = "manpower_model.json";
/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;
/// Grace can stretch to the whole working day, never beyond.
pub const MAX_LATE_GRACE_MINUTES: i64 = 24 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    // Server
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,

    // Storage
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_model_file")]
    pub model_file: PathBuf,

    // Sessions
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    // Attendance
    #[serde(default = "default_work_start")]
    pub work_start: String,
    #[serde(default = "default_late_grace_minutes")]
    pub late_grace_minutes: i64,

    // Lunch coupons
    #[serde(default = "default_lunch_coupon_value")]
    pub lunch_coupon_value: Decimal,

    // Scheduled jobs
    #[serde(default = "default_job_interval_secs")]
    pub job_interval_secs: u64,

    // Recommender training
    #[serde(default = "default_training_epochs")]
    pub training_epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_data_file() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE)
}
fn default_model_file() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_FILE)
}
fn default_session_ttl_hours() -> i64 {
    12
}
fn default_work_start() -> String {
    "08:00".to_string()
}
fn default_late_grace_minutes() -> i64 {
    10
}
fn default_lunch_coupon_value() -> Decimal {
    dec!(25000)
}
fn default_job_interval_secs() -> u64 {
    60 * 60
}
fn default_training_epochs() -> usize {
    2000
}
fn default_learning_rate() -> f64 {
    0.1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cert_path: None,
            key_path: None,
            data_file: default_data_file(),
            model_file: default_model_file(),
            session_ttl_hours: default_session_ttl_hours(),
            work_start: default_work_start(),
            late_grace_minutes: default_late_grace_minutes(),
            lunch_coupon_value: default_lunch_coupon_value(),
            job_interval_secs: default_job_interval_secs(),
            training_epochs: default_training_epochs(),
            learning_rate: default_learning_rate(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.validate()?;
        info!(
            "Configuration loaded: {}:{}, data file {:?}",
            config.host, config.port, config.data_file
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.work_start_time()?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(AppError::ConfigError(format!(
                "session_ttl_hours must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }
        if !(0..=MAX_LATE_GRACE_MINUTES).contains(&self.late_grace_minutes) {
            return Err(AppError::ConfigError(format!(
                "late_grace_minutes must be between 0 and {}",
                MAX_LATE_GRACE_MINUTES
            )));
        }
        if self.cert_path.is_some() != self.key_path.is_some() {
            return Err(AppError::ConfigError(
                "cert_path and key_path must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn work_start_time(&self) -> Result<NaiveTime, AppError> {
        NaiveTime::parse_from_str(&self.work_start, "%H:%M").map_err(|e| {
            AppError::ConfigError(format!("invalid work_start '{}': {}", self.work_start, e))
        })
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.work_start_time().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn half_configured_tls_is_rejected() {
        let config = AppConfig {
            cert_path: Some("cert.pem".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        for late_grace_minutes in [-1, MAX_LATE_GRACE_MINUTES + 1, i64::MAX] {
            let config = AppConfig {
                late_grace_minutes,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
        }
        for session_ttl_hours in [0, -5, MAX_SESSION_TTL_HOURS + 1, i64::MAX] {
            let config = AppConfig {
                session_ttl_hours,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
        }
        let edge = AppConfig {
            late_grace_minutes: 0,
            session_ttl_hours: MAX_SESSION_TTL_HOURS,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn bad_work_start_is_rejected() {
        let config = AppConfig {
            work_start: "8 o'clock".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
