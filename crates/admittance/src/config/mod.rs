use std::env;
use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;

use crate::workflows::admittance::{MarkingRules, SimilarityMatcher, DEFAULT_SIMILARITY_THRESHOLD};

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub admittance: AdmittanceConfig,
    pub storage: StorageConfig,
    pub sheets: SheetsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));
        let log_level = var_or("APP_LOG_LEVEL", "info");

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            admittance: AdmittanceConfig::from_env()?,
            storage: StorageConfig {
                input_dir: PathBuf::from(var_or("ADMITTANCE_INPUT_DIR", "./input")),
                output_dir: PathBuf::from(var_or("ADMITTANCE_OUTPUT_DIR", "./output")),
            },
            sheets: SheetsConfig::from_env(),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Matching heuristics and lottery seeding.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittanceConfig {
    pub similarity_threshold: f64,
    pub bad_email_endings: Vec<String>,
    pub seed: Option<u64>,
}

impl AdmittanceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let similarity_threshold = match env::var("ADMITTANCE_SIMILARITY_THRESHOLD") {
            Ok(raw) => parse_threshold(&raw)?,
            Err(_) => DEFAULT_SIMILARITY_THRESHOLD,
        };

        let bad_email_endings = env::var("ADMITTANCE_BAD_EMAIL_ENDINGS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| MarkingRules::default().bad_email_endings);

        let seed = match env::var("ADMITTANCE_SEED") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u64>().map_err(
                |source| ConfigError::InvalidSeed {
                    value: raw.clone(),
                    source,
                },
            )?),
            _ => None,
        };

        Ok(Self {
            similarity_threshold,
            bad_email_endings,
            seed,
        })
    }

    pub fn marking_rules(&self) -> MarkingRules {
        MarkingRules {
            matcher: SimilarityMatcher::new(self.similarity_threshold),
            bad_email_endings: self.bad_email_endings.clone(),
        }
    }
}

impl Default for AdmittanceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            bad_email_endings: MarkingRules::default().bad_email_endings,
            seed: None,
        }
    }
}

fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|source| ConfigError::UnparsableThreshold {
            value: raw.to_string(),
            source,
        })?;

    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidThreshold { value })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|entry| entry.trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Where sheets are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Names of the sheets making up one opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub registrations: String,
    pub timeslots: String,
    pub confirmed_duplicates: String,
    pub nonworking_emails: String,
    pub banned: String,
    pub down_prioritized: String,
}

impl SheetsConfig {
    fn from_env() -> Self {
        Self {
            registrations: var_or("ADMITTANCE_REGISTRATIONS_SHEET", "Responses"),
            timeslots: var_or("ADMITTANCE_TIMESLOTS_SHEET", "Timeslot Details"),
            confirmed_duplicates: var_or("ADMITTANCE_DUPLICATES_SHEET", "confirmed duplicates"),
            nonworking_emails: var_or("ADMITTANCE_NONWORKING_SHEET", "non-working emails"),
            banned: var_or("ADMITTANCE_BANNED_SHEET", "banned"),
            down_prioritized: var_or("ADMITTANCE_DOWN_PRIORITIZED_SHEET", "down prioritized"),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            registrations: "Responses".to_string(),
            timeslots: "Timeslot Details".to_string(),
            confirmed_duplicates: "confirmed duplicates".to_string(),
            nonworking_emails: "non-working emails".to_string(),
            banned: "banned".to_string(),
            down_prioritized: "down prioritized".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    UnparsableThreshold { value: String, source: ParseFloatError },
    InvalidThreshold { value: f64 },
    InvalidSeed { value: String, source: ParseIntError },
    DuplicateTimeslot(String),
    NoTimeslots,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnparsableThreshold { value, .. } => write!(
                f,
                "ADMITTANCE_SIMILARITY_THRESHOLD must be a number, got '{}'",
                value
            ),
            ConfigError::InvalidThreshold { value } => write!(
                f,
                "ADMITTANCE_SIMILARITY_THRESHOLD must be in (0, 1], got {}",
                value
            ),
            ConfigError::InvalidSeed { value, .. } => {
                write!(f, "ADMITTANCE_SEED must be a valid u64, got '{}'", value)
            }
            ConfigError::DuplicateTimeslot(name) => {
                write!(f, "timeslot '{}' is configured more than once", name)
            }
            ConfigError::NoTimeslots => write!(f, "the opening has no timeslots configured"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::UnparsableThreshold { source, .. } => Some(source),
            ConfigError::InvalidSeed { source, .. } => Some(source),
            ConfigError::InvalidThreshold { .. }
            | ConfigError::DuplicateTimeslot(_)
            | ConfigError::NoTimeslots => None,
        }
    }
}
