use crate::error::ConfigError;
use crate::models::row::EmailColumn;
use crate::pipeline::PipelineConfig;
use crate::validation::providers::FreeProviderSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Run configuration read from environment variables.
///
/// `main` loads a `.env` file first (if present), so every value below can
/// also be set there.
///
/// | Variable           | Default           |
/// |--------------------|-------------------|
/// | `INPUT_FILE`       | `emails.csv`      |
/// | `GOOD_FILE`        | `emails_good.csv` |
/// | `BAD_FILE`         | `emails_bad.csv`  |
/// | `EMAIL_COLUMN`     | `Email`           |
/// | `THREADS`          | `50`              |
/// | `QUEUE_CAPACITY`   | `256`             |
/// | `MAX_IN_FLIGHT`    | `1000`            |
/// | `DNS_TIMEOUT_SECS` | `5`               |
/// | `DNS_ATTEMPTS`     | `1`               |
/// | `IMPLICIT_MX`      | `false`           |
/// | `PROGRESS_EVERY`   | `10000`           |
/// | `FREE_PROVIDERS`   | built-in list     |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub input_file: PathBuf,
    pub good_file: PathBuf,
    pub bad_file: PathBuf,
    pub email_column: EmailColumn,
    pub threads: usize,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
    pub dns_timeout: Duration,
    pub dns_attempts: usize,
    pub implicit_mx: bool,
    pub progress_every: u64,
    pub free_providers: FreeProviderSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("emails.csv"),
            good_file: PathBuf::from("emails_good.csv"),
            bad_file: PathBuf::from("emails_bad.csv"),
            email_column: EmailColumn::default(),
            threads: 50,
            queue_capacity: 256,
            max_in_flight: 1000,
            dns_timeout: Duration::from_secs(5),
            dns_attempts: 1,
            implicit_mx: false,
            progress_every: 10_000,
            free_providers: FreeProviderSet::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let dns_timeout = match var("DNS_TIMEOUT_SECS") {
            Some(value) => parse_seconds("DNS_TIMEOUT_SECS", &value)?,
            None => defaults.dns_timeout,
        };

        let free_providers = match var("FREE_PROVIDERS") {
            Some(list) => FreeProviderSet::from_domains(list.split(',')),
            None => defaults.free_providers,
        };

        Ok(Self {
            input_file: var("INPUT_FILE").map(PathBuf::from).unwrap_or(defaults.input_file),
            good_file: var("GOOD_FILE").map(PathBuf::from).unwrap_or(defaults.good_file),
            bad_file: var("BAD_FILE").map(PathBuf::from).unwrap_or(defaults.bad_file),
            email_column: var("EMAIL_COLUMN")
                .map(|value| EmailColumn::parse(&value))
                .unwrap_or(defaults.email_column),
            threads: parse_positive("THREADS", var("THREADS"), defaults.threads)?,
            queue_capacity: parse_positive("QUEUE_CAPACITY", var("QUEUE_CAPACITY"), defaults.queue_capacity)?,
            max_in_flight: parse_positive("MAX_IN_FLIGHT", var("MAX_IN_FLIGHT"), defaults.max_in_flight)?,
            dns_timeout,
            dns_attempts: parse_positive("DNS_ATTEMPTS", var("DNS_ATTEMPTS"), defaults.dns_attempts)?,
            implicit_mx: match var("IMPLICIT_MX") {
                Some(value) => parse_bool("IMPLICIT_MX", &value)?,
                None => defaults.implicit_mx,
            },
            progress_every: parse_value("PROGRESS_EVERY", var("PROGRESS_EVERY"), defaults.progress_every)?,
            free_providers,
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.threads,
            queue_capacity: self.queue_capacity,
            max_in_flight: self.max_in_flight,
            email_column: self.email_column.clone(),
            progress_every: self.progress_every,
        }
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, &value, "not a number")),
        None => Ok(default),
    }
}

fn parse_positive(key: &'static str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let raw = value.clone();
    match parse_value(key, value, default)? {
        0 => Err(ConfigError::invalid(key, &raw.unwrap_or_default(), "must be at least 1")),
        parsed => Ok(parsed),
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "not a number"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::invalid(key, value, "must be a positive number of seconds"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::invalid(key, value, "out of range"))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected true or false")),
    }
}
