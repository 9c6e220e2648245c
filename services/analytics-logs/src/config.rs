use crate::model::{LogListOptions, LogType, LogTypeFilter, RequestOptions, StorageService};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the log export tool
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// Which logs to export
    #[serde(default)]
    pub query: QueryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// S3 bucket holding the analytics logs
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket the `<service>/yyyy/MM/dd/HH/` log tree lives in
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// Log enumeration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Storage service whose logs are read
    #[serde(default)]
    pub service: StorageService,
    /// Inclusive start (RFC 3339); unbounded when unset
    pub start: Option<DateTime<Utc>>,
    /// Inclusive end (RFC 3339); unbounded when unset
    pub end: Option<DateTime<Utc>>,
    /// Operation categories to include
    #[serde(default = "default_log_types")]
    pub log_types: Vec<LogType>,
    /// Fetch blob metadata even when every log type is requested
    #[serde(default)]
    pub include_metadata: bool,
    /// Page size for listing calls
    pub max_results: Option<i32>,
    /// Timeout for each listing call in seconds
    pub listing_timeout_secs: Option<u64>,
}

// Default value functions
fn default_service_name() -> String {
    "analytics-logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_types() -> Vec<LogType> {
    vec![LogType::Read, LogType::Write, LogType::Delete]
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "analytics-logs")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/analytics-logs").required(false))
            .add_source(config::File::with_name("/etc/analytics-logs/config").required(false))
            // Override with environment variables
            // ANALYTICS_LOGS__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("ANALYTICS_LOGS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("query.log_types")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.s3.bucket.is_empty() {
            return Err(ConfigValidationError::MissingField("s3.bucket".to_string()));
        }

        if self.query.log_types.is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "query.log_types".to_string(),
                message: "at least one of read, write, delete is required".to_string(),
            });
        }

        if self.query.max_results.is_some_and(|max| max <= 0) {
            return Err(ConfigValidationError::InvalidValue {
                field: "query.max_results".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if let (Some(start), Some(end)) = (self.query.start, self.query.end) {
            if start > end {
                return Err(ConfigValidationError::InvalidValue {
                    field: "query.end".to_string(),
                    message: format!("{end} is before start {start}"),
                });
            }
        }

        Ok(())
    }
}

impl QueryConfig {
    /// Get listing timeout as Duration
    pub fn listing_timeout(&self) -> Option<Duration> {
        self.listing_timeout_secs.map(Duration::from_secs)
    }

    /// Build enumeration options from the configured query
    pub fn list_options(&self) -> LogListOptions {
        let log_types: LogTypeFilter = self.log_types.iter().copied().collect();
        let mut options = LogListOptions::default().with_log_types(log_types);
        if self.include_metadata {
            options = options.with_metadata();
        }
        options.request = RequestOptions {
            max_results: self.max_results,
            timeout: self.listing_timeout(),
        };
        options
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            service: StorageService::default(),
            start: None,
            end: None,
            log_types: default_log_types(),
            include_metadata: false,
            max_results: None,
            listing_timeout_secs: None,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            s3: S3Config {
                bucket: "storage-analytics".to_string(),
                region: default_region(),
                endpoint_url: None,
                force_path_style: false,
            },
            query: QueryConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let mut config = create_test_config();
        config.s3.bucket = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_empty_log_types() {
        let mut config = create_test_config();
        config.query.log_types.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_reversed_window() {
        let mut config = create_test_config();
        config.query.start = Some(Utc.with_ymd_and_hms(2023, 3, 14, 0, 0, 0).unwrap());
        config.query.end = Some(Utc.with_ymd_and_hms(2023, 3, 13, 0, 0, 0).unwrap());
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_list_options_from_query() {
        let mut config = create_test_config();
        config.query.log_types = vec![LogType::Write];
        config.query.max_results = Some(500);
        config.query.listing_timeout_secs = Some(20);

        let options = config.query.list_options();
        let filter = options.log_types.unwrap();
        assert!(filter.contains(LogType::Write));
        assert!(!filter.contains(LogType::Read));
        assert_eq!(options.request.max_results, Some(500));
        assert_eq!(options.request.timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_deserialize_query() {
        let query: QueryConfig = serde_json::from_str(
            r#"{
                "service": "queue",
                "start": "2023-03-13T10:00:00Z",
                "log_types": ["read", "delete"]
            }"#,
        )
        .unwrap();
        assert_eq!(query.service, StorageService::Queue);
        assert_eq!(
            query.start,
            Some(Utc.with_ymd_and_hms(2023, 3, 13, 10, 0, 0).unwrap())
        );
        assert_eq!(query.end, None);
        assert_eq!(query.log_types, vec![LogType::Read, LogType::Delete]);
        assert!(!query.include_metadata);
    }
}
