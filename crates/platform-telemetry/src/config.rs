//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Deployment environment (dev, staging, prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "investment-core".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IC_SERVICE_NAME`: Service name (default: investment-core)
    /// - `IC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `IC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `IC_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `IC_ENVIRONMENT`: Environment name (default: dev)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("IC_SERVICE_NAME")
                .unwrap_or_else(|_| "investment-core".to_string()),

            log_level: env::var("IC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("IC_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("IC_JSON_LOGS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(is_container),

            environment: env::var("IC_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
        }
    }

    /// Service name suffixed with the environment outside of dev.
    pub fn full_service_name(&self) -> String {
        if self.environment == "dev" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.environment)
        }
    }
}

/// Reads a boolean flag, falling back to `default` on anything unrecognised.
pub(crate) fn parse_flag(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "investment-core");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_full_service_name() {
        let mut config = TelemetryConfig::default();
        assert_eq!(config.full_service_name(), "investment-core");

        config.environment = "prod".to_string();
        assert_eq!(config.full_service_name(), "investment-core-prod");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE", false));
        assert!(!parse_flag("0", true));
        assert!(parse_flag("maybe", true));
    }
}
