use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;

use crate::workflows::quote::CalculationConfig;

/// Distinguishes runtime behavior for different stages of the service.
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
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pricing: CalculationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pricing: load_pricing()?,
        })
    }
}

/// Pricing overrides; anything unset keeps the documented default table.
fn load_pricing() -> Result<CalculationConfig, ConfigError> {
    let mut pricing = CalculationConfig::default();

    if let Some(rate) = decimal_var("PRICING_BASE_RATE")? {
        pricing.depreciation_base_rate = rate;
    }
    if let Ok(raw) = env::var("PRICING_SEVERITY_MULTIPLIERS") {
        pricing.severity_multipliers = parse_multipliers(&raw)?;
    }
    if let Some(cost) = decimal_var("PRICING_TRACKING_MONTHLY_COST")? {
        pricing.tracking_monthly_cost = cost;
    }
    if let Some(percentage) = decimal_var("PRICING_EXTRA_KM_PERCENTAGE")? {
        pricing.extra_km_percentage = percentage;
    }
    if let Some(percent) = decimal_var("PRICING_IPVA_ANNUAL_PERCENT")? {
        pricing.ipva_annual_percent = percent;
    }
    if let Some(fee) = decimal_var("PRICING_LICENSING_ANNUAL_FEE")? {
        pricing.licensing_annual_fee = fee;
    }

    pricing
        .validate()
        .map_err(|err| ConfigError::InvalidPricing {
            variable: "PRICING_*",
            reason: err.to_string(),
        })?;

    Ok(pricing)
}

fn decimal_var(variable: &'static str) -> Result<Option<Decimal>, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidPricing {
                variable,
                reason: err.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn parse_multipliers(raw: &str) -> Result<[Decimal; 6], ConfigError> {
    let values = raw
        .split(',')
        .map(|value| value.trim().parse::<Decimal>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ConfigError::InvalidPricing {
            variable: "PRICING_SEVERITY_MULTIPLIERS",
            reason: err.to_string(),
        })?;

    let count = values.len();
    values
        .try_into()
        .map_err(|_| ConfigError::InvalidPricing {
            variable: "PRICING_SEVERITY_MULTIPLIERS",
            reason: format!("expected 6 comma-separated values, found {count}"),
        })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPricing { variable: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPricing { variable, reason } => {
                write!(f, "{variable} is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidPricing { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "PRICING_BASE_RATE",
            "PRICING_SEVERITY_MULTIPLIERS",
            "PRICING_TRACKING_MONTHLY_COST",
            "PRICING_EXTRA_KM_PERCENTAGE",
            "PRICING_IPVA_ANNUAL_PERCENT",
            "PRICING_LICENSING_ANNUAL_FEE",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pricing, CalculationConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn pricing_overrides_replace_defaults() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRICING_BASE_RATE", "0.30");
        env::set_var(
            "PRICING_SEVERITY_MULTIPLIERS",
            "0.05, 0.07, 0.09, 0.11, 0.13, 0.16",
        );
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.pricing.depreciation_base_rate, Decimal::new(30, 2));
        assert_eq!(config.pricing.severity_multiplier(6), Some(Decimal::new(16, 2)));
        reset_env();
    }

    #[test]
    fn rejects_wrong_multiplier_count() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRICING_SEVERITY_MULTIPLIERS", "0.05,0.07");
        let error = AppConfig::load().expect_err("two multipliers rejected");
        assert_eq!(
            error.to_string(),
            "PRICING_SEVERITY_MULTIPLIERS is invalid: expected 6 comma-separated values, found 2"
        );
        reset_env();
    }
}
