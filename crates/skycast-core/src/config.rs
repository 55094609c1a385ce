use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather fetching settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Gesture-recognition thresholds
    #[serde(default)]
    pub gestures: GestureConfig,

    /// Device-location settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Upstream provider endpoints
    #[serde(default)]
    pub providers: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Temperature unit preference
    pub temperature_unit: TemperatureUnit,

    /// Passive refresh interval in minutes
    pub refresh_minutes: u32,

    /// Age beyond which a bundle is marked stale, in minutes
    pub max_age_minutes: u32,

    /// Retry policy for failed fetches
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Auto,
            refresh_minutes: 15,
            max_age_minutes: 30,
            retry: RetrySettings::default(),
        }
    }
}

/// Exponential-backoff retry settings for the orchestrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum fetch attempts per request (first try included)
    pub max_attempts: u32,
    /// Initial delay between attempts (doubles each retry)
    pub base_delay_ms: u64,
    /// Cap on the backoff delay
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Minimum horizontal travel for a swipe, in pixels
    pub swipe_min_distance: f64,
    /// Minimum horizontal velocity for a swipe, in pixels per second
    pub swipe_min_velocity: f64,
    /// Maximum movement for a tap, in pixels
    pub tap_slop: f64,
    /// Maximum press duration for a tap, in milliseconds
    pub tap_timeout_ms: u64,
    /// Minimum downward travel for pull-to-refresh, in pixels
    pub pull_threshold: f64,
    /// Height of the top band where a pull may start, in pixels
    pub pull_region_height: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_min_distance: 50.0,
            swipe_min_velocity: 300.0,
            tap_slop: 10.0,
            tap_timeout_ms: 300,
            pull_threshold: 80.0,
            pull_region_height: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Reject device fixes with accuracy worse than this, in meters
    pub max_accuracy_meters: f64,
    /// Sensor read timeout in seconds
    pub sensor_timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_accuracy_meters: 500.0,
            sensor_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Open-Meteo-compatible forecast endpoint
    pub weather_url: String,
    /// Nominatim-compatible search endpoint
    pub geocoding_url: String,
    /// Identifying User-Agent header sent to both providers
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            weather_url: "https://api.open-meteo.com".to_string(),
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "Skycast/0.1.0 (https://github.com/skycast)".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            gestures: GestureConfig::default(),
            location: LocationConfig::default(),
            providers: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.providers.weather_url, "providers.weather_url", &mut result);
        self.validate_url(
            &self.providers.geocoding_url,
            "providers.geocoding_url",
            &mut result,
        );

        if self.providers.user_agent.trim().is_empty() {
            result.add_error("providers.user_agent", "User-Agent must not be empty");
        }

        if self.weather.max_age_minutes == 0 {
            result.add_error("weather.max_age_minutes", "Staleness window cannot be 0");
        }
        if self.weather.retry.max_attempts == 0 {
            result.add_error("weather.retry.max_attempts", "At least one attempt is required");
        }
        if self.weather.retry.max_attempts > 10 {
            result.add_warning(
                "weather.retry.max_attempts",
                "More than 10 attempts will hammer the provider",
            );
        }
        if self.weather.retry.base_delay_ms == 0 {
            result.add_warning(
                "weather.retry.base_delay_ms",
                "Zero base delay disables backoff spacing",
            );
        }

        if self.gestures.swipe_min_distance <= 0.0 {
            result.add_error("gestures.swipe_min_distance", "Threshold must be positive");
        }
        if self.gestures.swipe_min_velocity <= 0.0 {
            result.add_error("gestures.swipe_min_velocity", "Threshold must be positive");
        }
        if self.gestures.tap_slop <= 0.0 {
            result.add_error("gestures.tap_slop", "Threshold must be positive");
        }
        if self.gestures.pull_threshold <= 0.0 {
            result.add_error("gestures.pull_threshold", "Threshold must be positive");
        }

        if self.location.max_accuracy_meters <= 0.0 {
            result.add_error("location.max_accuracy_meters", "Threshold must be positive");
        }

        result
    }

    /// Validate that a provider URL parses and uses http(s)
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(field_name, "URL scheme must be http or https");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
