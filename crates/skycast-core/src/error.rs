//! Centralized error types for the Skycast application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for UI display
//! - Keeps upstream failures as data: fetch and location errors are
//!   captured into request state, never thrown across the orchestration
//!   boundary

use std::time::Duration;

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Location(e) => e.user_message(),
            AppError::Fetch(e) => e.user_message(),
            AppError::Navigation(_) => "That action isn't available right now.",
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Location resolution errors (device sensor or manual search).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable")]
    Unavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location accuracy too low ({accuracy_meters:.0} m, limit {max_meters:.0} m)")]
    LowAccuracy {
        accuracy_meters: f64,
        max_meters: f64,
    },
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access is denied. Enable it in system settings."
            }
            LocationError::Unavailable => "Location is unavailable. Try searching instead.",
            LocationError::Timeout => "Finding your location took too long. Please try again.",
            LocationError::LowAccuracy { .. } => {
                "Your location reading was too imprecise. Try again or search manually."
            }
        }
    }
}

/// Errors from the weather and geocoding request/response boundaries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider")]
    RateLimited {
        /// Server-advised wait, when the provider sent one.
        retry_after: Option<Duration>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,
}

impl FetchError {
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "Unable to connect. Check your internet connection.",
            FetchError::RateLimited { .. } => {
                "The weather service is busy. Please wait a moment."
            }
            FetchError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            FetchError::Timeout => "The request timed out. Please try again.",
        }
    }

    /// Short stable name for telemetry attributes and state comparison.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::InvalidResponse(_) => "invalid_response",
            FetchError::Timeout => "timeout",
        }
    }
}

/// Navigation command errors, returned synchronously to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Invalid screen transition")]
    InvalidTransition,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
