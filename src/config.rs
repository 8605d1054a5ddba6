//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::correlation::AmbiguityPolicy;
use crate::lifecycle::LifecycleTimings;

/// Provider endpoint, credentials and timing configuration derived from
/// environment variables and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VBRIDGE",
    discovery(
        app_name = "vbridge",
        env_var = "VBRIDGE_CONFIG_PATH",
        config_file_name = "vbridge.toml",
        dotfile_name = ".vbridge.toml",
        project_file_name = "vbridge.toml"
    )
)]
pub struct ProviderConfig {
    /// Base URL of the provider REST API. This value is required.
    pub api_url: String,
    /// Bearer credential sent with every request. This value is required.
    pub api_key: String,
    /// Caller identity sent in the `x-mcs-user` header. This value is required.
    pub user_email: String,
    /// Seconds between correlation attempts. Defaults to 5.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Seconds allowed for a provisioned machine to appear. Defaults to 120.
    #[ortho_config(default = 120)]
    pub provision_timeout_secs: u64,
    /// Seconds allowed for a new disk to appear. Defaults to 120.
    #[ortho_config(default = 120)]
    pub disk_timeout_secs: u64,
    /// Seconds allowed for a new bucket to appear. Defaults to 60.
    #[ortho_config(default = 60)]
    pub bucket_timeout_secs: u64,
    /// Seconds to wait between power-off and delete. Defaults to 10.
    #[ortho_config(default = 10)]
    pub settle_delay_secs: u64,
    /// Tie-break rule when several candidates match: `first-match` or
    /// `reject`. Defaults to `first-match`.
    #[ortho_config(default = "first-match".to_owned())]
    pub ambiguity_policy: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl ProviderConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to vbridge.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidField(format!(
                "{} must be greater than zero: check {} or {} in vbridge.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("vbridge")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide values via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidField`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_url,
            &FieldMetadata::new("provider API URL", "VBRIDGE_API_URL", "api_url"),
        )?;
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("provider API key", "VBRIDGE_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.user_email,
            &FieldMetadata::new("caller email", "VBRIDGE_USER_EMAIL", "user_email"),
        )?;

        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidField(format!(
                "provider API URL `{url}` must start with http:// or https://: check \
                 VBRIDGE_API_URL or api_url in vbridge.toml"
            )));
        }

        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "VBRIDGE_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            self.provision_timeout_secs,
            &FieldMetadata::new(
                "provision timeout",
                "VBRIDGE_PROVISION_TIMEOUT_SECS",
                "provision_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.disk_timeout_secs,
            &FieldMetadata::new(
                "disk timeout",
                "VBRIDGE_DISK_TIMEOUT_SECS",
                "disk_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.bucket_timeout_secs,
            &FieldMetadata::new(
                "bucket timeout",
                "VBRIDGE_BUCKET_TIMEOUT_SECS",
                "bucket_timeout_secs",
            ),
        )?;
        self.ambiguity()?;
        Ok(())
    }

    /// Parses the configured ambiguity policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for an unknown policy name.
    pub fn ambiguity(&self) -> Result<AmbiguityPolicy, ConfigError> {
        self.ambiguity_policy.parse().map_err(|err| {
            ConfigError::InvalidField(format!(
                "{err}: check VBRIDGE_AMBIGUITY_POLICY or ambiguity_policy in vbridge.toml"
            ))
        })
    }

    /// Builds the orchestrator timings after validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn timings(&self) -> Result<LifecycleTimings, ConfigError> {
        self.validate()?;
        LifecycleTimings::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.provision_timeout_secs),
            Duration::from_secs(self.disk_timeout_secs),
            Duration::from_secs(self.bucket_timeout_secs),
            Duration::from_secs(self.settle_delay_secs),
        )
        .map_err(|err| ConfigError::InvalidField(err.to_string()))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration field: {0}")]
    InvalidField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
