//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::terraform::TerraformSettings;

/// Name used for configuration discovery and as the synthetic program name.
pub const APP_NAME: &str = "tfcli";

/// Terraform binary and working directory derived from defaults, `tfcli.toml`
/// and environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "TFCLI",
    discovery(
        app_name = "tfcli",
        env_var = "TFCLI_CONFIG_PATH",
        config_file_name = "tfcli.toml",
        dotfile_name = ".tfcli.toml",
        project_file_name = "tfcli.toml"
    )
)]
pub struct TerraformConfig {
    /// Terraform executable, resolved through `PATH` when not absolute.
    #[ortho_config(default = "terraform".to_owned())]
    pub terraform_bin: String,
    /// Directory holding the Terraform configuration.
    #[ortho_config(default = ".".to_owned())]
    pub working_dir: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl TerraformConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to tfcli.toml",
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
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages name
    /// the environment variable and TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.terraform_bin,
            &FieldMetadata {
                description: "Terraform executable",
                env_var: "TFCLI_TERRAFORM_BIN",
                toml_key: "terraform_bin",
            },
        )?;
        Self::require_field(
            &self.working_dir,
            &FieldMetadata {
                description: "Terraform working directory",
                env_var: "TFCLI_WORKING_DIR",
                toml_key: "working_dir",
            },
        )
    }

    /// Builds settings seeded with the configured binary and working
    /// directory. Variables, environment overrides and credentials start
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when validation fails.
    pub fn settings(&self) -> Result<TerraformSettings, ConfigError> {
        self.validate()?;
        Ok(TerraformSettings::new(
            Utf8PathBuf::from(&self.terraform_bin),
            Utf8PathBuf::from(&self.working_dir),
        ))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
