//! Caller-owned settings read by every lifecycle phase.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::descriptor::{CLI_CONFIG_FILE_NAME, MODULE_FILE_NAME, MODULE_NAME, RegistryCredential};

use super::TerraformError;

/// Binary, working directory, variables, environment and registry
/// credentials for a Terraform working directory.
///
/// Maps are keyed and ordered by name; adding a key twice keeps the last
/// value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TerraformSettings {
    /// Terraform executable.
    pub binary: Utf8PathBuf,
    /// Directory Terraform runs in and descriptors are written to.
    pub working_dir: Utf8PathBuf,
    /// Input variables passed as `-var` to plan, apply and destroy.
    pub vars: BTreeMap<String, String>,
    /// Backend settings passed as `-backend-config` to init.
    pub backend_vars: BTreeMap<String, String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Private registry credentials written to the CLI configuration.
    pub credentials: Vec<RegistryCredential>,
}

impl TerraformSettings {
    /// Creates settings for `binary` operating in `working_dir`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>, working_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    /// Ensures the binary and working directory are present.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::InvalidConfig`] when either is blank.
    pub fn validate(&self) -> Result<(), TerraformError> {
        Self::require_value(self.binary.as_str(), "binary")?;
        Self::require_value(self.working_dir.as_str(), "working_dir")
    }

    fn require_value(value: &str, field: &str) -> Result<(), TerraformError> {
        if value.trim().is_empty() {
            return Err(TerraformError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }

    /// Replaces all input variables.
    pub fn set_vars(&mut self, vars: BTreeMap<String, String>) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Adds or replaces one input variable.
    pub fn add_var(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Replaces all backend settings.
    pub fn set_backend_vars(&mut self, backend_vars: BTreeMap<String, String>) -> &mut Self {
        self.backend_vars = backend_vars;
        self
    }

    /// Adds or replaces one backend setting.
    pub fn add_backend_var(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.backend_vars.insert(key.into(), value.into());
        self
    }

    /// Replaces all environment overrides.
    pub fn set_env(&mut self, env: BTreeMap<String, String>) -> &mut Self {
        self.env = env;
        self
    }

    /// Adds or replaces one environment override.
    pub fn add_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replaces the registry credentials.
    pub fn set_registry(&mut self, credentials: Vec<RegistryCredential>) -> &mut Self {
        self.credentials = credentials;
        self
    }

    /// Returns `true` when at least one registry credential is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// Path of the CLI configuration holding registry credentials.
    #[must_use]
    pub fn config_file_path(&self) -> Utf8PathBuf {
        self.working_dir.join(CLI_CONFIG_FILE_NAME)
    }

    /// Path of the temporary module descriptor.
    #[must_use]
    pub fn module_file_path(&self) -> Utf8PathBuf {
        self.working_dir.join(MODULE_FILE_NAME)
    }

    /// Cache directory, relative to the working directory, where
    /// `terraform get` stores the fetched module.
    #[must_use]
    pub fn module_cache_dir() -> Utf8PathBuf {
        Utf8Path::new(".terraform").join("modules").join(MODULE_NAME)
    }
}
