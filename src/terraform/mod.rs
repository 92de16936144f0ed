//! Terraform lifecycle orchestration.
//!
//! [`Terraform`] owns the settings for one working directory and drives the
//! Terraform CLI through init, plan, apply, destroy, output and module
//! fetching. Every phase is a single blocking process run through a
//! [`CommandRunner`], so tests can substitute a scripted runner for the real
//! binary.

mod error;
mod module;
mod settings;

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::descriptor::write_credentials_descriptor;
use crate::invocation::{InvocationBuilder, Phase};
use crate::output::{decode, decode_version};
use crate::runner::{CommandRunner, CommandStatus, ProcessCommandRunner};

pub use error::TerraformError;
pub use settings::TerraformSettings;

/// Drives the Terraform CLI for a single working directory.
pub struct Terraform<R: CommandRunner> {
    settings: TerraformSettings,
    runner: R,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Terraform<ProcessCommandRunner> {
    /// Creates an orchestrator that spawns the real Terraform binary.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::InvalidConfig`] when the settings fail
    /// validation.
    pub fn with_process_runner(settings: TerraformSettings) -> Result<Self, TerraformError> {
        Self::new(settings, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> fmt::Debug for Terraform<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terraform")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner> Terraform<R> {
    /// Creates an orchestrator with a custom runner. Output from every phase
    /// except `output` and `version` is discarded until sinks are set.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::InvalidConfig`] when the settings fail
    /// validation.
    pub fn new(settings: TerraformSettings, runner: R) -> Result<Self, TerraformError> {
        settings.validate()?;
        Ok(Self {
            settings,
            runner,
            stdout: Box::new(io::sink()),
            stderr: Box::new(io::sink()),
        })
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &TerraformSettings {
        &self.settings
    }

    /// Mutable settings, read again by the next phase.
    pub const fn settings_mut(&mut self) -> &mut TerraformSettings {
        &mut self.settings
    }

    /// Working directory Terraform runs in.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.settings.working_dir
    }

    /// Changes the working directory for subsequent phases.
    pub fn set_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.settings.working_dir = dir.into();
        self
    }

    /// Path of the CLI configuration written when credentials are set.
    #[must_use]
    pub fn config_file_path(&self) -> Utf8PathBuf {
        self.settings.config_file_path()
    }

    /// Path of the temporary module descriptor used by [`Self::get_module`].
    #[must_use]
    pub fn module_file_path(&self) -> Utf8PathBuf {
        self.settings.module_file_path()
    }

    /// Sends Terraform's standard output to `sink`.
    pub fn set_stdout(&mut self, sink: impl Write + 'static) -> &mut Self {
        self.stdout = Box::new(sink);
        self
    }

    /// Sends Terraform's standard error to `sink`.
    pub fn set_stderr(&mut self, sink: impl Write + 'static) -> &mut Self {
        self.stderr = Box::new(sink);
        self
    }

    /// Initialises the working directory, writing registry credentials first
    /// when any are configured.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::ConfigWrite`] when the CLI configuration
    /// cannot be written, or a process error from the run.
    pub fn init(&mut self) -> Result<(), TerraformError> {
        self.write_credentials()?;
        self.execute(&Phase::Init)
    }

    /// Writes an execution plan to `plan_file`.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform cannot run or fails.
    pub fn plan(&mut self, plan_file: &Utf8Path) -> Result<(), TerraformError> {
        self.execute(&Phase::Plan {
            plan_file: plan_file.to_path_buf(),
        })
    }

    /// Applies the configuration without prompting.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform cannot run or fails.
    pub fn apply(&mut self) -> Result<(), TerraformError> {
        self.execute(&Phase::Apply)
    }

    /// Applies a previously saved plan.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform cannot run or fails.
    pub fn apply_with_plan(&mut self, plan_file: &Utf8Path) -> Result<(), TerraformError> {
        self.execute(&Phase::ApplyWithPlan {
            plan_file: plan_file.to_path_buf(),
        })
    }

    /// Destroys all managed resources without prompting.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform cannot run or fails.
    pub fn destroy(&mut self) -> Result<(), TerraformError> {
        self.execute(&Phase::Destroy)
    }

    /// Reads the root module outputs as strings. Structured values are
    /// rendered as canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform fails, or
    /// [`TerraformError::Decode`] when its JSON cannot be decoded.
    pub fn output(&mut self) -> Result<BTreeMap<String, String>, TerraformError> {
        let captured = self.capture(&Phase::Output)?;
        Ok(decode(&captured)?)
    }

    /// Reports the Terraform version.
    ///
    /// # Errors
    ///
    /// Returns a process error when Terraform fails, or
    /// [`TerraformError::Decode`] when its JSON cannot be decoded.
    pub fn version(&mut self) -> Result<String, TerraformError> {
        let captured = self.capture(&Phase::Version)?;
        Ok(decode_version(&captured)?)
    }

    fn write_credentials(&self) -> Result<(), TerraformError> {
        write_credentials_descriptor(&self.settings.config_file_path(), &self.settings.credentials)
            .map_err(TerraformError::ConfigWrite)
    }

    fn execute(&mut self, phase: &Phase) -> Result<(), TerraformError> {
        let invocation = InvocationBuilder::new(&self.settings).build(phase);
        debug!(
            phase = phase.name(),
            dir = %invocation.dir,
            command = %invocation.command_line(),
            env_overrides = ?invocation.overlay_keys,
            "running terraform"
        );
        let status = self
            .runner
            .run(&invocation, self.stdout.as_mut(), self.stderr.as_mut())?;
        check_status(phase, &self.settings.binary, &status)?;
        info!(phase = phase.name(), "terraform phase completed");
        Ok(())
    }

    fn capture(&mut self, phase: &Phase) -> Result<Vec<u8>, TerraformError> {
        let invocation = InvocationBuilder::new(&self.settings).build(phase);
        debug!(
            phase = phase.name(),
            dir = %invocation.dir,
            command = %invocation.command_line(),
            "capturing terraform output"
        );
        let mut captured = Vec::new();
        let status = self
            .runner
            .run(&invocation, &mut captured, self.stderr.as_mut())?;
        check_status(phase, &self.settings.binary, &status)?;
        info!(phase = phase.name(), "terraform phase completed");
        Ok(captured)
    }
}

fn check_status(
    phase: &Phase,
    program: &Utf8Path,
    status: &CommandStatus,
) -> Result<(), TerraformError> {
    if status.is_success() {
        return Ok(());
    }
    Err(TerraformError::CommandFailure {
        phase: phase.name().to_owned(),
        program: program.to_string(),
        status: status.code,
        status_text: status.status_text(),
    })
}
