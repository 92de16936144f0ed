//! Error types for Terraform lifecycle phases.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::output::DecodeError;

/// Errors surfaced while driving Terraform.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TerraformError {
    /// Raised when settings are missing required values.
    #[error("invalid terraform settings: missing {field}")]
    InvalidConfig {
        /// Settings field that failed validation.
        field: String,
    },
    /// Raised when the CLI configuration with registry credentials cannot be
    /// written.
    #[error("cannot configure terraform registry credentials: {0}")]
    ConfigWrite(#[source] DescriptorError),
    /// Raised when the module descriptor cannot be written or removed.
    #[error("cannot prepare module file for '{module}' version '{version}': {error}")]
    ModuleDescriptor {
        /// Module source being fetched.
        module: String,
        /// Requested version constraint.
        version: String,
        /// Underlying descriptor failure.
        #[source]
        error: DescriptorError,
    },
    /// Raised when the Terraform process cannot be started.
    #[error("failed to spawn {program} for terraform {phase}: {message}")]
    Spawn {
        /// Phase being executed.
        phase: String,
        /// Executable that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when Terraform completes with a non-zero exit code.
    #[error("terraform {phase} exited with status {status_text}")]
    CommandFailure {
        /// Phase being executed.
        phase: String,
        /// Executable that was run.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
    },
    /// Raised when the child's output cannot be forwarded to a sink.
    #[error("failed to forward terraform {phase} output: {message}")]
    Stream {
        /// Phase being executed.
        phase: String,
        /// I/O error string.
        message: String,
    },
    /// Raised when Terraform's JSON output cannot be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Raised when fetched module files cannot be moved into the working
    /// directory. Files already moved stay where they are.
    #[error("preparing terraform module failed, {message}: {path}")]
    ModulePlacement {
        /// Path that could not be read or moved.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

impl TerraformError {
    /// Returns the phase name for process-level failures.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        match self {
            Self::Spawn { phase, .. }
            | Self::CommandFailure { phase, .. }
            | Self::Stream { phase, .. } => Some(phase),
            _ => None,
        }
    }
}
