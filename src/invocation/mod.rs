//! Argument vectors and environments for each Terraform lifecycle phase.
//!
//! The builder is pure apart from reading the inherited process environment:
//! the same settings and phase always yield the same invocation. Variable maps
//! are ordered by key, so flag order is stable across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;

use crate::terraform::TerraformSettings;

/// Environment flag telling Terraform that no human operator is present.
pub const AUTOMATION_ENV: &str = "TF_IN_AUTOMATION";

/// Environment variable pointing Terraform at the CLI configuration file.
pub const CLI_CONFIG_FILE_ENV: &str = "TF_CLI_CONFIG_FILE";

/// Downgrades output evaluation errors to warnings during `destroy`.
///
/// Works around hashicorp/terraform#18026, where destroying a partially
/// created stack fails while evaluating outputs that reference vanished
/// resources.
pub const WARN_OUTPUT_ERRORS_ENV: &str = "TF_WARN_OUTPUT_ERRORS";

const VAR_OPTION: &str = "var";
const BACKEND_CONFIG_OPTION: &str = "backend-config";

/// One Terraform lifecycle phase, mapped to exactly one process invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// `terraform version -json`.
    Version,
    /// `terraform init` with backend configuration.
    Init,
    /// `terraform plan` writing the plan to a file.
    ///
    /// The plan file is passed as `-out=<file>`; `plan` takes no positional
    /// plan argument.
    Plan {
        /// Destination of the saved plan.
        plan_file: Utf8PathBuf,
    },
    /// `terraform apply` with variables and auto-approval.
    Apply,
    /// `terraform apply` of a previously saved plan.
    ApplyWithPlan {
        /// Saved plan to apply.
        plan_file: Utf8PathBuf,
    },
    /// `terraform destroy` with variables and auto-approval.
    Destroy,
    /// `terraform output -json`.
    Output,
    /// `terraform get`, fetching the module named by the module descriptor.
    GetModule,
}

impl Phase {
    /// Returns the Terraform subcommand used for this phase.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Init => "init",
            Self::Plan { .. } => "plan",
            Self::Apply | Self::ApplyWithPlan { .. } => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
            Self::GetModule => "get",
        }
    }
}

/// Fully resolved process invocation for a single phase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// Phase this invocation performs.
    pub phase: Phase,
    /// Terraform executable.
    pub program: Utf8PathBuf,
    /// Arguments passed after the program name.
    pub args: Vec<OsString>,
    /// Complete child environment: inherited variables plus the overlay.
    pub env: BTreeMap<OsString, OsString>,
    /// Keys set on top of the inherited environment.
    pub overlay_keys: BTreeSet<String>,
    /// Working directory for the child process.
    pub dir: Utf8PathBuf,
}

impl Invocation {
    /// Returns the value the child will see for `key`, if any.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.env.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Returns the arguments as lossy UTF-8 strings.
    #[must_use]
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Renders the invocation as a shell-escaped command line for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(escape(self.program.as_str().into()).into_owned());
        parts.extend(
            self.arg_strings()
                .into_iter()
                .map(|arg| escape(arg.into()).into_owned()),
        );
        parts.join(" ")
    }
}

/// Turns [`TerraformSettings`] plus a [`Phase`] into an [`Invocation`].
#[derive(Clone, Copy, Debug)]
pub struct InvocationBuilder<'a> {
    settings: &'a TerraformSettings,
}

impl<'a> InvocationBuilder<'a> {
    /// Creates a builder reading from `settings`.
    #[must_use]
    pub const fn new(settings: &'a TerraformSettings) -> Self {
        Self { settings }
    }

    /// Builds the invocation for `phase`, inheriting the current process
    /// environment.
    #[must_use]
    pub fn build(&self, phase: &Phase) -> Invocation {
        self.build_with_env(phase, std::env::vars_os())
    }

    /// Builds the invocation for `phase` on top of an explicit inherited
    /// environment.
    #[must_use]
    pub fn build_with_env<I>(&self, phase: &Phase, inherited: I) -> Invocation
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let overlay = self.env_overlay(phase);
        let overlay_keys = overlay.iter().map(|(key, _)| key.clone()).collect();
        let mut env: BTreeMap<OsString, OsString> = inherited.into_iter().collect();
        // Later entries win, so overrides beat inherited values.
        for (key, value) in overlay {
            env.insert(OsString::from(key), OsString::from(value));
        }

        Invocation {
            phase: phase.clone(),
            program: self.settings.binary.clone(),
            args: self.args(phase),
            env,
            overlay_keys,
            dir: self.settings.working_dir.clone(),
        }
    }

    /// Returns the argument vector for `phase`.
    #[must_use]
    pub fn args(&self, phase: &Phase) -> Vec<OsString> {
        let mut args = base_args(phase);
        match phase {
            Phase::Init => {
                args.extend(map_to_args(&self.settings.backend_vars, BACKEND_CONFIG_OPTION));
            }
            Phase::Plan { plan_file } => {
                args.extend(map_to_args(&self.settings.vars, VAR_OPTION));
                args.push(OsString::from(format!("-out={plan_file}")));
            }
            Phase::Apply | Phase::Destroy => {
                args.extend(map_to_args(&self.settings.vars, VAR_OPTION));
            }
            Phase::ApplyWithPlan { plan_file } => {
                args.push(OsString::from(plan_file.as_str()));
            }
            Phase::Version | Phase::Output | Phase::GetModule => {}
        }
        args
    }

    /// Returns the ordered environment entries applied over the inherited
    /// environment for `phase`.
    #[must_use]
    pub fn env_overlay(&self, phase: &Phase) -> Vec<(String, String)> {
        let mut overlay = vec![(String::from(AUTOMATION_ENV), String::from("true"))];
        overlay.extend(
            self.settings
                .env
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        if self.settings.has_credentials() {
            overlay.push((
                String::from(CLI_CONFIG_FILE_ENV),
                cli_config_path(&self.settings.config_file_path()).into_string(),
            ));
        }
        if matches!(phase, Phase::Destroy) {
            overlay.push((String::from(WARN_OUTPUT_ERRORS_ENV), String::from("1")));
        }
        overlay
    }
}

/// Resolves the CLI configuration path against the caller's current
/// directory, since the child starts inside the working directory.
fn cli_config_path(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path)
        .ok()
        .and_then(|resolved| Utf8PathBuf::from_path_buf(resolved).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

fn base_args(phase: &Phase) -> Vec<OsString> {
    let fixed: &[&str] = match phase {
        Phase::Version => &["version", "-json"],
        Phase::Init => &[
            "init",
            "-no-color",
            "-input=false",
            "-force-copy",
            "-get=true",
        ],
        Phase::Plan { .. } => &["plan", "-no-color", "-input=false"],
        Phase::Apply | Phase::ApplyWithPlan { .. } => {
            &["apply", "-no-color", "-input=false", "-auto-approve"]
        }
        Phase::Destroy => &["destroy", "-no-color", "-input=false", "-auto-approve"],
        Phase::Output => &["output", "-json"],
        Phase::GetModule => &["get", "-no-color"],
    };
    fixed.iter().map(|arg| OsString::from(*arg)).collect()
}

/// Converts `params` into `-<option> key=value` flag pairs, one per key.
#[must_use]
pub fn map_to_args(params: &BTreeMap<String, String>, option: &str) -> Vec<OsString> {
    params
        .iter()
        .flat_map(|(key, value)| {
            [
                OsString::from(format!("-{option}")),
                OsString::from(format!("{key}={value}")),
            ]
        })
        .collect()
}
