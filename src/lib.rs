//! Drive the Terraform CLI lifecycle from Rust.
//!
//! The crate wraps a Terraform binary for one working directory:
//! [`Terraform`] runs init, plan, apply, destroy and output as blocking
//! processes, writes the registry credential and module descriptors
//! Terraform expects, and decodes `terraform output -json` into plain
//! strings. Process execution sits behind [`CommandRunner`] so callers and
//! tests can substitute the binary.

pub mod config;
pub mod descriptor;
pub mod invocation;
pub mod output;
pub mod runner;
pub mod terraform;
pub mod test_support;

pub use config::{ConfigError, TerraformConfig};
pub use descriptor::{DescriptorError, ModuleReference, RegistryCredential};
pub use invocation::{Invocation, InvocationBuilder, Phase};
pub use output::{DecodeError, OutputEntry, OutputValue, decode, decode_entries, decode_version};
pub use runner::{CommandRunner, CommandStatus, ProcessCommandRunner};
pub use terraform::{Terraform, TerraformError, TerraformSettings};
