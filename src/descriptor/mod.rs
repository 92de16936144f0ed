//! Descriptor files written for Terraform to read.
//!
//! Two documents live here: the CLI configuration (`.terraformrc`) carrying
//! private registry credentials, and the single-use module reference
//! (`main.tf.json`) that lets `terraform get` fetch a module on demand.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use hcl::{Block, BlockLabel, Body, Expression};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File name of the Terraform CLI configuration inside the working directory.
pub const CLI_CONFIG_FILE_NAME: &str = ".terraformrc";

/// File name of the temporary module reference inside the working directory.
pub const MODULE_FILE_NAME: &str = "main.tf.json";

/// Name under which the fetched module is declared, and hence the directory
/// Terraform caches it in below `.terraform/modules`.
pub const MODULE_NAME: &str = "module";

const CREDENTIALS_BLOCK: &str = "credentials";
const TOKEN_ATTRIBUTE: &str = "token";

/// Errors raised while writing or reading descriptor files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DescriptorError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a descriptor cannot be serialised.
    #[error("failed to render {path}: {message}")]
    Render {
        /// Descriptor being rendered.
        path: Utf8PathBuf,
        /// Serialiser error message.
        message: String,
    },
    /// Raised when an existing descriptor cannot be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Descriptor being parsed.
        path: Utf8PathBuf,
        /// Parser error message.
        message: String,
    },
}

/// Credentials for one private module registry host.
#[derive(Clone, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct RegistryCredential {
    host: String,
    token: String,
}

impl RegistryCredential {
    /// Creates a credential for `host` authenticated by `token`.
    #[must_use]
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
        }
    }

    /// Registry hostname, written as the `credentials` block label.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// API token presented to the registry.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Source and version constraint of a module to fetch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModuleReference {
    /// Registry address or other module source string.
    pub source: String,
    /// Version constraint, for example `~> 1.0`.
    pub version: String,
}

impl ModuleReference {
    /// Creates a module reference.
    #[must_use]
    pub fn new(source: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ModuleFile {
    module: BTreeMap<String, ModuleReference>,
}

/// Writes `credentials` as Terraform CLI configuration at `path`.
///
/// Nothing is written when `credentials` is empty, so no CLI configuration
/// appears unless registry access is actually configured.
///
/// # Errors
///
/// Returns [`DescriptorError`] when rendering fails or the file cannot be
/// created or truncated.
pub fn write_credentials_descriptor(
    path: &Utf8Path,
    credentials: &[RegistryCredential],
) -> Result<(), DescriptorError> {
    if credentials.is_empty() {
        return Ok(());
    }

    let body = credentials
        .iter()
        .fold(Body::builder(), |builder, credential| {
            builder.add_block(
                Block::builder(CREDENTIALS_BLOCK)
                    .add_label(credential.host.as_str())
                    .add_attribute((TOKEN_ATTRIBUTE, credential.token.as_str()))
                    .build(),
            )
        })
        .build();
    let rendered = hcl::to_string(&body).map_err(|err| DescriptorError::Render {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    write_file(path, &rendered)?;
    debug!(%path, hosts = credentials.len(), "wrote terraform CLI configuration");
    Ok(())
}

/// Reads the registry credentials from the Terraform CLI configuration at
/// `path`. Blocks other than `credentials` are ignored.
///
/// # Errors
///
/// Returns [`DescriptorError`] when the file cannot be read, is not valid
/// HCL, or holds a `credentials` block without a host label or string token.
pub fn read_credentials_descriptor(
    path: &Utf8Path,
) -> Result<Vec<RegistryCredential>, DescriptorError> {
    let contents = read_file(path)?;
    let body: Body = hcl::parse(&contents).map_err(|err| parse_error(path, err.to_string()))?;

    body.blocks()
        .filter(|block| block.identifier() == CREDENTIALS_BLOCK)
        .map(|block| -> Result<RegistryCredential, DescriptorError> {
            let host = block
                .labels()
                .first()
                .map(BlockLabel::as_str)
                .ok_or_else(|| parse_error(path, String::from("credentials block has no host")))?;
            let token = block
                .body()
                .attributes()
                .find(|attribute| attribute.key() == TOKEN_ATTRIBUTE)
                .and_then(|attribute| match attribute.expr() {
                    Expression::String(token) => Some(token.as_str()),
                    _ => None,
                })
                .ok_or_else(|| {
                    parse_error(path, format!("credentials for {host} have no string token"))
                })?;
            Ok(RegistryCredential::new(host, token))
        })
        .collect()
}

/// Writes a single-module reference as Terraform JSON configuration at
/// `path`, declared under the fixed name [`MODULE_NAME`].
///
/// # Errors
///
/// Returns [`DescriptorError`] when rendering fails or the file cannot be
/// created or truncated.
pub fn write_module_descriptor(
    path: &Utf8Path,
    reference: &ModuleReference,
) -> Result<(), DescriptorError> {
    let document = ModuleFile {
        module: BTreeMap::from([(String::from(MODULE_NAME), reference.clone())]),
    };
    let rendered =
        serde_json::to_string_pretty(&document).map_err(|err| DescriptorError::Render {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    write_file(path, &rendered)?;
    debug!(
        %path,
        source = %reference.source,
        version = %reference.version,
        "wrote module descriptor"
    );
    Ok(())
}

/// Removes the descriptor at `path`. A descriptor that was never created is
/// not an error.
///
/// # Errors
///
/// Returns [`DescriptorError::Io`] when the file exists but cannot be removed.
pub fn remove_descriptor(path: &Utf8Path) -> Result<(), DescriptorError> {
    let (dir, file_name) = open_parent(path)?;
    match dir.remove_file(file_name) {
        Ok(()) => {
            debug!(%path, "removed descriptor");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(path, &err)),
    }
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), DescriptorError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| DescriptorError::Io {
        path: path.to_path_buf(),
        message: String::from("descriptor path is missing a filename"),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    Ok((dir, file_name))
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<(), DescriptorError> {
    let (dir, file_name) = open_parent(path)?;
    dir.write(file_name, contents)
        .map_err(|err| io_error(path, &err))
}

fn read_file(path: &Utf8Path) -> Result<String, DescriptorError> {
    let (dir, file_name) = open_parent(path)?;
    dir.read_to_string(file_name)
        .map_err(|err| io_error(path, &err))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> DescriptorError {
    DescriptorError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn parse_error(path: &Utf8Path, message: String) -> DescriptorError {
    DescriptorError::Parse {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests;
