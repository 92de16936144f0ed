//! Fetching a single module into the working directory.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::{debug, info, warn};

use crate::descriptor::{ModuleReference, remove_descriptor, write_module_descriptor};
use crate::invocation::Phase;
use crate::runner::CommandRunner;

use super::{Terraform, TerraformError, TerraformSettings};

impl<R: CommandRunner> Terraform<R> {
    /// Fetches the module at `source` pinned to `version` and moves its files
    /// into the working directory.
    ///
    /// A temporary module descriptor drives `terraform get` and is removed
    /// afterwards whether or not the fetch succeeded. Files are moved out of
    /// the module cache one entry at a time; a failure part-way leaves the
    /// entries already moved in place.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::ConfigWrite`] or
    /// [`TerraformError::ModuleDescriptor`] when a descriptor cannot be
    /// written or removed, a process error from `terraform get`, or
    /// [`TerraformError::ModulePlacement`] when the fetched files cannot be
    /// moved.
    pub fn get_module(&mut self, source: &str, version: &str) -> Result<(), TerraformError> {
        self.write_credentials()?;

        let descriptor = self.settings.module_file_path();
        let reference = ModuleReference::new(source, version);
        write_module_descriptor(&descriptor, &reference).map_err(|error| {
            TerraformError::ModuleDescriptor {
                module: source.to_owned(),
                version: version.to_owned(),
                error,
            }
        })?;

        let fetched = self.execute(&Phase::GetModule);
        let removed = remove_descriptor(&descriptor);
        match (fetched, removed) {
            (Err(err), Err(removal)) => {
                warn!(path = %descriptor, error = %removal, "failed to remove module descriptor");
                return Err(err);
            }
            (Err(err), Ok(())) => return Err(err),
            (Ok(()), Err(error)) => {
                return Err(TerraformError::ModuleDescriptor {
                    module: source.to_owned(),
                    version: version.to_owned(),
                    error,
                });
            }
            (Ok(()), Ok(())) => {}
        }

        let moved = relocate_module(&self.settings.working_dir)?;
        info!(source, version, entries = moved, "module placed in working directory");
        Ok(())
    }
}

fn relocate_module(working_dir: &Utf8Path) -> Result<usize, TerraformError> {
    let cache = TerraformSettings::module_cache_dir();
    let dir = Dir::open_ambient_dir(working_dir, ambient_authority())
        .map_err(|err| placement_error(working_dir, &cache, &err))?;
    let entries = dir
        .read_dir(&cache)
        .map_err(|err| placement_error(working_dir, &cache, &err))?;

    let mut moved = 0;
    for entry in entries {
        let name = entry
            .and_then(|found| found.file_name())
            .map_err(|err| placement_error(working_dir, &cache, &err))?;
        let from = cache.join(&name);
        dir.rename(&from, &dir, &name)
            .map_err(|err| placement_error(working_dir, &from, &err))?;
        debug!(entry = %name, "moved module entry");
        moved += 1;
    }
    Ok(moved)
}

fn placement_error(working_dir: &Utf8Path, relative: &Utf8Path, err: &io::Error) -> TerraformError {
    TerraformError::ModulePlacement {
        path: working_dir.join(relative),
        message: err.to_string(),
    }
}
