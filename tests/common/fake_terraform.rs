//! Fake Terraform executable for process-level integration tests.
//!
//! The script logs each invocation's arguments and the Terraform environment
//! flags it sees into the working directory, then mimics just enough of each
//! subcommand for the orchestrator to make progress.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// Serialises script creation and execution so no other test forks while a
/// script is still open for writing.
static PROCESS_LOCK: Mutex<()> = Mutex::new(());

const SCRIPT: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> invocations.log
printf '%s automation=%s cli_config=%s warn_output_errors=%s\n' \
    "$1" "$TF_IN_AUTOMATION" "${TF_CLI_CONFIG_FILE:-}" "${TF_WARN_OUTPUT_ERRORS:-}" >> env.log
case "$1" in
    version)
        printf '{"terraform_version":"1.9.5","platform":"linux_amd64"}\n'
        ;;
    output)
        printf '{"greeting":{"sensitive":false,"type":"string","value":"%s"},' "$FAKE_GREETING"
        printf '"zones":{"sensitive":false,"type":["list","string"],"value":["a","b"]}}\n'
        ;;
    get)
        mkdir -p .terraform/modules/module/templates
        cp main.tf.json fetched-descriptor.json
        printf '# fetched\n' > .terraform/modules/module/main.tf
        printf 'boot\n' > .terraform/modules/module/templates/boot.sh
        ;;
    apply)
        echo "Apply complete!"
        echo "deprecated attribute" >&2
        ;;
    destroy)
        if [ -n "${FAKE_FAIL_DESTROY:-}" ]; then
            echo "Error: instance still attached" >&2
            exit 3
        fi
        echo "Destroy complete!"
        ;;
esac
exit 0
"#;

/// Temporary layout holding the fake binary and a Terraform working directory.
pub struct FakeTerraform {
    _tmp: TempDir,
    _lock: MutexGuard<'static, ()>,
    /// Path to the executable script.
    pub binary: Utf8PathBuf,
    /// Working directory the orchestrator runs in.
    pub working_dir: Utf8PathBuf,
}

impl FakeTerraform {
    /// Writes the script into a fresh temporary directory.
    pub fn install() -> Self {
        let lock = PROCESS_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
        let binary = root.join("terraform");
        let working_dir = root.join("stack");

        fs::write(&binary, SCRIPT).unwrap_or_else(|err| panic!("write script: {err}"));
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|err| panic!("chmod script: {err}"));
        fs::create_dir(&working_dir).unwrap_or_else(|err| panic!("create stack dir: {err}"));

        Self {
            _tmp: tmp,
            _lock: lock,
            binary,
            working_dir,
        }
    }

    /// Reads a file relative to the working directory.
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.working_dir.join(relative))
            .unwrap_or_else(|err| panic!("read {relative}: {err}"))
    }

    /// Returns `true` when `relative` exists under the working directory.
    pub fn exists(&self, relative: &str) -> bool {
        self.working_dir.join(relative).exists()
    }

    /// Logged argument lines, one per invocation.
    pub fn invocations(&self) -> Vec<String> {
        self.read("invocations.log").lines().map(str::to_owned).collect()
    }

    /// Logged environment lines, one per invocation.
    pub fn env_log(&self) -> Vec<String> {
        self.read("env.log").lines().map(str::to_owned).collect()
    }
}
