//! Process execution seam for Terraform invocations.
//!
//! Orchestration code talks to [`CommandRunner`] only, so tests can swap the
//! real process runner for a scripted fake without touching phase logic.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::invocation::Invocation;
use crate::terraform::TerraformError;

/// Exit status reported by a finished child process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommandStatus {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
}

impl CommandStatus {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed by a
    /// signal.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Abstraction over process execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `invocation` to completion, forwarding the child's standard
    /// output and standard error into the given sinks.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::Spawn`] if the process cannot be started and
    /// [`TerraformError::Stream`] if its output cannot be forwarded.
    fn run(
        &self,
        invocation: &Invocation,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<CommandStatus, TerraformError>;
}

/// Real command runner that spawns the Terraform binary and forwards its
/// streams while it runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        invocation: &Invocation,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<CommandStatus, TerraformError> {
        let mut child = Command::new(invocation.program.as_std_path())
            .args(&invocation.args)
            .current_dir(invocation.dir.as_std_path())
            .env_clear()
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(invocation, &err))?;

        let (sender, receiver) = mpsc::channel();
        let stdout_pump = child
            .stdout
            .take()
            .map(|pipe| spawn_pump(pipe, sender.clone(), Chunk::Stdout));
        let stderr_pump = child
            .stderr
            .take()
            .map(|pipe| spawn_pump(pipe, sender, Chunk::Stderr));

        // Keep draining after a sink failure so the child never blocks on a
        // full pipe.
        let forwarded = forward(&receiver, stdout, stderr);
        let pumped = [stdout_pump, stderr_pump]
            .into_iter()
            .flatten()
            .try_for_each(join_pump);
        let status = child
            .wait()
            .map_err(|err| spawn_error(invocation, &err))?;

        forwarded
            .and(pumped)
            .map_err(|err| TerraformError::Stream {
                phase: invocation.phase.name().to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

fn spawn_error(invocation: &Invocation, err: &io::Error) -> TerraformError {
    TerraformError::Spawn {
        phase: invocation.phase.name().to_owned(),
        program: invocation.program.to_string(),
        message: err.to_string(),
    }
}

fn spawn_pump<R>(
    pipe: R,
    sender: Sender<Chunk>,
    wrap: fn(Vec<u8>) -> Chunk,
) -> JoinHandle<io::Result<()>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        loop {
            let chunk = reader.fill_buf()?.to_vec();
            if chunk.is_empty() {
                return Ok(());
            }
            reader.consume(chunk.len());
            if sender.send(wrap(chunk)).is_err() {
                return Ok(());
            }
        }
    })
}

fn join_pump(handle: JoinHandle<io::Result<()>>) -> io::Result<()> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
}

fn forward(
    receiver: &Receiver<Chunk>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> io::Result<()> {
    let mut outcome = Ok(());
    for chunk in receiver {
        if outcome.is_err() {
            continue;
        }
        outcome = match chunk {
            Chunk::Stdout(bytes) => stdout.write_all(&bytes),
            Chunk::Stderr(bytes) => stderr.write_all(&bytes),
        };
    }
    outcome?;
    stdout.flush()?;
    stderr.flush()
}
