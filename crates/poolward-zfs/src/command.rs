//! Execution wrapper for running `zfs`/`zpool` scripts through a shell.
//!
//! The goal is to keep process handling isolated so the pool handle stays
//! testable (fake interpreters, recording runners, deterministic stdout parsing).

use log::{debug, warn};
use poolward_core::config::PoolwardConfig;
use poolward_core::error::{PoolError, PoolResult};
use poolward_core::runner::{ScriptRequest, ScriptRunner};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs scripts as `<shell> -c <script> -- <args...>` under a deadline.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
    timeout: Duration,
}

#[derive(Debug)]
struct Output {
    stdout: Vec<u8>,
    stderr: String,
    status: ExitStatus,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    /// Build a runner from the configured shell path and timeout.
    pub fn from_config(config: &PoolwardConfig) -> PoolResult<Self> {
        Ok(Self::new(config.shell_path()?, config.timeout()))
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Default deadline applied when a request carries no timeout of its own.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, request: &ScriptRequest<'_>) -> PoolResult<Child> {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(request.script).arg("--");
        command.args(request.args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        command.spawn().map_err(|err| PoolError::Execution {
            operation: request.operation.to_string(),
            status: None,
            reason: format!("failed to spawn {}: {err}", self.shell.display()),
            stderr: String::new(),
        })
    }

    fn wait_with_deadline(
        &self,
        request: &ScriptRequest<'_>,
        mut child: Child,
        stdout_pipe: Option<ChildStdout>,
        stderr_pipe: Option<ChildStderr>,
    ) -> PoolResult<Output> {
        let timeout = request.options.timeout.unwrap_or(self.timeout);
        let start = Instant::now();
        let stdout_handle = spawn_output_reader(stdout_pipe);
        let stderr_handle = spawn_output_reader(stderr_pipe);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    kill_and_reap(&mut child);
                    return Err(execution_io(request, err));
                }
            }
            if request.options.is_cancelled() {
                kill_and_reap(&mut child);
                return Err(PoolError::Cancelled {
                    operation: request.operation.to_string(),
                });
            }
            if start.elapsed() > timeout {
                kill_and_reap(&mut child);
                return Err(PoolError::Timeout {
                    operation: request.operation.to_string(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| reader_panicked(request, "stdout"))?
            .map_err(|err| execution_io(request, err))?;
        let stderr = stderr_handle
            .join()
            .map_err(|_| reader_panicked(request, "stderr"))?
            .map_err(|err| execution_io(request, err))?;

        Ok(Output {
            stdout,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            status,
        })
    }
}

impl ScriptRunner for ShellRunner {
    fn run(&self, request: &ScriptRequest<'_>) -> PoolResult<Vec<u8>> {
        if request.options.is_cancelled() {
            return Err(PoolError::Cancelled {
                operation: request.operation.to_string(),
            });
        }

        debug!(
            "{}: running `{}` with args {:?}",
            request.operation, request.script, request.args
        );
        let start = Instant::now();

        let mut child = self.spawn(request)?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let result = self.wait_with_deadline(request, child, stdout_pipe, stderr_pipe);
        let elapsed_us = start.elapsed().as_micros();

        let out = match result {
            Ok(out) => out,
            Err(err) => {
                warn!("{}: {err} after {elapsed_us} us", request.operation);
                return Err(err);
            }
        };

        if out.status.success() {
            debug!("{} took {elapsed_us} us", request.operation);
            return Ok(out.stdout);
        }

        let code = out.status.code();
        let reason = match code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let reason = if out.stderr.is_empty() {
            reason
        } else {
            format!("{reason}: {}", out.stderr)
        };
        warn!(
            "{} failed after {elapsed_us} us: {reason}",
            request.operation
        );
        Err(PoolError::Execution {
            operation: request.operation.to_string(),
            status: code,
            reason,
            stderr: out.stderr,
        })
    }
}

/// Best effort: the child may already have exited.
fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn execution_io(request: &ScriptRequest<'_>, err: std::io::Error) -> PoolError {
    PoolError::Execution {
        operation: request.operation.to_string(),
        status: None,
        reason: err.to_string(),
        stderr: String::new(),
    }
}

fn reader_panicked(request: &ScriptRequest<'_>, stream: &str) -> PoolError {
    PoolError::Execution {
        operation: request.operation.to_string(),
        status: None,
        reason: format!("{stream} reader thread panicked"),
        stderr: String::new(),
    }
}

fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<std::io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut reader) = pipe {
            reader.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}
