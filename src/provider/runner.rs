use crate::provider::{io_error, InvocationSpec, ProviderError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stderr: String,
}

/// `<binary> --version` must spawn and exit zero.
pub fn binary_reachable(binary: &str, env: &BTreeMap<String, String>) -> bool {
    Command::new(binary)
        .arg("--version")
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Runs the agent with stdout streamed into `output_file`. On timeout the
/// child gets SIGTERM, `terminate_grace` to exit, then SIGKILL, and is always
/// reaped before returning.
pub fn run_agent_process(
    spec: &InvocationSpec,
    env: &BTreeMap<String, String>,
    cwd: &Path,
    output_file: &Path,
    timeout: Duration,
    terminate_grace: Duration,
) -> Result<ProcessOutcome, ProviderError> {
    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
    }
    let sink = File::create(output_file).map_err(|err| io_error(output_file, err))?;

    let mut command = Command::new(&spec.binary);
    command
        .current_dir(cwd)
        .args(&spec.args)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(sink))
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProviderError::MissingBinary {
                binary: spec.binary.clone(),
            })
        }
        Err(err) => return Err(io_error(cwd, err)),
    };

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io_error(cwd, std::io::Error::other("missing stderr pipe")))?;
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_string(&mut buf);
        buf
    });

    let exit_status = match wait_with_deadline(&mut child, timeout).map_err(|e| io_error(cwd, e))? {
        Some(status) => status,
        None => {
            terminate(&mut child, terminate_grace).map_err(|e| io_error(cwd, e))?;
            // A grandchild may still hold the stderr pipe; the reader thread
            // is left to finish on its own.
            drop(stderr_reader);
            return Err(ProviderError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(ProcessOutcome {
        exit_code: exit_status.code(),
        success: exit_status.success(),
        stderr,
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    send_signal(child.id(), "-TERM");
    if wait_with_deadline(child, grace)?.is_some() {
        return Ok(());
    }
    match child.kill() {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {}
        Err(err) => return Err(err),
    }
    child.wait().map(|_| ())
}

fn send_signal(pid: u32, signal: &str) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg(signal)
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    #[cfg(not(unix))]
    {
        let _ = (pid, signal);
    }
}
