//! Spawns one child per request inside its own process group, enforces the
//! wall-clock deadline with a SIGTERM-then-SIGKILL escalation, and caps
//! captured stdout/stderr without letting a chatty child deadlock on a full
//! pipe.

use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::ExecError;
use crate::language::{minimal_env, Entrypoint, Language};
use crate::limits::ResourceLimits;

const GRACE_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub source: String,
    pub language: Language,
    pub entrypoint: Entrypoint,
    pub limits: ResourceLimits,
    pub timeout: Duration,
    pub output_cap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ExecStatus {
    Success,
    NonZeroExit,
    Timeout,
    MemoryExceeded,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SandboxOutcome {
    pub status: ExecStatus,
    pub exit_code: Option<i32>,
    #[serde(skip)]
    pub stdout: Vec<u8>,
    #[serde(skip)]
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
}

pub async fn run_sandboxed(req: &SandboxRequest) -> Result<SandboxOutcome, ExecError> {
    let dir = crate::workdir::SandboxDir::create()
        .map_err(|e| ExecError::Internal(format!("could not create sandbox directory: {e}")))?;
    let filename = req.entrypoint.filename(req.language);
    let source_path = dir
        .write_source(filename, &req.source)
        .map_err(|e| ExecError::Internal(format!("could not write source file: {e}")))?;

    let (program, args) = req.entrypoint.command(req.language, &source_path);
    let limits = req.limits;

    let mut command = Command::new(program);
    command
        .args(&args)
        .current_dir(dir.path())
        .env_clear()
        .envs(minimal_env())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    // Safety: the closure only issues `setrlimit` syscalls between fork and
    // exec, which is async-signal-safe.
    unsafe {
        command.pre_exec(move || limits.apply());
    }

    let start = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|e| ExecError::SpawnFailed(format!("{program}: {e}")))?;
    let pid = child
        .id()
        .ok_or_else(|| ExecError::Internal("child exited before its pid could be read".to_string()))?;

    let stdout = child.stdout.take().expect("stdout is piped");
    let stderr = child.stderr.take().expect("stderr is piped");
    let stdout_task = tokio::spawn(read_capped(stdout, req.output_cap));
    let stderr_task = tokio::spawn(read_capped(stderr, req.output_cap));

    let wait = tokio::time::timeout(req.timeout, child.wait()).await;
    let timed_out = wait.is_err();

    if timed_out {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(GRACE_PERIOD, child.wait()).await.is_err() {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
            let _ = child.wait().await;
        }
    }

    let (stdout_buf, stdout_truncated) = stdout_task.await.unwrap_or((Vec::new(), false));
    let (stderr_buf, stderr_truncated) = stderr_task.await.unwrap_or((Vec::new(), false));

    let exit_status = match wait {
        Ok(Ok(status)) => Some(status),
        _ => None,
    };
    let status = classify(timed_out, exit_status);
    let exit_code = exit_status.and_then(|s| s.code());

    Ok(SandboxOutcome {
        status,
        exit_code,
        stdout: stdout_buf,
        stderr: stderr_buf,
        stdout_truncated,
        stderr_truncated,
        duration: start.elapsed(),
    })
}

/// Reads up to `cap` bytes, then keeps draining (and discarding) the rest so
/// the child never blocks writing into a full pipe buffer after the cap.
async fn read_capped<R: tokio::io::AsyncRead + Unpin>(mut reader: R, cap: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::with_capacity(cap.min(8192));
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = (cap - buf.len()).min(n);
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

fn classify(timed_out: bool, status: Option<std::process::ExitStatus>) -> ExecStatus {
    if timed_out {
        return ExecStatus::Timeout;
    }
    match status {
        Some(s) => match s.signal() {
            Some(sig) if sig == Signal::SIGKILL as i32 || sig == Signal::SIGSEGV as i32 => {
                ExecStatus::MemoryExceeded
            }
            _ if s.success() => ExecStatus::Success,
            _ => ExecStatus::NonZeroExit,
        },
        None => ExecStatus::NonZeroExit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn python3_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok()
    }

    fn request(source: &str, timeout: Duration) -> SandboxRequest {
        SandboxRequest {
            source: source.to_string(),
            language: Language::Python,
            entrypoint: Entrypoint::Interpret,
            limits: ResourceLimits::default(),
            timeout,
            output_cap: 4096,
        }
    }

    #[tokio::test]
    async fn runs_a_benign_script_to_completion() {
        if !python3_available() {
            eprintln!("skipping: python3 not found on PATH");
            return;
        }
        let outcome = run_sandboxed(&request("print('hello')\n", Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecStatus::Success);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(String::from_utf8_lossy(&outcome.stdout).contains("hello"));
    }

    #[tokio::test]
    async fn kills_a_script_that_overruns_its_deadline() {
        if !python3_available() {
            eprintln!("skipping: python3 not found on PATH");
            return;
        }
        let outcome = run_sandboxed(&request(
            "import time\ntime.sleep(30)\n",
            Duration::from_millis(200),
        ))
        .await
        .unwrap();
        assert_eq!(outcome.status, ExecStatus::Timeout);
    }

    #[tokio::test]
    async fn truncates_output_past_the_cap() {
        if !python3_available() {
            eprintln!("skipping: python3 not found on PATH");
            return;
        }
        let mut req = request("print('x' * 100000)\n", Duration::from_secs(5));
        req.output_cap = 1024;
        let outcome = run_sandboxed(&req).await.unwrap();
        assert!(outcome.stdout_truncated);
        assert_eq!(outcome.stdout.len(), 1024);
    }
}
