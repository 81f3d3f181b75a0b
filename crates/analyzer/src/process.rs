//! Analyzer subprocess lifecycle.
//!
//! [`spawn_worker`] launches one analyzer process and wires its output
//! streams into a single ordered channel of [`WorkerUpdate`]s: decoded
//! stdout events, stderr lines wrapped as `ERROR` logs, and exactly one
//! [`WorkerUpdate::Exited`] once the process is gone. The updates channel
//! closing implies the exit notification was already delivered.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use siteaudit_core::event::ScanEvent;
use siteaudit_core::scan::{LogEntry, LogLevel};
use siteaudit_core::types::JobId;

use crate::config::WorkerConfig;
use crate::messages;

/// Give up on a worker after this many consecutive undecodable stdout
/// lines; it is clearly not speaking the protocol.
const MAX_MALFORMED_LINES: u32 = 50;

/// The analyzer process could not be started (missing binary, permission
/// denied). Treated by the orchestrator as an immediate terminal failure;
/// there is no retry.
#[derive(Debug, thiserror::Error)]
#[error("Failed to launch analyzer process: {0}")]
pub struct SpawnError(#[from] std::io::Error);

/// One unit of worker activity, delivered in the order it was produced.
#[derive(Debug)]
pub enum WorkerUpdate {
    /// A decoded output event (or a synthesized `ERROR` log for stderr
    /// lines and undecodable stdout lines).
    Event(ScanEvent),

    /// The process terminated. Sent exactly once, after all events.
    Exited { code: Option<i32> },
}

/// Handle to a running analyzer process.
pub struct WorkerHandle {
    /// Ordered stream of worker activity. Ends after `Exited`.
    pub updates: mpsc::UnboundedReceiver<WorkerUpdate>,
}

/// Launch the analyzer for one job.
///
/// The process is started with `<program> <args..> <job_id> <url>
/// <options-json>` and `kill_on_drop`, so an abandoned handle cannot leak
/// a live subprocess. Cancelling `cancel` kills the process; termination
/// is still reported through the normal exit path.
pub fn spawn_worker(
    config: &WorkerConfig,
    job_id: JobId,
    url: &str,
    options: &serde_json::Value,
    cancel: CancellationToken,
) -> Result<WorkerHandle, SpawnError> {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .arg(job_id.to_string())
        .arg(url)
        .arg(options.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    tracing::info!(job_id, program = %config.program, "Analyzer process started");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(drive(child, stdout, stderr, tx, job_id, cancel));

    Ok(WorkerHandle { updates: rx })
}

/// Read both output streams to completion, then reap the child.
///
/// Runs as a detached task owning the [`Child`]. The exit notification is
/// sent from this single task after both stream readers have finished, so
/// it is delivered exactly once even when stdout and stderr close
/// concurrently.
async fn drive<O, E>(
    mut child: Child,
    stdout: Option<O>,
    stderr: Option<E>,
    tx: mpsc::UnboundedSender<WorkerUpdate>,
    job_id: JobId,
    cancel: CancellationToken,
) where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    // Stderr is out-of-band: every line becomes an ERROR log event,
    // regardless of content.
    let stderr_tx = tx.clone();
    let stderr_task = tokio::spawn(async move {
        let Some(stderr) = stderr else { return };
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let entry = LogEntry::new(LogLevel::Error, line);
            let _ = stderr_tx.send(WorkerUpdate::Event(ScanEvent::Log(entry)));
        }
    });

    let mut malformed: u32 = 0;
    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(job_id, "Scan cancelled, killing analyzer process");
                    let _ = child.start_kill();
                    break;
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                // EOF or a broken pipe both mean the stream is done.
                Ok(None) | Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }

            match messages::decode_line(&line) {
                Ok(event) => {
                    malformed = 0;
                    let _ = tx.send(WorkerUpdate::Event(event));
                }
                Err(e) => {
                    malformed += 1;
                    tracing::warn!(
                        job_id,
                        error = %e,
                        raw_line = %line,
                        "Undecodable analyzer output line",
                    );
                    let entry = LogEntry::new(
                        LogLevel::Error,
                        format!("Undecodable analyzer output: {line} ({e})"),
                    );
                    let _ = tx.send(WorkerUpdate::Event(ScanEvent::Log(entry)));

                    if malformed >= MAX_MALFORMED_LINES {
                        tracing::error!(
                            job_id,
                            malformed,
                            "Malformed output threshold exceeded, killing analyzer",
                        );
                        let _ = child.start_kill();
                        break;
                    }
                }
            }
        }
    }

    // Join the stderr reader before reaping so no log event can trail
    // the exit notification.
    let _ = stderr_task.await;

    let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to await analyzer process");
            None
        }
    };

    tracing::debug!(job_id, exit_code = ?code, "Analyzer process exited");
    let _ = tx.send(WorkerUpdate::Exited { code });
}
