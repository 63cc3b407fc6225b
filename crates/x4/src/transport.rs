//! Connect an [`IsolationChannel`](crate::channel::IsolationChannel) to a
//! worker.
//!
//! Two hosts are supported:
//! - **thread**: the worker runs on a dedicated OS thread in this process.
//! - **process**: the `enclave` binary runs as a child process; requests and
//!   responses cross its stdin/stdout as newline-delimited JSON.
//!
//! Either way the channel only ever sees a request sink and a response
//! stream.

use std::process::Stdio;

use anyhow::{Context, Result};
use common::protocol::{Request, Response};
use enclave::{host, Worker};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{Config, WorkerMode};

/// Queue depth between the channel and the worker.
const QUEUE_CAPACITY: usize = 64;

/// A live connection to a worker.
pub struct WorkerLink {
    pub requests: mpsc::Sender<Request>,
    pub responses: mpsc::Receiver<Response>,
    /// The worker process in process mode; killed when dropped.
    pub child: Option<Child>,
}

/// Start a worker as configured.
///
/// # Errors
///
/// Returns an error if the thread or child process cannot be started.
pub fn connect(cfg: &Config) -> Result<WorkerLink> {
    match cfg.worker_mode {
        WorkerMode::Thread => spawn_thread(),
        WorkerMode::Process => spawn_process(cfg),
    }
}

/// Host the worker on a dedicated thread in this process.
pub fn spawn_thread() -> Result<WorkerLink> {
    let (requests, responses) = host::spawn_thread(Worker::new(), QUEUE_CAPACITY)
        .context("failed to spawn worker thread")?;
    info!(mode = "thread", "worker started");
    Ok(WorkerLink {
        requests,
        responses,
        child: None,
    })
}

/// Spawn the `enclave` binary and bridge its stdio.
pub fn spawn_process(cfg: &Config) -> Result<WorkerLink> {
    let mut child = Command::new(&cfg.enclave_path)
        .env("ENCLAVE_MAX_FRAME_BYTES", cfg.max_frame_bytes.to_string())
        .env("ENCLAVE_LOG_LEVEL", &cfg.log_level)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn worker process {}", cfg.enclave_path.display()))?;

    let stdin = child.stdin.take().context("worker stdin was not captured")?;
    let stdout = child.stdout.take().context("worker stdout was not captured")?;
    let (requests, responses) = bridge(stdout, stdin, cfg.max_frame_bytes);

    info!(mode = "process", pid = child.id(), path = %cfg.enclave_path.display(), "worker started");
    Ok(WorkerLink {
        requests,
        responses,
        child: Some(child),
    })
}

/// Turn a pair of byte streams speaking the JSON-lines protocol into channel
/// ends. Spawns one writer task and one reader task.
pub fn bridge<R, W>(
    reader: R,
    writer: W,
    max_frame_bytes: usize,
) -> (mpsc::Sender<Request>, mpsc::Receiver<Response>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel::<Request>(QUEUE_CAPACITY);
    let (response_tx, response_rx) = mpsc::channel::<Response>(QUEUE_CAPACITY);
    tokio::spawn(write_requests(writer, request_rx));
    tokio::spawn(read_responses(reader, response_tx, max_frame_bytes));
    (request_tx, response_rx)
}

async fn write_requests<W>(mut writer: W, mut requests: mpsc::Receiver<Request>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = requests.recv().await {
        let id = request.id;
        let encoded = serde_json::to_string(&request);
        drop(request);
        let mut line = match encoded {
            Ok(line) => Zeroizing::new(line),
            Err(e) => {
                warn!(id, error = %e, "failed to encode request");
                continue;
            }
        };
        line.push('\n');

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!(id, error = %e, "worker input closed");
            break;
        }
    }
    debug!("request writer stopped");
}

async fn read_responses<R>(reader: R, responses: mpsc::Sender<Response>, max_frame_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_bytes));
    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => Zeroizing::new(line),
            Err(e) => {
                warn!(error = %e, "worker output unreadable");
                break;
            }
        };
        match serde_json::from_str::<Response>(&line) {
            Ok(response) => {
                if responses.send(response).await.is_err() {
                    break;
                }
            }
            Err(_) => warn!("ignoring malformed response line"),
        }
    }
    debug!("response reader stopped");
}
