//! [`IsolationChannel`]: correlated request/response calls into the worker.
//!
//! # Concurrency model
//!
//! - Each call takes a fresh id from a monotonically increasing counter and
//!   parks a oneshot sender in the pending map under that id.
//! - A dispatcher task reads responses and removes the matching entry. A
//!   timed-out call removes its own entry. Whichever happens first is the
//!   only remover, so a plain mutex around the map is enough.
//! - When the worker's response stream ends, every pending call resolves to
//!   [`ErrorCode::WorkerUnavailable`] and new calls fail fast.
//! - A timeout abandons the wait only; the worker may still finish the job
//!   and its late response is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::protocol::{Command, Request, Response};
use common::ErrorCode;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default time to wait for a single response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    closed: AtomicBool,
}

/// Client half of the isolation boundary. Cheap to clone; clones share the
/// id counter and pending map.
#[derive(Clone)]
pub struct IsolationChannel {
    shared: Arc<Shared>,
    next_id: Arc<AtomicU64>,
    outbound: mpsc::Sender<Request>,
    timeout: Duration,
}

impl IsolationChannel {
    /// Wire a channel to a worker's request sink and response stream.
    ///
    /// Spawns the response dispatcher, so this must run inside a Tokio
    /// runtime.
    pub fn new(
        outbound: mpsc::Sender<Request>,
        inbound: mpsc::Receiver<Response>,
        timeout: Duration,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        tokio::spawn(dispatch(Arc::clone(&shared), inbound));
        Self {
            shared,
            next_id: Arc::new(AtomicU64::new(1)),
            outbound,
            timeout,
        }
    }

    /// Send `command` and wait for its correlated result.
    ///
    /// # Errors
    ///
    /// The worker's own failure code, [`ErrorCode::WorkerTimeout`] when no
    /// response arrives in time, or [`ErrorCode::WorkerUnavailable`] when the
    /// worker cannot be reached.
    pub async fn call(&self, command: Command) -> Result<Value, ErrorCode> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ErrorCode::WorkerUnavailable);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cmd = command.name();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, tx);
        // The dispatcher may have drained the map between the first check
        // and the insert.
        if self.shared.closed.load(Ordering::Acquire) {
            self.shared.pending.lock().remove(&id);
            return Err(ErrorCode::WorkerUnavailable);
        }
        debug!(id, cmd, "dispatching request");

        if self.outbound.send(Request { id, command }).await.is_err() {
            self.shared.pending.lock().remove(&id);
            warn!(id, cmd, "worker is not accepting requests");
            return Err(ErrorCode::WorkerUnavailable);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            // Sender dropped: the dispatcher drained the map on shutdown.
            Ok(Err(_)) => Err(ErrorCode::WorkerUnavailable),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                warn!(id, cmd, timeout_secs = self.timeout.as_secs(), "worker request timed out");
                Err(ErrorCode::WorkerTimeout)
            }
        }
    }

    /// Number of calls currently waiting for a response.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// `true` once the worker's response stream has ended.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

async fn dispatch(shared: Arc<Shared>, mut inbound: mpsc::Receiver<Response>) {
    while let Some(response) = inbound.recv().await {
        let id = response.id;
        let waiter = shared.pending.lock().remove(&id);
        match waiter {
            Some(tx) => {
                // The caller may have given up between removal and send.
                let _ = tx.send(response);
            }
            None => debug!(id, "dropping response with no pending request"),
        }
    }

    shared.closed.store(true, Ordering::Release);
    let abandoned = std::mem::take(&mut *shared.pending.lock());
    if !abandoned.is_empty() {
        warn!(count = abandoned.len(), "worker stream closed with requests pending");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::HashAlg;

    fn calibrate_cmd(target_ms: u64) -> Command {
        Command::Calibrate {
            target_ms,
            hash: HashAlg::Sha256,
        }
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let (req_tx, mut req_rx) = mpsc::channel::<Request>(16);
        let (resp_tx, resp_rx) = mpsc::channel::<Response>(16);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_secs(5));

        // Fake worker: collect all requests, answer in reverse order, echoing
        // each request's target back as its result.
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < 5 {
                seen.push(req_rx.recv().await.unwrap());
            }
            for req in seen.into_iter().rev() {
                let Command::Calibrate { target_ms, .. } = req.command else {
                    unreachable!()
                };
                resp_tx.send(Response::success(req.id, target_ms)).await.unwrap();
            }
        });

        // Spawn every call before awaiting any, so all five are in flight
        // when the fake worker starts answering.
        let calls = (0..5u64)
            .map(|n| {
                let ch = channel.clone();
                tokio::spawn(async move { (n, ch.call(calibrate_cmd(n * 100)).await) })
            })
            .collect::<Vec<_>>();
        for handle in calls {
            let (n, result) = handle.await.unwrap();
            assert_eq!(result.unwrap(), Value::from(n * 100));
        }
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        let (req_tx, _req_rx) = mpsc::channel::<Request>(4);
        let (_resp_tx, resp_rx) = mpsc::channel::<Response>(4);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_millis(50));

        let result = channel.call(calibrate_cmd(1)).await;
        assert_eq!(result, Err(ErrorCode::WorkerTimeout));
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_ignored() {
        let (req_tx, mut req_rx) = mpsc::channel::<Request>(4);
        let (resp_tx, resp_rx) = mpsc::channel::<Response>(4);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_millis(50));

        assert_eq!(channel.call(calibrate_cmd(1)).await, Err(ErrorCode::WorkerTimeout));
        let stale = req_rx.recv().await.unwrap();
        resp_tx.send(Response::success(stale.id, 1)).await.unwrap();

        // The channel still works for the next call.
        let next = tokio::spawn({
            let ch = channel.clone();
            async move { ch.call(calibrate_cmd(2)).await }
        });
        let req = req_rx.recv().await.unwrap();
        assert_ne!(req.id, stale.id);
        resp_tx.send(Response::success(req.id, 2)).await.unwrap();
        assert_eq!(next.await.unwrap().unwrap(), Value::from(2));
    }

    #[tokio::test]
    async fn worker_failure_code_is_passed_through() {
        let (req_tx, mut req_rx) = mpsc::channel::<Request>(4);
        let (resp_tx, resp_rx) = mpsc::channel::<Response>(4);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_secs(5));

        tokio::spawn(async move {
            let req = req_rx.recv().await.unwrap();
            resp_tx
                .send(Response::failure(req.id, ErrorCode::DecryptFailed))
                .await
                .unwrap();
        });
        assert_eq!(channel.call(calibrate_cmd(1)).await, Err(ErrorCode::DecryptFailed));
    }

    #[tokio::test]
    async fn closed_worker_fails_pending_and_new_calls() {
        let (req_tx, mut req_rx) = mpsc::channel::<Request>(4);
        let (resp_tx, resp_rx) = mpsc::channel::<Response>(4);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_secs(30));

        let pending = tokio::spawn({
            let ch = channel.clone();
            async move { ch.call(calibrate_cmd(1)).await }
        });
        // Wait until the request is in flight, then kill the response stream.
        let _req = req_rx.recv().await.unwrap();
        drop(resp_tx);

        assert_eq!(pending.await.unwrap(), Err(ErrorCode::WorkerUnavailable));
        assert!(channel.is_closed());
        assert_eq!(channel.call(calibrate_cmd(2)).await, Err(ErrorCode::WorkerUnavailable));
    }

    #[tokio::test]
    async fn dropped_request_sink_is_unavailable() {
        let (req_tx, req_rx) = mpsc::channel::<Request>(4);
        let (_resp_tx, resp_rx) = mpsc::channel::<Response>(4);
        drop(req_rx);
        let channel = IsolationChannel::new(req_tx, resp_rx, Duration::from_secs(5));
        assert_eq!(channel.call(calibrate_cmd(1)).await, Err(ErrorCode::WorkerUnavailable));
        assert_eq!(channel.pending(), 0);
    }
}
