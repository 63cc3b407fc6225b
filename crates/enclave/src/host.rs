//! Host the [`Worker`] on a dedicated OS thread.
//!
//! The thread owns the worker and processes one request at a time in arrival
//! order. It exits when the request sender is dropped.

use std::io;
use std::thread;

use common::protocol::{Request, Response};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::worker::Worker;

/// Name given to the worker thread.
pub const THREAD_NAME: &str = "x4-enclave";

/// Spawn `worker` on its own thread and return the channel ends used to talk
/// to it.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_thread(
    worker: Worker,
    capacity: usize,
) -> io::Result<(mpsc::Sender<Request>, mpsc::Receiver<Response>)> {
    let (request_tx, mut request_rx) = mpsc::channel::<Request>(capacity);
    let (response_tx, response_rx) = mpsc::channel::<Response>(capacity);

    thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || {
            info!("worker thread started");
            while let Some(request) = request_rx.blocking_recv() {
                let response = worker.handle(request);
                if response_tx.blocking_send(response).is_err() {
                    debug!("response receiver dropped");
                    break;
                }
            }
            info!("worker thread stopped");
        })?;

    Ok((request_tx, response_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::Command;
    use common::HashAlg;

    #[tokio::test]
    async fn answers_in_arrival_order() {
        let (tx, mut rx) = spawn_thread(Worker::new(), 8).unwrap();
        for id in [10, 11, 12] {
            tx.send(Request {
                id,
                command: Command::Calibrate {
                    target_ms: 0,
                    hash: HashAlg::Sha256,
                },
            })
            .await
            .unwrap();
        }
        for id in [10, 11, 12] {
            let r = rx.recv().await.unwrap();
            assert_eq!(r.id, id);
            assert!(r.ok);
        }
    }

    #[tokio::test]
    async fn thread_stops_when_sender_dropped() {
        let (tx, mut rx) = spawn_thread(Worker::new(), 1).unwrap();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
