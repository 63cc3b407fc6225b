//! Newline-delimited JSON request loop for the standalone worker process.
//!
//! For each request line the loop:
//! 1. Hands the line to the [`Worker`] on the blocking pool.
//! 2. Writes the single JSON response line back and flushes.
//! 3. Zeroizes both lines, since they may carry secrets or plaintext.
//!
//! Requests are processed strictly one at a time in arrival order.

use anyhow::{Context, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::worker::Worker;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// A request line longer than `max_frame_bytes` is discarded up to its
/// newline and gets no response; the loop carries on with the next line.
///
/// # Errors
///
/// Returns an error on I/O failure of either stream.
pub async fn run<R, W>(mut reader: R, mut writer: W, worker: Worker, max_frame_bytes: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Driven by hand rather than through `FramedRead`, which ends the stream
    // after the first decode error.
    let mut codec = LinesCodec::new_with_max_length(max_frame_bytes);
    let mut buf = BytesMut::with_capacity(READ_CHUNK_BYTES);
    let mut eof = false;
    info!(max_frame_bytes, "worker serving requests");

    loop {
        let decoded = if eof {
            codec.decode_eof(&mut buf)
        } else {
            codec.decode(&mut buf)
        };
        let line = match decoded {
            Ok(Some(line)) => Zeroizing::new(line),
            Ok(None) if eof => break,
            Ok(None) => {
                buf.reserve(READ_CHUNK_BYTES);
                let read = reader
                    .read_buf(&mut buf)
                    .await
                    .context("failed to read request stream")?;
                eof = read == 0;
                continue;
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(max_frame_bytes, "discarding request line over the frame limit");
                continue;
            }
            Err(LinesCodecError::Io(e)) => return Err(e).context("failed to read request stream"),
        };
        if line.trim().is_empty() {
            continue;
        }

        let handler = worker.clone();
        let response = tokio::task::spawn_blocking(move || handler.handle_line(&line))
            .await
            .context("worker task failed")?;

        let mut out = Zeroizing::new(
            serde_json::to_string(&response).context("failed to encode response")?,
        );
        drop(response);
        out.push('\n');
        writer
            .write_all(out.as_bytes())
            .await
            .context("failed to write response")?;
        writer.flush().await.context("failed to flush response")?;
    }

    debug!("request stream closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::Response;
    use common::ErrorCode;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn answers_each_line_in_order() {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let serve = tokio::spawn(run(server_read, server_write, Worker::new(), 64 * 1024));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(
                b"{\"id\":1,\"cmd\":\"calibrate\",\"targetMs\":0,\"hash\":\"SHA-256\"}\n\
                  \n\
                  {\"id\":2,\"cmd\":\"bogus\"}\n",
            )
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let first: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.id, 1);
        assert!(first.ok);
        assert_eq!(second, Response::failure(2, ErrorCode::UnknownCmd));

        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_line_is_skipped() {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let serve = tokio::spawn(run(server_read, server_write, Worker::new(), 128));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut input = b"{\"id\":1,\"cmd\":\"decrypt\",\"payload\":\"".to_vec();
        input.extend(std::iter::repeat(b'A').take(100 * 1024));
        input.extend_from_slice(b"\"}\n{\"id\":2,\"cmd\":\"calibrate\",\"targetMs\":0,\"hash\":\"SHA-256\"}\n");
        client_write.write_all(&input).await.unwrap();
        client_write.shutdown().await.unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let only: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(only.id, 2);
        assert!(only.ok);
        assert!(lines.next_line().await.unwrap().is_none());

        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn last_line_without_newline_is_answered() {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let serve = tokio::spawn(run(server_read, server_write, Worker::new(), 1024));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"{\"id\":3,\"cmd\":\"calibrate\",\"targetMs\":0,\"hash\":\"SHA-512\"}")
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let response: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response.id, 3);
        serve.await.unwrap().unwrap();
    }
}
