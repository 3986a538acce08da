//! Output delivery.
//!
//! [`ScopedStream`] reads the produced container in fixed-size chunks and
//! owns the job's [`ScopedDir`]. The directory is released on the stream's
//! terminal event: end of file, a read error, or the stream being dropped
//! before either (client went away). The paired [`DeliveryHandle`] resolves
//! with what happened.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use bf_av::ScopedDir;
use bf_core::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;

/// Read chunk size for streamed output.
pub const DELIVERY_CHUNK_SIZE: usize = 64 * 1024;

/// Terminal state of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every byte was read and handed to the consumer.
    Completed { bytes: u64 },
    /// Reading the output failed mid-stream.
    Failed { bytes: u64, error: String },
    /// The consumer dropped the stream before the end.
    Abandoned { bytes: u64 },
}

impl DeliveryOutcome {
    /// `Ok(bytes)` for a completed delivery, [`Error::Delivery`] otherwise.
    pub fn into_result(self) -> Result<u64> {
        match self {
            Self::Completed { bytes } => Ok(bytes),
            Self::Failed { bytes, error } => Err(Error::Delivery(format!(
                "read failed after {bytes} bytes: {error}"
            ))),
            Self::Abandoned { bytes } => Err(Error::Delivery(format!(
                "stream abandoned after {bytes} bytes"
            ))),
        }
    }
}

/// Resolves once the paired [`ScopedStream`] reaches a terminal state and its
/// scope has been released. Await it before checking the directory.
#[derive(Debug)]
pub struct DeliveryHandle {
    rx: oneshot::Receiver<DeliveryOutcome>,
}

impl Future for DeliveryHandle {
    type Output = DeliveryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(DeliveryOutcome::Abandoned { bytes: 0 }))
    }
}

/// A byte stream over a file that owns the directory containing it.
#[derive(Debug)]
pub struct ScopedStream {
    inner: ReaderStream<tokio::fs::File>,
    scope: Option<ScopedDir>,
    len: u64,
    sent: u64,
    outcome_tx: Option<oneshot::Sender<DeliveryOutcome>>,
}

impl ScopedStream {
    /// Open `path` for streaming. `scope` is released when the stream ends
    /// (or immediately, if the file cannot be opened).
    pub async fn open(path: &Path, scope: ScopedDir) -> Result<(Self, DeliveryHandle)> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let (tx, rx) = oneshot::channel();
        let stream = Self {
            inner: ReaderStream::with_capacity(file, DELIVERY_CHUNK_SIZE),
            scope: Some(scope),
            len,
            sent: 0,
            outcome_tx: Some(tx),
        };
        Ok((stream, DeliveryHandle { rx }))
    }

    /// Release the scope and then report `outcome`. Removal runs on the
    /// blocking pool when a runtime is available, so the handle resolves only
    /// once the directory is gone.
    fn finish(&mut self, outcome: DeliveryOutcome) {
        let scope = self.scope.take();
        let Some(tx) = self.outcome_tx.take() else {
            return;
        };
        let release = move || {
            if let Some(scope) = scope {
                scope.release();
            }
            let _ = tx.send(outcome);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}

impl Stream for ScopedStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome_tx.is_none() {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!("Output stream failed after {} bytes: {e}", this.sent);
                this.finish(DeliveryOutcome::Failed {
                    bytes: this.sent,
                    error: e.to_string(),
                });
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(DeliveryOutcome::Completed { bytes: this.sent });
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ScopedStream {
    fn drop(&mut self) {
        if self.outcome_tx.is_none() {
            return;
        }
        // A consumer that stops at Content-Length never polls for the end.
        if self.sent >= self.len {
            self.finish(DeliveryOutcome::Completed { bytes: self.sent });
        } else {
            tracing::warn!("Output stream dropped after {} of {} bytes", self.sent, self.len);
            self.finish(DeliveryOutcome::Abandoned { bytes: self.sent });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_av::workspace::JOB_PREFIX;
    use futures::StreamExt;

    fn scope_with_file(len: usize) -> (ScopedDir, std::path::PathBuf) {
        let scope = ScopedDir::acquire(None, JOB_PREFIX).unwrap();
        let file = scope.file("book.m4b");
        std::fs::write(&file, vec![7u8; len]).unwrap();
        (scope, file)
    }

    #[tokio::test]
    async fn full_read_completes_and_releases() {
        let (scope, file) = scope_with_file(DELIVERY_CHUNK_SIZE * 2 + 10);
        let dir = scope.path().to_path_buf();
        let (mut stream, handle) = ScopedStream::open(&file, scope).await.unwrap();

        let mut total = 0usize;
        let mut chunks = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= DELIVERY_CHUNK_SIZE);
            total += chunk.len();
            chunks += 1;
        }
        assert_eq!(total, DELIVERY_CHUNK_SIZE * 2 + 10);
        assert!(chunks >= 3);
        assert_eq!(
            handle.await,
            DeliveryOutcome::Completed {
                bytes: (DELIVERY_CHUNK_SIZE * 2 + 10) as u64
            }
        );
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn dropped_stream_is_abandoned_and_releases() {
        let (scope, file) = scope_with_file(DELIVERY_CHUNK_SIZE * 3);
        let dir = scope.path().to_path_buf();
        let (mut stream, handle) = ScopedStream::open(&file, scope).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        drop(stream);

        let outcome = handle.await;
        assert!(!dir.exists());
        assert_eq!(
            outcome,
            DeliveryOutcome::Abandoned {
                bytes: first.len() as u64
            }
        );
        assert!(matches!(outcome.into_result(), Err(Error::Delivery(_))));
    }

    #[tokio::test]
    async fn drop_after_last_byte_counts_as_completed() {
        let (scope, file) = scope_with_file(100);
        let (mut stream, handle) = ScopedStream::open(&file, scope).await.unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.len(), 100);
        drop(stream);

        assert_eq!(handle.await, DeliveryOutcome::Completed { bytes: 100 });
    }

    #[tokio::test]
    async fn open_failure_releases_scope() {
        let scope = ScopedDir::acquire(None, JOB_PREFIX).unwrap();
        let dir = scope.path().to_path_buf();
        let missing = scope.file("missing.m4b");

        let err = ScopedStream::open(&missing, scope).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn empty_file_completes_with_zero_bytes() {
        let (scope, file) = scope_with_file(0);
        let (stream, handle) = ScopedStream::open(&file, scope).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert!(chunks.is_empty());
        assert_eq!(handle.await.into_result().unwrap(), 0);
    }
}
