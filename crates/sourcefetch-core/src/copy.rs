//! Cancellation-aware streaming copy.
//!
//! Both primitives check the token between chunks and return
//! `FetchError::Cancelled` as soon as it fires. Whatever was already written
//! stays in the writer; discarding a partial destination is the caller's job.
//!
//! Local read and write failures are reported as `FetchError::Io` against the
//! path given for that side of the copy.

use std::path::Path;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};

pub const DEFAULT_COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Copy `reader` (opened from `src`) into `writer` (opened at `dst`) in chunks
/// of `buffer_size` bytes.
pub async fn copy_with_cancel<R, W>(
    cancel: &CancellationToken,
    reader: &mut R,
    src: &Path,
    writer: &mut W,
    dst: &Path,
    buffer_size: usize,
) -> FetchResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut written = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            read = reader.read(&mut buf) => read.map_err(|e| FetchError::io(src, e))?,
        };
        if n == 0 {
            break;
        }

        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| FetchError::io(dst, e))?;
        written += n as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(dst, e))?;
    Ok(written)
}

/// Drain a stream of chunks into `writer` (opened at `dst`).
pub async fn copy_stream_with_cancel<S, W>(
    cancel: &CancellationToken,
    stream: S,
    writer: &mut W,
    dst: &Path,
) -> FetchResult<u64>
where
    S: Stream<Item = FetchResult<Bytes>>,
    W: AsyncWrite + Unpin + ?Sized,
{
    futures::pin_mut!(stream);
    let mut written = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            next = stream.next() => next,
        };
        let chunk = match chunk {
            Some(chunk) => chunk?,
            None => break,
        };

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(dst, e))?;
        written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(dst, e))?;
    Ok(written)
}
