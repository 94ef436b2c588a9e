//! Data-exchange phase of the transfer operations.
//!
//! Each function moves bytes over an already-open data connection in bounded
//! chunks and returns the byte count. Any I/O failure aborts the transfer;
//! nothing is retried. Senders shut down their write side to mark the end of
//! data; receivers read until the peer does the same.

use log::{debug, info};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;
use crate::storage::validation::io_to_storage;

/// Writes one CRLF-terminated line per entry name.
pub async fn send_listing<W>(data: &mut W, names: &[String]) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    for name in names {
        let line = format!("{}\r\n", name);
        data.write_all(line.as_bytes())
            .await
            .map_err(TransferError::Aborted)?;
        total += line.len() as u64;
    }
    data.flush().await.map_err(TransferError::Aborted)?;
    data.shutdown().await.map_err(TransferError::Aborted)?;

    debug!("Sent listing of {} entries ({} bytes)", names.len(), total);
    Ok(total)
}

/// A zero-sized buffer would read nothing and report an empty transfer.
fn transfer_buffer(buffer_size: usize) -> Result<Vec<u8>, TransferError> {
    if buffer_size == 0 {
        return Err(TransferError::Aborted(io::Error::new(
            io::ErrorKind::InvalidInput,
            "transfer buffer size is zero",
        )));
    }
    Ok(vec![0u8; buffer_size])
}

/// Streams the file at `path` verbatim into `data`.
pub async fn send_file<W>(path: &Path, data: &mut W, buffer_size: usize) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let display = path.display().to_string();
    let mut file = File::open(path)
        .await
        .map_err(|e| TransferError::FileAccess(io_to_storage(e, path, &display)))?;

    let mut buffer = transfer_buffer(buffer_size)?;
    let mut total_bytes_sent = 0u64;

    loop {
        let n = file.read(&mut buffer).await.map_err(TransferError::Aborted)?;
        if n == 0 {
            break;
        }
        data.write_all(&buffer[..n])
            .await
            .map_err(TransferError::Aborted)?;
        total_bytes_sent += n as u64;
    }

    data.flush().await.map_err(TransferError::Aborted)?;
    data.shutdown().await.map_err(TransferError::Aborted)?;

    info!(
        "File download completed: {} ({} bytes)",
        display, total_bytes_sent
    );
    Ok(total_bytes_sent)
}

/// Reads `data` until the peer closes it, writing everything to `dest`.
///
/// `dest` is created or truncated. A failure midway leaves the partial file
/// in place.
pub async fn receive_file<R>(data: &mut R, dest: &Path, buffer_size: usize) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = transfer_buffer(buffer_size)?;
    let display = dest.display().to_string();
    let mut file = File::create(dest)
        .await
        .map_err(|e| TransferError::FileAccess(io_to_storage(e, dest, &display)))?;

    let mut total_bytes_received = 0u64;

    loop {
        let n = match data.read(&mut buffer).await {
            Ok(n) => n,
            Err(e) => {
                // Keep what already arrived.
                let _ = file.flush().await;
                return Err(TransferError::Aborted(e));
            }
        };
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(TransferError::Aborted)?;
        total_bytes_received += n as u64;
    }

    // tokio::fs::File completes writes in the background until flushed.
    file.flush().await.map_err(TransferError::Aborted)?;

    info!(
        "File upload completed: {} ({} bytes)",
        display, total_bytes_received
    );
    Ok(total_bytes_received)
}
