//! Checksum server run on each storage node.
//!
//! One task per connection: read a single path line, stream the file
//! through Adler-32 and reply with 8 hex characters. Any failure closes the
//! connection without a reply, which clients treat as "try the next node".

use std::net::SocketAddr;
use std::path::Path;

use adler2::Adler32;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::checksum::protocol::{Checksum, MAX_REQUEST_LINE};

const READ_CHUNK: usize = 64 * 1024;

/// Adler-32 of everything `reader` yields.
pub async fn adler32<R>(mut reader: R) -> std::io::Result<u32>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Adler32::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.write_slice(&buf[..n]);
    }
    Ok(hasher.checksum())
}

/// Checksum of the file at `path`.
pub async fn file_checksum(path: &Path) -> std::io::Result<Checksum> {
    let file = File::open(path).await?;
    let sum = adler32(file).await?;
    Ok(Checksum::from_value(sum))
}

/// Handle one client: read the request line, reply with the checksum.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let read = (&mut reader).take(MAX_REQUEST_LINE as u64).read_line(&mut line).await;
    match read {
        Ok(0) => return,
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "Failed to read request");
            return;
        }
    }

    let path = line.trim_end_matches(['\r', '\n']);
    if path.is_empty() {
        return;
    }

    let checksum = match file_checksum(Path::new(path)).await {
        Ok(sum) => sum,
        Err(e) => {
            tracing::debug!(peer = %peer, path = %path, error = %e, "Checksum failed");
            return;
        }
    };

    let mut stream = reader.into_inner();
    if let Err(e) = stream.write_all(checksum.as_str().as_bytes()).await {
        tracing::debug!(peer = %peer, error = %e, "Failed to write reply");
        return;
    }
    let _ = stream.shutdown().await;

    tracing::debug!(peer = %peer, path = %path, checksum = %checksum, "Checksum served");
}

/// Accept loop; runs until `shutdown` fires.
pub async fn serve(listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Checksum server listening");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(stream, peer));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                }
            },
            _ = shutdown.recv() => {
                tracing::info!("Checksum server stopping");
                break;
            }
        }
    }
}
