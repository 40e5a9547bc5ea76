//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use redirector::net::{serve_connection, ConnectionLimits};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Address that refuses connections: bound once, then released.
#[allow(dead_code)]
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start a checksum node that answers every request with `reply`.
///
/// Returns its address and a counter of requests received.
#[allow(dead_code)]
pub async fn start_checksum_node(reply: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let mut line = String::new();
                        if reader.read_line(&mut line).await.is_err() || !line.ends_with('\n') {
                            return;
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        let mut socket = reader.into_inner();
                        let _ = socket.write_all(reply.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

/// Serve `app` over plain TCP with the production connection settings.
#[allow(dead_code)]
pub async fn start_plain_server(app: Router, limits: ConnectionLimits) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let app = app.clone();
                    tokio::spawn(async move {
                        let _ = serve_connection(stream, app, &limits, std::future::pending()).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read one RESP command (array of bulk strings) and return its arguments.
async fn read_resp_command<R>(reader: &mut R) -> Option<Vec<String>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data).await.ok()?;
        data.truncate(len);
        args.push(String::from_utf8_lossy(&data).into_owned());
    }
    Some(args)
}

/// Start a Redis lookalike that completes the connection handshake but never
/// answers GET or SET.
///
/// Returns its address and a counter of GET/SET commands received.
#[allow(dead_code)]
pub async fn start_stalled_redis() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let data_commands = Arc::new(AtomicUsize::new(0));
    let counter = data_commands.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                while let Some(args) = read_resp_command(&mut reader).await {
                    let name = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();
                    if name == "GET" || name == "SET" {
                        counter.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                    if reader.get_mut().write_all(b"+OK\r\n").await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (addr, data_commands)
}
