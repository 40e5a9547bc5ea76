//! The HTTPS accept loop: TLS handshake, redirects over TLS and shutdown.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redirector::lifecycle::Shutdown;
use redirector::net::{load_tls_acceptor, ConnectionLimits, Listener};
use redirector::routing::{AffinityRouter, BackendSet, SeededRandom};
use redirector::RedirectServer;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    ca: CertificateDer<'static>,
}

/// Write a fresh self-signed certificate for `localhost` to disk.
fn write_self_signed(tag: &str) -> (PathBuf, PathBuf, CertificateDer<'static>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let dir = std::env::temp_dir().join(format!("redirector-tls-{}-{}", std::process::id(), tag));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("hostcert.pem");
    let key_path = dir.join("hostkey.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

    (cert_path, key_path, cert.der().clone())
}

async fn start(tag: &str, limits: ConnectionLimits) -> Running {
    let (cert, key, ca) = write_self_signed(tag);
    let tls = load_tls_acceptor(&cert, &key).unwrap();

    let router = Arc::new(AffinityRouter::new(
        BackendSet::new(["https://store.example:1094"]).unwrap(),
        NonZeroUsize::new(16).unwrap(),
        Arc::new(SeededRandom::new(1)),
    ));
    let server = RedirectServer::new(router, limits);

    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), 64).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, tls, signal).await.unwrap();
    });

    Running {
        addr,
        shutdown,
        handle,
        ca,
    }
}

async fn connect(running: &Running) -> tokio_rustls::client::TlsStream<TcpStream> {
    let mut roots = RootCertStore::empty();
    roots.add(running.ca.clone()).unwrap();

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    let tcp = TcpStream::connect(running.addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    TlsConnector::from(Arc::new(config)).connect(name, tcp).await.unwrap()
}

/// Read until the end of the response head (bodies are always empty).
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n > 0, "connection closed before the response head");
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&head).to_ascii_lowercase()
}

#[tokio::test]
async fn redirects_over_tls() {
    let running = start("redirect", ConnectionLimits::default()).await;
    let mut stream = connect(&running).await;

    let (_, session) = stream.get_ref();
    assert_eq!(session.alpn_protocol(), Some(&b"http/1.1"[..]));

    stream
        .write_all(b"GET /store/./a/../f.root HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;
    assert!(head.starts_with("http/1.1 302"), "{}", head);
    assert!(head.contains("\r\nlocation: https://store.example:1094/store/f.root\r\n"));
    assert!(!head.contains("\r\ndate:"));

    // Same connection, second request.
    stream
        .write_all(b"POST /store/f.root HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;
    assert!(head.starts_with("http/1.1 307"), "{}", head);

    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn stalled_handshake_is_dropped() {
    let limits = ConnectionLimits {
        read_timeout: Duration::from_millis(300),
        ..ConnectionLimits::default()
    };
    let running = start("handshake", limits).await;

    // Plain TCP that never starts the TLS handshake.
    let mut tcp = TcpStream::connect(running.addr).await.unwrap();
    let started = Instant::now();
    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(3), tcp.read_to_end(&mut rest)).await;

    assert!(closed.is_ok(), "server must close a silent client");
    assert!(rest.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(250));

    running.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let running = start("shutdown", ConnectionLimits::default()).await;
    let mut stream = connect(&running).await;

    stream
        .write_all(b"GET /x HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;
    assert!(head.starts_with("http/1.1 302"));

    // The connection is idle but open; the drain must not wait out the
    // grace period for it.
    let started = Instant::now();
    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(3), running.handle)
        .await
        .expect("run returns well within the grace period")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest)).await;
    assert!(read.is_ok(), "client sees the connection close");
}

#[tokio::test]
async fn no_new_connections_after_shutdown() {
    let running = start("closed", ConnectionLimits::default()).await;
    let addr = running.addr;

    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(3), running.handle)
        .await
        .unwrap()
        .unwrap();

    // The listener is gone with the loop.
    assert!(TcpStream::connect(addr).await.is_err());
}
