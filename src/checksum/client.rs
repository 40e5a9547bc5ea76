//! Checksum client with sequential failover.
//!
//! # Responsibilities
//! - Answer from the result cache when possible
//! - Ask candidate servers strictly in order, first usable reply wins
//! - Retry the whole pass once, after a pause, when only the sentinel came back
//!
//! # Design Decisions
//! - Candidates are never queried in parallel
//! - A failed dial, short read, timeout or malformed reply just moves on to
//!   the next candidate
//! - Callers see a single `NoResult` error, never partial output

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::checksum::protocol::{encode_request, resolve_path, Checksum, REPLY_LEN};
use crate::checksum::store::ChecksumStore;

/// Default checksum server port.
pub const DEFAULT_PORT: u16 = 9500;
/// Default directory prefix for relative names.
pub const DEFAULT_PREFIX: &str = "/storage/data/cms/";

/// Error returned by [`ChecksumClient::lookup`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("no result")]
    NoResult,
}

/// Why one candidate could not provide a checksum.
#[derive(Debug, thiserror::Error)]
enum CandidateError {
    #[error("dial timed out")]
    DialTimeout,
    #[error("reply timed out")]
    ReplyTimeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reply")]
    Malformed,
}

/// Result of asking every candidate once.
#[derive(Debug, PartialEq, Eq)]
enum PassOutcome {
    Found(Checksum),
    /// At least one candidate answered with the sentinel, none with a value.
    SentinelOnly,
    /// Every candidate failed.
    Failed,
}

/// Client tuning.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` candidates, tried in order.
    pub candidates: Vec<String>,
    /// Directory prepended to relative names.
    pub path_prefix: String,
    pub dial_timeout: Duration,
    /// Bound on sending the request and reading the reply.
    pub reply_timeout: Duration,
    /// Pause before the single retry pass.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            candidates: ["10.1.2.11", "10.1.2.12", "10.1.2.13"]
                .iter()
                .map(|host| format!("{}:{}", host, DEFAULT_PORT))
                .collect(),
            path_prefix: DEFAULT_PREFIX.to_string(),
            dial_timeout: Duration::from_secs(3),
            reply_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
pub struct ChecksumClient {
    config: ClientConfig,
    store: ChecksumStore,
}

impl ChecksumClient {
    pub fn new(config: ClientConfig, store: ChecksumStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &ChecksumStore {
        &self.store
    }

    /// Checksum of the file `name`, from cache or from the candidates.
    pub async fn lookup(&self, name: &str) -> Result<Checksum, ChecksumError> {
        if let Some(cached) = self.store.get(name).await {
            tracing::debug!(name = %name, checksum = %cached, "Checksum cache hit");
            return Ok(cached);
        }

        let path = resolve_path(&self.config.path_prefix, name);
        let request = encode_request(&path);

        let checksum = match self.pass(&request).await {
            PassOutcome::Found(sum) => sum,
            PassOutcome::SentinelOnly => {
                tracing::info!(
                    path = %path,
                    delay = ?self.config.retry_delay,
                    "Only sentinel replies, retrying once"
                );
                tokio::time::sleep(self.config.retry_delay).await;
                match self.pass(&request).await {
                    PassOutcome::Found(sum) => sum,
                    _ => return Err(ChecksumError::NoResult),
                }
            }
            PassOutcome::Failed => return Err(ChecksumError::NoResult),
        };

        self.store.put(name, &checksum).await;
        Ok(checksum)
    }

    async fn pass(&self, request: &[u8]) -> PassOutcome {
        let mut saw_sentinel = false;

        for addr in &self.config.candidates {
            match self.query(addr, request).await {
                Ok(sum) if sum.is_sentinel() => {
                    tracing::debug!(candidate = %addr, "Candidate returned sentinel");
                    saw_sentinel = true;
                }
                Ok(sum) => {
                    tracing::debug!(candidate = %addr, checksum = %sum, "Candidate answered");
                    return PassOutcome::Found(sum);
                }
                Err(e) => {
                    tracing::debug!(candidate = %addr, error = %e, "Candidate failed");
                }
            }
        }

        if saw_sentinel {
            PassOutcome::SentinelOnly
        } else {
            PassOutcome::Failed
        }
    }

    async fn query(&self, addr: &str, request: &[u8]) -> Result<Checksum, CandidateError> {
        let mut stream = tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| CandidateError::DialTimeout)??;

        let exchange = async {
            stream.write_all(request).await?;
            let mut reply = [0u8; REPLY_LEN];
            stream.read_exact(&mut reply).await?;
            Ok::<_, CandidateError>(reply)
        };
        let reply = tokio::time::timeout(self.config.reply_timeout, exchange)
            .await
            .map_err(|_| CandidateError::ReplyTimeout)??;

        Checksum::parse(&reply).ok_or(CandidateError::Malformed)
    }
}
