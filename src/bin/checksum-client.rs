//! Look up the Adler-32 checksum of a stored file.
//!
//! Prints the checksum on stdout and exits 0, or exits 1 with no output.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use redirector::checksum::client::{DEFAULT_PORT, DEFAULT_PREFIX};
use redirector::checksum::{ChecksumClient, ChecksumStore, ClientConfig};
use redirector::observability::logging;

#[derive(Parser)]
#[command(name = "checksum-client")]
#[command(about = "Fetch a file checksum from the storage nodes", long_about = None)]
struct Cli {
    /// File name, relative to the prefix, or an absolute path.
    name: String,

    /// Candidate checksum server host, tried in the given order.
    #[arg(long = "server", default_values = ["10.1.2.11", "10.1.2.12", "10.1.2.13"])]
    servers: Vec<String>,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory prepended to relative names.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    #[arg(long, default_value = "redis://127.0.0.1:6379/")]
    redis: String,

    /// Skip the result cache entirely.
    #[arg(long)]
    no_cache: bool,

    #[arg(long, default_value_t = 3)]
    dial_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    reply_timeout_secs: u64,

    /// Pause before retrying when every node returned the sentinel.
    #[arg(long, default_value_t = 3)]
    retry_delay_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_stderr("warn");

    let dial_timeout = Duration::from_secs(cli.dial_timeout_secs);
    let store = if cli.no_cache {
        ChecksumStore::Disabled
    } else {
        ChecksumStore::redis_or_disabled(&cli.redis, dial_timeout).await
    };

    let config = ClientConfig {
        candidates: cli
            .servers
            .iter()
            .map(|host| format!("{}:{}", host, cli.port))
            .collect(),
        path_prefix: cli.prefix,
        dial_timeout,
        reply_timeout: Duration::from_secs(cli.reply_timeout_secs),
        retry_delay: Duration::from_secs(cli.retry_delay_secs),
    };
    let client = ChecksumClient::new(config, store);

    match client.lookup(&cli.name).await {
        Ok(checksum) => {
            println!("{}", checksum);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::warn!(name = %cli.name, error = %e, "Checksum lookup failed");
            ExitCode::FAILURE
        }
    }
}
