//! Serve Adler-32 checksums of local files over TCP.

use clap::Parser;
use tokio::net::TcpListener;

use redirector::checksum::server;
use redirector::lifecycle::signals::spawn_signal_handler;
use redirector::lifecycle::Shutdown;
use redirector::observability::logging;

#[derive(Parser)]
#[command(name = "checksum-server")]
#[command(about = "Answer checksum requests for files on this node", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "[::]:9500")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("redirector=info,checksum_server=info");

    let listener = TcpListener::bind(&cli.listen).await?;

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_handler(shutdown.clone());
    server::serve(listener, shutdown.subscribe()).await;

    Ok(())
}
