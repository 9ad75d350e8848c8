use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tracing::info;

use parking_lot::Once;

use numbers_server::{run, NUMBERS_LOG, REPORT_PERIOD};

fn init_tracing_subscriber() {
    static TRACING_SUBSCRIBER_INIT: Once = Once::new();
    TRACING_SUBSCRIBER_INIT.call_once(tracing_subscriber::fmt::init);
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    address: String,

    #[arg(long, default_value_t = 4000)]
    port: u16,

    /// How many clients are served concurrently.
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Log file for first-seen numbers, truncated on startup.
    #[arg(long, default_value = NUMBERS_LOG)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing_subscriber();

    let args = Args::parse();

    info!("start");

    let listener = TcpListener::bind(format!("{}:{}", args.address, args.port)).await?;

    run(listener, args.concurrency, &args.log_file, REPORT_PERIOD).await
}
