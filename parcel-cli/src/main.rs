use std::{path::PathBuf, process, thread};

use clap::Parser;
use commands::handle_download;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

pub mod commands;

/// Downloads a file over HTTP in concurrent byte-range segments.
#[derive(Parser)]
#[clap(author, version, about)]
struct Parcel {
    /// URL to download
    #[clap(short, long, value_parser)]
    url: String,
    /// Output file name (defaults to the last part of the URL path)
    #[clap(short, long, value_parser)]
    output: Option<PathBuf>,
    /// Number of concurrent segments (defaults to the number of CPUs)
    #[clap(short = 'n', long, value_parser)]
    concurrency: Option<usize>,
    /// Whole-request timeout in seconds
    #[clap(long, value_parser)]
    timeout: Option<u64>,
    /// Log progress details to stderr
    #[clap(short, long, action)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let parcel = Parcel::parse();
    init_logging(parcel.verbose);

    let concurrency = parcel.concurrency.unwrap_or_else(default_concurrency);

    if handle_download(parcel.url, parcel.output, concurrency, parcel.timeout)
        .await
        .is_err()
    {
        process::exit(1);
    }
}

fn default_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
