//! Command-line front end for the chunked uploader.

use chunked_uploader::logging::{init_logging, LogConfig};
use chunked_uploader::{Credential, UploadParams, Uploader, UploaderConfig};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "chunked-uploader")]
#[command(about = "Upload a file to a chunked upload endpoint", long_about = None)]
#[command(version)]
struct Cli {
    /// File to upload
    file: PathBuf,

    /// Upload session endpoint, e.g. https://example.com/api/upload
    endpoint: String,

    /// Bytes per chunk
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    chunk_size: u64,

    /// Maximum retries per chunk
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Bearer token presented to the endpoint
    #[arg(long)]
    token: Option<String>,

    /// Write logs to a file in addition to stdout
    #[arg(long)]
    log_to_file: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default();
    log_config.log_to_file = cli.log_to_file;
    let _guard = init_logging(log_config)?;

    let mut config = UploaderConfig::default()
        .with_chunk_size(cli.chunk_size)
        .with_max_retries(cli.max_retries);
    if let Some(token) = cli.token {
        config = config.with_auth(Credential::Bearer { token });
    }

    let file_name = cli
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();

    let params = UploadParams {
        local_path: cli.file,
        endpoint: cli.endpoint,
        file_name,
        mime_type: "application/octet-stream".to_string(),
    };

    let uploader = Uploader::new(config);
    let outcome = uploader.upload(params, CancellationToken::new()).await;

    println!(
        "{:?}: session {} ({} bytes uploaded)",
        outcome.state, outcome.session_id, outcome.bytes_uploaded
    );
    if let Some(error) = outcome.error {
        eprintln!("error: {error}");
        std::process::exit(1);
    }

    Ok(())
}
