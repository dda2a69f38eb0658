//! streamftp upload client entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use streamftp_client::{ClientOptions, UploadClient};
use streamftp_protocol::constants::DEFAULT_CHUNK_SIZE;
use streamftp_protocol::{HashAlgorithm, UploadResponse};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streamftp", version, about = "Upload a file to a streamftp server")]
struct Cli {
    host: String,

    port: u16,

    /// Local file to upload.
    #[arg(required_unless_present = "touch")]
    infile: Option<PathBuf>,

    /// Absolute destination path on the server.
    #[arg(required_unless_present = "touch")]
    outpath: Option<String>,

    /// Create or truncate REMOTE as an empty file instead of uploading.
    #[arg(long, value_name = "REMOTE", conflicts_with_all = ["infile", "outpath"])]
    touch: Option<String>,

    /// Digest to verify the upload with: sha256, sha512 or none.
    #[arg(long, default_value = "sha256")]
    hash: HashAlgorithm,

    /// Bytes per chunk message.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Seconds to wait for the connection.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

enum Job {
    Touch(String),
    Upload(PathBuf, String),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = ClientOptions {
        chunk_size: cli.chunk_size,
        hash_algorithm: cli.hash,
        connect_timeout: Duration::from_secs(cli.connect_timeout),
    };
    let job = match (cli.touch, cli.infile, cli.outpath) {
        (Some(remote), _, _) => Job::Touch(remote),
        (None, Some(local), Some(remote)) => Job::Upload(local, remote),
        _ => anyhow::bail!("<INFILE> and <OUTPATH> are required without --touch"),
    };
    let client = UploadClient::new(format!("{}:{}", cli.host, cli.port), options);

    let rt = tokio::runtime::Runtime::new()?;
    let cancel = client.cancel_token();
    let response = rt.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        match &job {
            Job::Touch(remote) => client.touch(remote).await,
            Job::Upload(local, remote) => client.upload_file(local, remote).await,
        }
    })?;

    print_response(&response);
    Ok(())
}

fn print_response(response: &UploadResponse) {
    println!("{}", response.metadata);
    match &response.digest {
        Some(digest) => println!("hash:  {digest}"),
        None => println!("hash:  (not verified)"),
    }
}
