//! The binary for running the blob submission pipeline.

use blobsub_pipeline::cli::Cli;

#[tokio::main]
async fn main() {
    let _guards = blobsub_tracing::init_logging().unwrap();

    if let Err(e) = Cli::run().await {
        println!("Error: {}", e);
        std::process::exit(1);
    }
}
