//! CLI for the blob submission pipeline.

use crate::{
    journal::{self, Journal},
    sequencer::{self, MessageSend, Mode, Pipeline},
    submitter::{self, Submitter},
};
use alloy::{
    consensus::EnvKzgSettings,
    primitives::{Address, B256, U256},
    signers::local::PrivateKeySigner,
};
use blobsub_artifacts::{
    self as artifacts, AggregationArtifact, ConflationArtifact, ParentSubmissionData,
};
use blobsub_eip4844::BlobCodec;
use clap::Parser;
use std::path::PathBuf;

const ENV_RPC_URL: &str = "RPC_URL";
const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
const ENV_DESTINATION_ADDRESS: &str = "DESTINATION_ADDRESS";

/// Errors from the submission CLI.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// rpc url was not set
    #[error("environment variable {} must be set", ENV_RPC_URL)]
    RpcUrlNotSet,
    /// private key was not set
    #[error("environment variable {} must be set", ENV_PRIVATE_KEY)]
    PrivateKeyNotSet,
    /// destination address was not set
    #[error("environment variable {} must be set", ENV_DESTINATION_ADDRESS)]
    DestinationNotSet,
    /// destination address was not valid hex
    #[error("invalid destination address: {0}")]
    InvalidDestination(alloy::hex::FromHexError),
    /// errors from the alloy signer local crate
    #[error(transparent)]
    SignerLocal(#[from] alloy::signers::local::LocalSignerError),
    /// a block range override was not of the form `first:last`
    #[error("invalid block range override `{0}`, expected `first:last`")]
    InvalidBlockRangeArg(String),
    /// block range overrides must match the artifact list
    #[error("{ranges} block range overrides given for {artifacts} artifacts")]
    BlockRangeCountMismatch {
        /// number of overrides given
        ranges: usize,
        /// number of artifacts given
        artifacts: usize,
    },
    /// blob codec error
    #[error(transparent)]
    Codec(#[from] blobsub_eip4844::Error),
    /// artifact ingestion error
    #[error(transparent)]
    Artifacts(#[from] artifacts::Error),
    /// journal error
    #[error(transparent)]
    Journal(#[from] journal::Error),
    /// submitter construction error
    #[error(transparent)]
    Submitter(#[from] submitter::Error),
    /// pipeline error
    #[error(transparent)]
    Pipeline(#[from] sequencer::Error),
}

/// Blob submission pipeline.
///
/// Posts a batch of conflation artifacts to the rollup contract as blob
/// transactions, then finalizes the batch with its aggregated proof.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Conflation artifact files, in submission order.
    #[arg(required = true)]
    artifacts: Vec<PathBuf>,

    /// Aggregation artifact carrying the proof for the batch.
    #[arg(long)]
    aggregation: PathBuf,

    /// How chunks are mapped onto transactions.
    #[arg(long, value_enum, default_value_t = Mode::PerBlob)]
    mode: Mode,

    /// Required confirmations before a step is considered included.
    #[arg(long, default_value_t = 1)]
    confirmations: u64,

    /// Trusted setup file for the KZG commitments. Defaults to the embedded
    /// Ethereum mainnet setup.
    #[arg(long)]
    trusted_setup: Option<PathBuf>,

    /// Block range override per artifact, `first:last`, in artifact order.
    /// Required for artifacts that carry no conflation order.
    #[arg(long = "block-range")]
    block_ranges: Vec<String>,

    /// Artifact of the previous batch's last chunk, used to seed the chain
    /// link. When absent a fresh chain is bootstrapped.
    #[arg(long)]
    parent: Option<PathBuf>,

    /// State root to bootstrap a fresh chain with. Defaults to the first
    /// artifact's parent state root.
    #[arg(long)]
    bootstrap_state_root: Option<B256>,

    /// Check chunk chaining client side before broadcasting anything. The
    /// deployed contract enforces the same rules either way.
    #[arg(long, default_value_t = false)]
    validate_chain: bool,

    /// Recipient of the auxiliary message send step, which runs between the
    /// data chunks and finalization. Skipped when absent.
    #[arg(long)]
    message_to: Option<Address>,

    /// Fee in wei attached to the auxiliary message.
    #[arg(long, default_value_t = 0)]
    message_fee: u128,

    /// Journal file recording broadcast and confirmed steps; replayed on
    /// rerun so a crashed run resumes instead of restarting.
    #[arg(long, default_value = "submission-journal.jsonl")]
    journal: PathBuf,
}

fn parse_block_range(raw: &str) -> Result<(u64, u64), Error> {
    let (first, last) =
        raw.split_once(':').ok_or_else(|| Error::InvalidBlockRangeArg(raw.to_string()))?;
    let first = first.parse().map_err(|_| Error::InvalidBlockRangeArg(raw.to_string()))?;
    let last = last.parse().map_err(|_| Error::InvalidBlockRangeArg(raw.to_string()))?;
    Ok((first, last))
}

/// Command line interface for running the submission pipeline.
#[derive(Parser, Debug)]
pub struct Cli;

impl Cli {
    /// Run the CLI.
    pub async fn run() -> Result<(), Error> {
        let opts = Opts::parse();

        let rpc_url = std::env::var(ENV_RPC_URL).map_err(|_| Error::RpcUrlNotSet)?;
        let private_key = std::env::var(ENV_PRIVATE_KEY).map_err(|_| Error::PrivateKeyNotSet)?;
        let destination = std::env::var(ENV_DESTINATION_ADDRESS)
            .map_err(|_| Error::DestinationNotSet)?
            .parse::<Address>()
            .map_err(Error::InvalidDestination)?;
        let signer = private_key.parse::<PrivateKeySigner>()?;

        let codec = match &opts.trusted_setup {
            Some(path) => BlobCodec::from_trusted_setup_file(path)?,
            None => BlobCodec::new(EnvKzgSettings::default()),
        };

        if !opts.block_ranges.is_empty() && opts.block_ranges.len() != opts.artifacts.len() {
            return Err(Error::BlockRangeCountMismatch {
                ranges: opts.block_ranges.len(),
                artifacts: opts.artifacts.len(),
            });
        }
        let mut overrides = Vec::with_capacity(opts.block_ranges.len());
        for raw in &opts.block_ranges {
            overrides.push(Some(parse_block_range(raw)?));
        }
        overrides.resize(opts.artifacts.len(), None);

        let mut chunks = Vec::with_capacity(opts.artifacts.len());
        for (path, explicit) in opts.artifacts.iter().zip(overrides) {
            let artifact = ConflationArtifact::from_file(path)?;
            let range = artifact.resolve_block_range(explicit)?;
            chunks.push((artifact, range));
        }

        let parent = match &opts.parent {
            Some(path) => ConflationArtifact::from_file(path)?.chain_link(None)?,
            None => {
                let state_root = opts
                    .bootstrap_state_root
                    .unwrap_or(chunks[0].0.parent_state_root_hash);
                ParentSubmissionData::bootstrap(state_root)
            }
        };

        let aggregation = AggregationArtifact::from_file(&opts.aggregation)?;
        let journal = Journal::open(&opts.journal)?;
        let submitter = Submitter::new(&rpc_url, signer, destination, opts.confirmations)?;

        let message = opts.message_to.map(|to| MessageSend {
            to,
            fee: U256::from(opts.message_fee),
            calldata: Vec::new(),
        });

        let mut pipeline = Pipeline::new(submitter, codec, journal, opts.mode);
        pipeline.run(parent, chunks, aggregation, message, opts.validate_chain).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::parse_block_range;

    #[test]
    fn block_range_override_parses() {
        assert_eq!(parse_block_range("1:46").unwrap(), (1, 46));
        assert!(parse_block_range("1-46").is_err());
        assert!(parse_block_range("one:46").is_err());
    }
}
