//! Typed prover artifacts that drive the submission pipeline.
//!
//! Each conflation artifact is a JSON document produced off-chain by the
//! prover stack. It carries the compressed block data destined for a blob,
//! the state roots around it, and the shnarf values chaining it to its
//! neighbours. One aggregation artifact per batch carries the aggregated
//! proof and the messaging metadata for the finalization call.

use alloy::primitives::{Bytes, B256, U256};
use base64::prelude::*;
use serde::Deserialize;
use std::path::Path;

/// Shnarf carried by the chain bootstrap record before anything was submitted.
pub const GENESIS_SHNARF: B256 = B256::ZERO;

/// Errors for this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// artifact file could not be read
    #[error("error reading artifact {path}: {source}")]
    Io {
        /// offending path
        path: String,
        /// underlying io error
        source: std::io::Error,
    },
    /// artifact file could not be parsed
    #[error("error parsing artifact {path}: {source}")]
    Json {
        /// offending path
        path: String,
        /// underlying parse error
        source: serde_json::Error,
    },
    /// compressed data payload was not valid base64
    #[error("error decoding compressed data: {0}")]
    Base64(#[from] base64::DecodeError),
    /// neither the artifact nor the caller supplied a block range
    #[error("artifact has no conflation order and no explicit block range was given")]
    MissingBlockRange,
    /// conflation order was present but empty
    #[error("conflation order has no upper boundaries")]
    EmptyConflationOrder,
    /// block range bounds are inverted
    #[error("invalid block range: first block {first} is past final block {last}")]
    InvalidBlockRange {
        /// start of the range
        first: u64,
        /// end of the range
        last: u64,
    },
    /// an artifact does not extend the chain built by its predecessors
    #[error("chunk {index} does not extend the chain: {reason}")]
    BrokenChain {
        /// position of the offending chunk, 0 based
        index: usize,
        /// what failed to line up
        reason: String,
    },
}

/// Inclusive L2 block range covered by one data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First L2 block in the chunk.
    pub first: u64,
    /// Final L2 block in the chunk, inclusive.
    pub last: u64,
}

impl BlockRange {
    /// Create a range, rejecting inverted bounds.
    pub fn new(first: u64, last: u64) -> Result<Self, Error> {
        if first > last {
            return Err(Error::InvalidBlockRange { first, last });
        }
        Ok(Self { first, last })
    }
}

/// The conflation description embedded in most artifacts: which L2 blocks
/// were grouped into this chunk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflationOrder {
    /// First L2 block of the chunk.
    pub starting_block_number: u64,
    /// Upper block boundary of each conflated segment; the last entry is the
    /// final block of the chunk.
    pub upper_boundaries: Vec<u64>,
}

/// One prover artifact describing a single data chunk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflationArtifact {
    /// State root before this chunk.
    pub parent_state_root_hash: B256,
    /// Hash linking to the previous chunk's data commitment.
    pub parent_data_hash: B256,
    /// State root after this chunk.
    pub final_state_root_hash: B256,
    /// Commitment to the compressed data used inside the proof circuit.
    pub snark_hash: B256,
    /// Base64 encoded compressed block data.
    pub compressed_data: String,
    /// Block grouping for this chunk. Older artifacts omit it, in which case
    /// the range must come from the caller.
    #[serde(default)]
    pub conflation_order: Option<ConflationOrder>,
    /// Shnarf this chunk is expected to produce.
    pub expected_shnarf: B256,
    /// Shnarf produced by the previous chunk.
    pub prev_shnarf: B256,
    /// Evaluation challenge point of the blob polynomial.
    pub expected_x: B256,
    /// Evaluation of the blob polynomial at the challenge point.
    pub expected_y: B256,
}

/// The on-chain fields describing one chunk of rollup data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionData {
    /// State root before this chunk.
    pub parent_state_root_hash: B256,
    /// Hash linking to the previous chunk's data commitment.
    pub data_parent_hash: B256,
    /// State root after this chunk.
    pub final_state_root_hash: B256,
    /// First L2 block covered, inclusive.
    pub first_block_in_data: u64,
    /// Final L2 block covered, inclusive.
    pub final_block_in_data: u64,
    /// Commitment to the compressed data used inside the proof circuit.
    pub snark_hash: B256,
}

/// Chaining record carried between chunks.
///
/// Produced from the previous chunk's artifact (or [`Self::bootstrap`] for a
/// fresh chain) and consumed by the next chunk's encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSubmissionData {
    /// State root after the previous chunk.
    pub final_state_root_hash: B256,
    /// First block of the previous chunk.
    pub first_block_in_data: u64,
    /// Final block of the previous chunk.
    pub final_block_in_data: u64,
    /// Data parent hash of the previous chunk.
    pub data_parent_hash: B256,
    /// Shnarf produced by the previous chunk.
    pub shnarf: B256,
}

impl ParentSubmissionData {
    /// Chaining record for the very first chunk of a fresh chain.
    pub const fn bootstrap(state_root_hash: B256) -> Self {
        Self {
            final_state_root_hash: state_root_hash,
            first_block_in_data: 0,
            final_block_in_data: 0,
            data_parent_hash: B256::ZERO,
            shnarf: GENESIS_SHNARF,
        }
    }
}

/// The shnarf recomputation inputs the finalization call carries on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShnarfData {
    /// Shnarf produced by the second to last chunk.
    pub prev_shnarf: B256,
    /// Snark hash of the last chunk.
    pub snark_hash: B256,
    /// State root after the last chunk.
    pub final_state_root_hash: B256,
    /// Evaluation challenge point of the last chunk's blob.
    pub expected_x: B256,
    /// Evaluation of the last chunk's blob at the challenge point.
    pub expected_y: B256,
}

impl ConflationArtifact {
    /// Read and parse an artifact file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read(path)
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        serde_json::from_slice(&raw)
            .map_err(|source| Error::Json { path: path.display().to_string(), source })
    }

    /// Decode the compressed data payload destined for the blob.
    pub fn payload(&self) -> Result<Vec<u8>, Error> {
        BASE64_STANDARD.decode(&self.compressed_data).map_err(Into::into)
    }

    /// Resolve the block range for this chunk.
    ///
    /// An explicit caller-supplied range wins; otherwise it is derived from
    /// the conflation order. Artifacts without a conflation order require an
    /// explicit range.
    pub fn resolve_block_range(&self, explicit: Option<(u64, u64)>) -> Result<BlockRange, Error> {
        match (explicit, &self.conflation_order) {
            (Some((first, last)), _) => BlockRange::new(first, last),
            (None, Some(order)) => {
                let last =
                    order.upper_boundaries.last().copied().ok_or(Error::EmptyConflationOrder)?;
                BlockRange::new(order.starting_block_number, last)
            }
            (None, None) => Err(Error::MissingBlockRange),
        }
    }

    /// The on-chain submission fields for this chunk.
    pub fn submission_data(&self, explicit: Option<(u64, u64)>) -> Result<SubmissionData, Error> {
        let range = self.resolve_block_range(explicit)?;
        Ok(SubmissionData {
            parent_state_root_hash: self.parent_state_root_hash,
            data_parent_hash: self.parent_data_hash,
            final_state_root_hash: self.final_state_root_hash,
            first_block_in_data: range.first,
            final_block_in_data: range.last,
            snark_hash: self.snark_hash,
        })
    }

    /// The chaining record this chunk hands to its successor.
    pub fn chain_link(&self, explicit: Option<(u64, u64)>) -> Result<ParentSubmissionData, Error> {
        let range = self.resolve_block_range(explicit)?;
        Ok(ParentSubmissionData {
            final_state_root_hash: self.final_state_root_hash,
            first_block_in_data: range.first,
            final_block_in_data: range.last,
            data_parent_hash: self.parent_data_hash,
            shnarf: self.expected_shnarf,
        })
    }

    /// The blob polynomial evaluation claim, as the contract expects it.
    pub fn data_evaluation_claim(&self) -> U256 {
        U256::from_be_bytes(self.expected_y.0)
    }

    /// The shnarf recomputation inputs carried by the finalization call.
    pub const fn shnarf_data(&self) -> ShnarfData {
        ShnarfData {
            prev_shnarf: self.prev_shnarf,
            snark_hash: self.snark_hash,
            final_state_root_hash: self.final_state_root_hash,
            expected_x: self.expected_x,
            expected_y: self.expected_y,
        }
    }
}

/// One prover artifact describing the aggregated proof for a batch of chunks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationArtifact {
    /// The aggregated validity proof bytes.
    pub aggregated_proof: Bytes,
    /// State root the batch finalizes on top of.
    pub parent_state_root_hash: B256,
    /// Timestamp of the last block of the previous aggregation.
    pub parent_aggregation_last_block_timestamp: u64,
    /// Timestamp of the last block of this aggregation.
    pub final_timestamp: u64,
    /// Rolling hash of L1 to L2 messages anchored by this batch.
    pub l1_rolling_hash: B256,
    /// Message number matching [`Self::l1_rolling_hash`].
    pub l1_rolling_hash_message_number: u64,
    /// Merkle roots of L2 to L1 messages.
    pub l2_merkle_roots: Vec<B256>,
    /// Depth of the L2 message merkle trees.
    pub l2_merkle_trees_depth: u64,
    /// Packed offsets of L2 blocks carrying messages.
    pub l2_messaging_blocks_offsets: Bytes,
}

impl AggregationArtifact {
    /// Read and parse an aggregation artifact file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read(path)
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        serde_json::from_slice(&raw)
            .map_err(|source| Error::Json { path: path.display().to_string(), source })
    }
}

/// Check that consecutive chunks extend each other before anything is
/// broadcast.
///
/// The deployed contract performs the same checks and stays the authority;
/// this is an opt-in preflight so a forged or misordered artifact set fails
/// before the first transaction instead of as an on-chain revert.
pub fn validate_chain(
    parent: &ParentSubmissionData,
    chunks: &[(ConflationArtifact, BlockRange)],
) -> Result<(), Error> {
    let mut prev_shnarf = parent.shnarf;
    let mut prev_final_block = parent.final_block_in_data;
    let mut prev_state_root = parent.final_state_root_hash;

    for (index, (artifact, range)) in chunks.iter().enumerate() {
        if artifact.prev_shnarf != prev_shnarf {
            return Err(Error::BrokenChain {
                index,
                reason: format!(
                    "prevShnarf {} does not match the preceding shnarf {prev_shnarf}",
                    artifact.prev_shnarf
                ),
            });
        }
        if artifact.parent_state_root_hash != prev_state_root {
            return Err(Error::BrokenChain {
                index,
                reason: format!(
                    "parentStateRootHash {} does not match the preceding state root \
                     {prev_state_root}",
                    artifact.parent_state_root_hash
                ),
            });
        }
        if range.first <= prev_final_block {
            return Err(Error::BrokenChain {
                index,
                reason: format!(
                    "block range [{}, {}] does not come after block {prev_final_block}",
                    range.first, range.last
                ),
            });
        }

        prev_shnarf = artifact.expected_shnarf;
        prev_final_block = range.last;
        prev_state_root = artifact.final_state_root_hash;
    }

    Ok(())
}
