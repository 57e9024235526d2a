//! Ordered driver walking data chunks, the optional message send, and the
//! finalization call.

use crate::{
    journal::{Entry, Journal, Status, Step},
    nonce::NonceAllocator,
    submitter::{self, Submitter},
};
use alloy::primitives::{Address, B256, U256};
use blobsub_abi as abi;
use blobsub_artifacts::{
    self as artifacts, AggregationArtifact, BlockRange, ConflationArtifact, ParentSubmissionData,
    SubmissionData,
};
use blobsub_eip4844::{BlobCodec, CommittedBlob};
use tracing::info;

/// Errors for this module.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// artifact ingestion or validation error
    #[error(transparent)]
    Artifacts(#[from] artifacts::Error),
    /// blob codec error
    #[error(transparent)]
    Codec(#[from] blobsub_eip4844::Error),
    /// transaction build or broadcast error
    #[error(transparent)]
    Submit(#[from] submitter::Error),
    /// journal error
    #[error(transparent)]
    Journal(#[from] crate::journal::Error),
    /// the run was started with nothing to submit
    #[error("no conflation artifacts were given")]
    NoChunks,
}

/// How chunks are mapped onto transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// One blob transaction per chunk, submitted in order.
    PerBlob,
    /// All chunks batched into a single multi-blob transaction.
    Combined,
}

/// The auxiliary message sent between chunk submission and finalization.
#[derive(Debug, Clone)]
pub struct MessageSend {
    /// Message recipient on the other layer.
    pub to: Address,
    /// Fee in wei attached to the message.
    pub fee: U256,
    /// Message calldata.
    pub calldata: Vec<u8>,
}

/// One chunk staged for submission. Staging happens for every chunk before
/// the first broadcast so encoding failures cannot leave a partial
/// submission behind.
#[derive(Debug)]
struct StagedChunk {
    submission: SubmissionData,
    claim: U256,
    committed: CommittedBlob,
    prev_shnarf: B256,
    expected_shnarf: B256,
}

/// Drives one full submission run.
#[derive(Debug)]
pub struct Pipeline {
    submitter: Submitter,
    codec: BlobCodec,
    journal: Journal,
    mode: Mode,
}

impl Pipeline {
    /// Create a new instance of [`Self`].
    pub const fn new(submitter: Submitter, codec: BlobCodec, journal: Journal, mode: Mode) -> Self {
        Self { submitter, codec, journal, mode }
    }

    /// Run the ordered sequence: data chunks, then the optional message
    /// send, then finalization. Steps already confirmed in the journal are
    /// skipped, which is what makes a rerun after a crash a resume.
    pub async fn run(
        &mut self,
        parent: ParentSubmissionData,
        chunks: Vec<(ConflationArtifact, BlockRange)>,
        aggregation: AggregationArtifact,
        message: Option<MessageSend>,
        validate: bool,
    ) -> Result<(), Error> {
        if chunks.is_empty() {
            return Err(Error::NoChunks);
        }
        if validate {
            artifacts::validate_chain(&parent, &chunks)?;
        }

        let staged = self.stage(&chunks)?;
        let mut nonces = NonceAllocator::new(self.submitter.pending_nonce().await?);
        info!(
            chunks = staged.len(),
            first_nonce = nonces.peek(),
            mode = ?self.mode,
            "starting submission run"
        );

        match self.mode {
            Mode::PerBlob => {
                for (index, chunk) in staged.iter().enumerate() {
                    self.submit_chunk(index, chunk, &mut nonces).await?;
                }
            }
            Mode::Combined => self.submit_combined(&staged, parent.shnarf, &mut nonces).await?,
        }

        if let Some(message) = message {
            self.send_message(&message, &mut nonces).await?;
        }

        // The chunk list is non-empty, checked above.
        let (last_artifact, _) = chunks.last().expect("chunks is non-empty");
        let last_block = staged.last().expect("chunks is non-empty").submission.final_block_in_data;
        self.finalize(&parent, last_artifact, last_block, &aggregation, &mut nonces).await?;

        info!("submission run complete");
        Ok(())
    }

    /// Pad, commit and prove every chunk's payload up front.
    fn stage(
        &self,
        chunks: &[(ConflationArtifact, BlockRange)],
    ) -> Result<Vec<StagedChunk>, Error> {
        let mut staged = Vec::with_capacity(chunks.len());
        for (artifact, range) in chunks {
            let payload = artifact.payload()?;
            let committed = self.codec.commit_payload(&payload)?;
            staged.push(StagedChunk {
                submission: artifact.submission_data(Some((range.first, range.last)))?,
                claim: artifact.data_evaluation_claim(),
                committed,
                prev_shnarf: artifact.prev_shnarf,
                expected_shnarf: artifact.expected_shnarf,
            });
        }
        Ok(staged)
    }

    async fn submit_chunk(
        &mut self,
        index: usize,
        chunk: &StagedChunk,
        nonces: &mut NonceAllocator,
    ) -> Result<(), Error> {
        let step = Step::Chunk(index);
        if self.journal.is_confirmed(step) {
            info!(index, "chunk already confirmed, skipping");
            return Ok(());
        }

        let entry = abi::BlobSubmission {
            submission: &chunk.submission,
            data_evaluation_claim: chunk.claim,
            kzg_commitment: chunk.committed.commitment().as_slice(),
            kzg_proof: chunk.committed.proof().as_slice(),
        };
        let calldata = abi::encode_blob_submission(&[entry], chunk.prev_shnarf, chunk.expected_shnarf);
        let sidecar = blobsub_eip4844::sidecar(vec![chunk.committed.clone()]);

        let nonce = nonces.reserve();
        info!(
            index,
            nonce,
            first_block = chunk.submission.first_block_in_data,
            final_block = chunk.submission.final_block_in_data,
            "submitting data chunk"
        );
        self.submit_step(step, calldata, Some(sidecar), nonce).await
    }

    async fn submit_combined(
        &mut self,
        staged: &[StagedChunk],
        parent_shnarf: B256,
        nonces: &mut NonceAllocator,
    ) -> Result<(), Error> {
        // The whole batch is one step: chunk 0 confirming means the combined
        // transaction landed.
        let step = Step::Chunk(0);
        if self.journal.is_confirmed(step) {
            info!("combined submission already confirmed, skipping");
            return Ok(());
        }

        let entries: Vec<_> = staged
            .iter()
            .map(|chunk| abi::BlobSubmission {
                submission: &chunk.submission,
                data_evaluation_claim: chunk.claim,
                kzg_commitment: chunk.committed.commitment().as_slice(),
                kzg_proof: chunk.committed.proof().as_slice(),
            })
            .collect();
        let final_shnarf = staged.last().expect("chunks is non-empty").expected_shnarf;
        let calldata = abi::encode_blob_submission(&entries, parent_shnarf, final_shnarf);
        let sidecar =
            blobsub_eip4844::sidecar(staged.iter().map(|c| c.committed.clone()).collect());

        let nonce = nonces.reserve();
        info!(chunks = staged.len(), nonce, "submitting combined data batch");
        self.submit_step(step, calldata, Some(sidecar), nonce).await
    }

    async fn send_message(
        &mut self,
        message: &MessageSend,
        nonces: &mut NonceAllocator,
    ) -> Result<(), Error> {
        let step = Step::Message;
        if self.journal.is_confirmed(step) {
            info!("message send already confirmed, skipping");
            return Ok(());
        }

        let calldata = abi::encode_send_message(message.to, message.fee, &message.calldata);
        let nonce = nonces.reserve();
        info!(nonce, to = ?message.to, "sending auxiliary message");
        self.submit_step(step, calldata, None, nonce).await
    }

    async fn finalize(
        &mut self,
        parent: &ParentSubmissionData,
        last_artifact: &ConflationArtifact,
        final_block_number: u64,
        aggregation: &AggregationArtifact,
        nonces: &mut NonceAllocator,
    ) -> Result<(), Error> {
        let step = Step::Finalize;
        if self.journal.is_confirmed(step) {
            info!("finalization already confirmed, skipping");
            return Ok(());
        }

        let finalization = abi::Finalization {
            aggregated_proof: &aggregation.aggregated_proof,
            parent_state_root_hash: aggregation.parent_state_root_hash,
            starting_shnarf: parent.shnarf,
            final_block_number,
            shnarf_data: last_artifact.shnarf_data(),
            last_finalized_timestamp: aggregation.parent_aggregation_last_block_timestamp,
            final_timestamp: aggregation.final_timestamp,
            l1_rolling_hash: aggregation.l1_rolling_hash,
            l1_rolling_hash_message_number: aggregation.l1_rolling_hash_message_number,
            l2_merkle_trees_depth: aggregation.l2_merkle_trees_depth,
            l2_merkle_roots: &aggregation.l2_merkle_roots,
            l2_messaging_blocks_offsets: &aggregation.l2_messaging_blocks_offsets,
        };
        let calldata = abi::encode_finalization(&finalization);

        let nonce = nonces.reserve();
        info!(nonce, final_block_number, "submitting aggregated proof");
        self.submit_step(step, calldata, None, nonce).await
    }

    async fn submit_step(
        &mut self,
        step: Step,
        calldata: Vec<u8>,
        sidecar: Option<alloy::eips::eip4844::BlobTransactionSidecar>,
        nonce: u64,
    ) -> Result<(), Error> {
        let pending = match sidecar {
            Some(sidecar) => self.submitter.broadcast_blob_call(calldata, sidecar, nonce).await?,
            None => self.submitter.broadcast_plain_call(calldata, nonce).await?,
        };

        let tx_hash = *pending.tx_hash();
        self.journal.record(&Entry { step, nonce, tx_hash, status: Status::Broadcast })?;

        self.submitter.confirm(pending).await?;
        self.journal.record(&Entry { step, nonce, tx_hash, status: Status::Confirmed })?;
        Ok(())
    }
}
