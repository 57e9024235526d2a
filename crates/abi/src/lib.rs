//! Calldata construction for the rollup contract entry points.
//!
//! The deployed contract is an external collaborator with a frozen ABI, so
//! the entry points are pinned as literal 4 byte selectors rather than
//! recomputed from signature strings. A selector that drifts from the
//! deployed contract shows up as a silent on-chain revert, never as a client
//! side error.

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolType,
};
use blobsub_artifacts::{ShnarfData, SubmissionData};

/// Selector of the blob-carrying data submission entry point.
pub const SUBMIT_BLOBS_SELECTOR: [u8; 4] = [0x42, 0xfb, 0xe8, 0x42];

/// Selector of the proof-carrying finalization entry point.
pub const FINALIZE_WITH_PROOF_SELECTOR: [u8; 4] = [0xab, 0xff, 0xac, 0x32];

/// Selector of the canonical message send entry point.
pub const SEND_MESSAGE_SELECTOR: [u8; 4] = [0x9f, 0x3c, 0xe5, 0x5a];

/// The blob submission parameter list.
///
/// tuple((FinalStateRoot,FirstBlock,FinalBlock,SnarkHash),EvaluationClaim,Commitment,Proof)[]
/// followed by the shnarf before the first chunk and the expected shnarf
/// after the last.
pub type SubmitBlobsParams = alloy::sol! {
    tuple(tuple(tuple(bytes32,uint256,uint256,bytes32),uint256,bytes,bytes)[],bytes32,bytes32)
};

/// The finalization parameter list.
///
/// tuple(AggregatedProof,ProofIndex,FinalizationData) where the finalization
/// data is (ParentStateRoot,StartingShnarf,FinalBlockNumber,ShnarfData,
/// LastFinalizedTimestamp,FinalTimestamp,Placeholder,L1RollingHash,
/// L1MessageNumber,L2TreeDepth,L2MerkleRoots,L2MessagingBlocksOffsets).
pub type FinalizeParams = alloy::sol! {
    tuple(bytes,uint256,tuple(bytes32,bytes32,uint256,tuple(bytes32,bytes32,bytes32,bytes32,bytes32),uint256,uint256,bytes32,bytes32,uint256,uint256,bytes32[],bytes))
};

/// The message send parameter list: tuple(To,Fee,Calldata).
pub type SendMessageParams = alloy::sol! {
    tuple(address,uint256,bytes)
};

/// One chunk of a blob submission call.
#[derive(Debug, Clone)]
pub struct BlobSubmission<'a> {
    /// The on-chain submission fields of this chunk.
    pub submission: &'a SubmissionData,
    /// Evaluation of the blob polynomial at the challenge point.
    pub data_evaluation_claim: U256,
    /// 48 byte KZG commitment over the chunk's blob.
    pub kzg_commitment: &'a [u8],
    /// 48 byte KZG opening proof for the chunk's blob.
    pub kzg_proof: &'a [u8],
}

/// Params for the finalization call.
#[derive(Debug, Clone)]
pub struct Finalization<'a> {
    /// The aggregated validity proof.
    pub aggregated_proof: &'a [u8],
    /// State root the batch finalizes on top of.
    pub parent_state_root_hash: B256,
    /// Shnarf of the last previously finalized submission.
    pub starting_shnarf: B256,
    /// Final L2 block number covered by the batch.
    pub final_block_number: u64,
    /// Shnarf recomputation inputs of the batch's last chunk.
    pub shnarf_data: ShnarfData,
    /// Timestamp of the last block of the previous aggregation.
    pub last_finalized_timestamp: u64,
    /// Timestamp of the last block of this aggregation.
    pub final_timestamp: u64,
    /// Rolling hash of L1 to L2 messages anchored by the batch.
    pub l1_rolling_hash: B256,
    /// Message number matching the rolling hash.
    pub l1_rolling_hash_message_number: u64,
    /// Depth of the L2 message merkle trees.
    pub l2_merkle_trees_depth: u64,
    /// Merkle roots of L2 to L1 messages.
    pub l2_merkle_roots: &'a [B256],
    /// Packed offsets of L2 blocks carrying messages.
    pub l2_messaging_blocks_offsets: &'a [u8],
}

/// Returns the selector-prefixed calldata submitting `entries` in one call.
///
/// `parent_shnarf` anchors the call to the chain state before the first
/// chunk; `final_shnarf` is the shnarf the contract must arrive at after the
/// last chunk.
pub fn encode_blob_submission(
    entries: &[BlobSubmission<'_>],
    parent_shnarf: B256,
    final_shnarf: B256,
) -> Vec<u8> {
    let entries: Vec<_> = entries
        .iter()
        .map(|entry| {
            (
                (
                    entry.submission.final_state_root_hash,
                    U256::from(entry.submission.first_block_in_data),
                    U256::from(entry.submission.final_block_in_data),
                    entry.submission.snark_hash,
                ),
                entry.data_evaluation_claim,
                entry.kzg_commitment.to_vec(),
                entry.kzg_proof.to_vec(),
            )
        })
        .collect();

    let mut calldata = SUBMIT_BLOBS_SELECTOR.to_vec();
    calldata.extend(SubmitBlobsParams::abi_encode_params(&(entries, parent_shnarf, final_shnarf)));
    calldata
}

/// Returns the selector-prefixed calldata finalizing a batch with its
/// aggregated proof.
///
/// The proof index parameter is reserved and always encoded as zero.
pub fn encode_finalization(finalization: &Finalization<'_>) -> Vec<u8> {
    let shnarf = &finalization.shnarf_data;
    let params = (
        finalization.aggregated_proof.to_vec(),
        U256::ZERO,
        (
            finalization.parent_state_root_hash,
            finalization.starting_shnarf,
            U256::from(finalization.final_block_number),
            (
                shnarf.prev_shnarf,
                shnarf.snark_hash,
                shnarf.final_state_root_hash,
                shnarf.expected_x,
                shnarf.expected_y,
            ),
            U256::from(finalization.last_finalized_timestamp),
            U256::from(finalization.final_timestamp),
            B256::ZERO,
            finalization.l1_rolling_hash,
            U256::from(finalization.l1_rolling_hash_message_number),
            U256::from(finalization.l2_merkle_trees_depth),
            finalization.l2_merkle_roots.to_vec(),
            finalization.l2_messaging_blocks_offsets.to_vec(),
        ),
    );

    let mut calldata = FINALIZE_WITH_PROOF_SELECTOR.to_vec();
    calldata.extend(FinalizeParams::abi_encode_params(&params));
    calldata
}

/// Returns the selector-prefixed calldata for the auxiliary message send.
pub fn encode_send_message(to: Address, fee: U256, message: &[u8]) -> Vec<u8> {
    let mut calldata = SEND_MESSAGE_SELECTOR.to_vec();
    calldata.extend(SendMessageParams::abi_encode_params(&(to, fee, message.to_vec())));
    calldata
}

#[cfg(test)]
mod test {
    use super::{
        encode_blob_submission, encode_finalization, encode_send_message, BlobSubmission,
        Finalization, FinalizeParams, SendMessageParams, SubmitBlobsParams,
        FINALIZE_WITH_PROOF_SELECTOR, SEND_MESSAGE_SELECTOR, SUBMIT_BLOBS_SELECTOR,
    };
    use alloy::{
        primitives::{address, b256, B256, U256},
        sol_types::SolType,
    };
    use blobsub_artifacts::{ShnarfData, SubmissionData};

    fn submission_data() -> SubmissionData {
        SubmissionData {
            parent_state_root_hash: b256!(
                "0101010101010101010101010101010101010101010101010101010101010101"
            ),
            data_parent_hash: B256::ZERO,
            final_state_root_hash: b256!(
                "0202020202020202020202020202020202020202020202020202020202020202"
            ),
            first_block_in_data: 1,
            final_block_in_data: 46,
            snark_hash: b256!("0303030303030303030303030303030303030303030303030303030303030303"),
        }
    }

    #[test]
    fn blob_submission_round_trips() {
        let submission = submission_data();
        let commitment = [0xc0u8; 48];
        let proof = [0xf0u8; 48];
        let entry = BlobSubmission {
            submission: &submission,
            data_evaluation_claim: U256::from(7),
            kzg_commitment: &commitment,
            kzg_proof: &proof,
        };
        let parent_shnarf = B256::repeat_byte(0x0a);
        let final_shnarf = B256::repeat_byte(0x0b);

        let calldata = encode_blob_submission(&[entry], parent_shnarf, final_shnarf);
        assert_eq!(&calldata[..4], &SUBMIT_BLOBS_SELECTOR);

        let (entries, decoded_parent, decoded_final) =
            SubmitBlobsParams::abi_decode_params(&calldata[4..], true).unwrap();
        assert_eq!(decoded_parent, parent_shnarf);
        assert_eq!(decoded_final, final_shnarf);
        assert_eq!(entries.len(), 1);

        let ((final_root, first_block, final_block, snark_hash), claim, commitment_out, proof_out) =
            entries.into_iter().next().unwrap();
        assert_eq!(final_root, submission.final_state_root_hash);
        assert_eq!(first_block, U256::from(1));
        assert_eq!(final_block, U256::from(46));
        assert_eq!(snark_hash, submission.snark_hash);
        assert_eq!(claim, U256::from(7));
        assert_eq!(commitment_out.as_ref(), &commitment);
        assert_eq!(proof_out.as_ref(), &proof);
    }

    #[test]
    fn finalization_round_trips() {
        let shnarf_data = ShnarfData {
            prev_shnarf: B256::repeat_byte(0x11),
            snark_hash: B256::repeat_byte(0x22),
            final_state_root_hash: B256::repeat_byte(0x33),
            expected_x: B256::repeat_byte(0x44),
            expected_y: B256::repeat_byte(0x55),
        };
        let merkle_roots = [B256::repeat_byte(0x66), B256::repeat_byte(0x77)];
        let finalization = Finalization {
            aggregated_proof: b"aggregated proof bytes",
            parent_state_root_hash: B256::repeat_byte(0x01),
            starting_shnarf: B256::repeat_byte(0x0a),
            final_block_number: 90,
            shnarf_data,
            last_finalized_timestamp: 1_000,
            final_timestamp: 2_000,
            l1_rolling_hash: B256::repeat_byte(0x88),
            l1_rolling_hash_message_number: 12,
            l2_merkle_trees_depth: 5,
            l2_merkle_roots: &merkle_roots,
            l2_messaging_blocks_offsets: &[0, 1, 0, 2],
        };

        let calldata = encode_finalization(&finalization);
        assert_eq!(&calldata[..4], &FINALIZE_WITH_PROOF_SELECTOR);

        let (proof, index, data) = FinalizeParams::abi_decode_params(&calldata[4..], true).unwrap();
        assert_eq!(proof.as_ref(), b"aggregated proof bytes");
        assert_eq!(index, U256::ZERO);

        let (
            parent_root,
            starting_shnarf,
            final_block,
            shnarf,
            last_finalized_ts,
            final_ts,
            placeholder,
            l1_rolling_hash,
            l1_message_number,
            tree_depth,
            roots,
            offsets,
        ) = data;
        assert_eq!(parent_root, finalization.parent_state_root_hash);
        assert_eq!(starting_shnarf, finalization.starting_shnarf);
        assert_eq!(final_block, U256::from(90));
        assert_eq!(shnarf.0, shnarf_data.prev_shnarf);
        assert_eq!(shnarf.4, shnarf_data.expected_y);
        assert_eq!(last_finalized_ts, U256::from(1_000));
        assert_eq!(final_ts, U256::from(2_000));
        assert_eq!(placeholder, B256::ZERO);
        assert_eq!(l1_rolling_hash, finalization.l1_rolling_hash);
        assert_eq!(l1_message_number, U256::from(12));
        assert_eq!(tree_depth, U256::from(5));
        assert_eq!(roots, merkle_roots.to_vec());
        assert_eq!(offsets.as_ref(), &[0, 1, 0, 2]);
    }

    #[test]
    fn send_message_round_trips() {
        let to = address!("00000000000000000000000000000000000000aa");
        let calldata = encode_send_message(to, U256::from(3), b"ping");
        assert_eq!(&calldata[..4], &SEND_MESSAGE_SELECTOR);

        let (decoded_to, fee, message) =
            SendMessageParams::abi_decode_params(&calldata[4..], true).unwrap();
        assert_eq!(decoded_to, to);
        assert_eq!(fee, U256::from(3));
        assert_eq!(message.as_ref(), b"ping");
    }
}
