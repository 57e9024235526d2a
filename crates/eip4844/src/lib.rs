//! Blob construction and KZG commitment helpers for eip4844 data submission.
//!
//! ref: https://github.com/ethereum/consensus-specs/blob/86fb82b221474cc89387fa6436806507b3849d88/specs/deneb/polynomial-commitments.md

use alloy::{
    consensus::EnvKzgSettings,
    eips::eip4844::{kzg_to_versioned_hash, Blob, BlobTransactionSidecar, Bytes48, BYTES_PER_BLOB},
    primitives::B256,
};
use std::{path::Path, sync::Arc};

/// Errors for this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// payload does not fit into a single blob
    #[error("payload of {0} bytes exceeds the {} byte blob capacity", BYTES_PER_BLOB)]
    PayloadTooLarge(usize),
    /// error loading a trusted setup file
    #[error("error loading trusted setup: {0}")]
    TrustedSetup(c_kzg::Error),
    /// error generating a commitment to a blob
    #[error("error generating blob commitment: {0}")]
    CommitmentGen(c_kzg::Error),
    /// error generating a kzg proof for a blob
    #[error("error generating blob proof: {0}")]
    ProofGen(c_kzg::Error),
    /// kzg blobs error
    #[error("kzg blobs: {0}")]
    Kzg(#[from] c_kzg::Error),
}

/// Copy `raw` into a zero initialized blob buffer.
///
/// The result is always exactly [`BYTES_PER_BLOB`] bytes; input shorter than
/// one blob is right padded with zeros. Input larger than one blob is an
/// error since the chain would reject the transaction anyway.
pub fn pad_blob(raw: &[u8]) -> Result<Blob, Error> {
    if raw.len() > BYTES_PER_BLOB {
        return Err(Error::PayloadTooLarge(raw.len()));
    }

    // Create a 0 filled array of the exact length
    let mut padded = [0u8; BYTES_PER_BLOB];
    // and memcopy the payload to the front, leaving the back zero padded.
    padded[..raw.len()].copy_from_slice(raw);

    Ok(Blob::from(padded))
}

/// A blob with its commitment and proof.
#[derive(Clone)]
pub struct CommittedBlob {
    blob: Blob,
    commitment: Bytes48,
    proof: Bytes48,
}

impl std::fmt::Debug for CommittedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommittedBlob")
            .field("commitment", &self.commitment)
            .field("proof", &self.proof)
            .finish_non_exhaustive()
    }
}

impl CommittedBlob {
    /// The padded blob contents.
    pub const fn blob(&self) -> &Blob {
        &self.blob
    }

    /// The 48 byte KZG commitment over the blob polynomial.
    pub const fn commitment(&self) -> &Bytes48 {
        &self.commitment
    }

    /// The 48 byte KZG opening proof for the blob against its commitment.
    pub const fn proof(&self) -> &Bytes48 {
        &self.proof
    }

    /// The versioned hash referenced on chain in place of the commitment.
    pub fn versioned_hash(&self) -> B256 {
        kzg_to_versioned_hash(self.commitment.as_slice())
    }
}

/// Blob commitment and proof generation.
///
/// The trusted setup is an explicit handle threaded through every call rather
/// than process global state, so tests and multi-setup deployments can hold
/// several codecs at once.
#[derive(Debug, Clone)]
pub struct BlobCodec {
    kzg_settings: EnvKzgSettings,
}

impl BlobCodec {
    /// Create a new instance of [`Self`] over the given settings handle.
    pub const fn new(kzg_settings: EnvKzgSettings) -> Self {
        Self { kzg_settings }
    }

    /// Load the trusted setup from a file in the standard text format.
    pub fn from_trusted_setup_file(path: &Path) -> Result<Self, Error> {
        let settings =
            c_kzg::KzgSettings::load_trusted_setup_file(path).map_err(Error::TrustedSetup)?;
        Ok(Self { kzg_settings: EnvKzgSettings::Custom(Arc::new(settings)) })
    }

    /// Compute the KZG commitment over a blob polynomial.
    pub fn commit(&self, blob: &Blob) -> Result<Bytes48, Error> {
        let blob = c_kzg::Blob::from_bytes(blob.as_slice())?;
        let commitment =
            c_kzg::KzgCommitment::blob_to_kzg_commitment(&blob, self.kzg_settings.get())
                .map_err(Error::CommitmentGen)?;
        Ok(Bytes48::from(commitment.to_bytes().into_inner()))
    }

    /// Compute the KZG opening proof for a blob against its commitment.
    pub fn prove(&self, blob: &Blob, commitment: &Bytes48) -> Result<Bytes48, Error> {
        let blob = c_kzg::Blob::from_bytes(blob.as_slice())?;
        let commitment = c_kzg::Bytes48::from_bytes(commitment.as_slice())?;
        let proof =
            c_kzg::KzgProof::compute_blob_kzg_proof(&blob, &commitment, self.kzg_settings.get())
                .map_err(Error::ProofGen)?;
        Ok(Bytes48::from(proof.to_bytes().into_inner()))
    }

    /// Pad `raw` into a blob and compute its commitment and proof.
    ///
    /// Note that proof generation is not cheap and this blocks until it is
    /// done, so call it from a blocking-friendly context.
    pub fn commit_payload(&self, raw: &[u8]) -> Result<CommittedBlob, Error> {
        let blob = pad_blob(raw)?;
        let commitment = self.commit(&blob)?;
        let proof = self.prove(&blob, &commitment)?;
        Ok(CommittedBlob { blob, commitment, proof })
    }
}

/// Map each commitment to its 32 byte versioned hash.
///
/// The first byte of every hash is the KZG version tag, the remainder is the
/// truncated sha256 of the commitment.
pub fn commitments_to_versioned_hashes(commitments: &[Bytes48]) -> Vec<B256> {
    commitments.iter().map(|c| kzg_to_versioned_hash(c.as_slice())).collect()
}

/// Assemble the out-of-band sidecar carried by a type-3 transaction.
pub fn sidecar(blobs: Vec<CommittedBlob>) -> BlobTransactionSidecar {
    let mut contents = Vec::with_capacity(blobs.len());
    let mut commitments = Vec::with_capacity(blobs.len());
    let mut proofs = Vec::with_capacity(blobs.len());
    for blob in blobs {
        contents.push(blob.blob);
        commitments.push(blob.commitment);
        proofs.push(blob.proof);
    }
    BlobTransactionSidecar::new(contents, commitments, proofs)
}

#[cfg(test)]
mod test {
    use super::{commitments_to_versioned_hashes, pad_blob, sidecar, BlobCodec, Error};
    use alloy::{
        consensus::EnvKzgSettings,
        eips::eip4844::{BYTES_PER_BLOB, VERSIONED_HASH_VERSION_KZG},
    };
    use c_kzg::{BYTES_PER_FIELD_ELEMENT, FIELD_ELEMENTS_PER_BLOB};

    fn codec() -> BlobCodec {
        BlobCodec::new(EnvKzgSettings::default())
    }

    #[test]
    fn check_understanding() {
        assert_eq!(FIELD_ELEMENTS_PER_BLOB, 4096);
        assert_eq!(BYTES_PER_FIELD_ELEMENT, 32);
        assert_eq!(FIELD_ELEMENTS_PER_BLOB * BYTES_PER_FIELD_ELEMENT, BYTES_PER_BLOB);
    }

    #[test]
    fn pad_fills_to_exact_blob_size() {
        let blob = pad_blob(b"hello").unwrap();
        assert_eq!(blob.len(), BYTES_PER_BLOB);
        assert_eq!(&blob[..5], b"hello");
        assert!(blob[5..].iter().all(|b| *b == 0));

        let empty = pad_blob(&[]).unwrap();
        assert_eq!(empty.len(), BYTES_PER_BLOB);
        assert!(empty.iter().all(|b| *b == 0));

        let exact = pad_blob(&[0xau8; BYTES_PER_BLOB]).unwrap();
        assert_eq!(&exact[..], &[0xau8; BYTES_PER_BLOB][..]);
    }

    #[test]
    fn pad_rejects_oversized_payload() {
        let raw = vec![1u8; BYTES_PER_BLOB + 1];
        let err = pad_blob(&raw).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(n) if n == BYTES_PER_BLOB + 1));
    }

    #[test]
    fn commitment_is_deterministic() {
        let codec = codec();
        let blob = pad_blob(b"some conflated rollup data").unwrap();

        let first = codec.commit(&blob).unwrap();
        let second = codec.commit(&blob).unwrap();
        assert_eq!(first, second);

        let other = pad_blob(b"different rollup data").unwrap();
        assert_ne!(codec.commit(&other).unwrap(), first);
    }

    #[test]
    fn proof_verifies_against_commitment() {
        let codec = codec();
        let committed = codec.commit_payload(b"payload under proof").unwrap();

        let blob = c_kzg::Blob::from_bytes(committed.blob().as_slice()).unwrap();
        let commitment = c_kzg::Bytes48::from_bytes(committed.commitment().as_slice()).unwrap();
        let proof = c_kzg::Bytes48::from_bytes(committed.proof().as_slice()).unwrap();
        let ok = c_kzg::KzgProof::verify_blob_kzg_proof(
            &blob,
            &commitment,
            &proof,
            EnvKzgSettings::default().get(),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn versioned_hashes_carry_the_kzg_version_tag() {
        let codec = codec();
        let committed = codec.commit_payload(b"hash me").unwrap();

        let hashes = commitments_to_versioned_hashes(&[*committed.commitment()]);
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0][0], VERSIONED_HASH_VERSION_KZG);
        assert_eq!(hashes[0], committed.versioned_hash());
    }

    #[test]
    fn sidecar_keeps_columns_aligned() {
        let codec = codec();
        let blobs = vec![
            codec.commit_payload(b"chunk one").unwrap(),
            codec.commit_payload(b"chunk two").unwrap(),
        ];
        let commitments: Vec<_> = blobs.iter().map(|b| *b.commitment()).collect();

        let sidecar = sidecar(blobs);
        assert_eq!(sidecar.blobs.len(), 2);
        assert_eq!(sidecar.commitments, commitments);
        assert_eq!(sidecar.proofs.len(), 2);
    }
}
