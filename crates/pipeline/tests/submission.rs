//! End to end submission tests against a local anvil node.
//!
//! These need the `anvil` binary on PATH and are ignored by default; run
//! them with `cargo test -p blobsub-pipeline -- --ignored`.

use alloy::{
    consensus::EnvKzgSettings,
    node_bindings::Anvil,
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use blobsub_eip4844::BlobCodec;
use blobsub_pipeline::{nonce::NonceAllocator, submitter::Submitter};

/// Find a free port on localhost.
fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

#[tokio::test]
#[ignore = "requires the anvil binary on PATH"]
async fn out_of_order_nonces_both_mine() {
    let anvil = Anvil::new().port(free_port()).spawn();
    let signer: PrivateKeySigner = anvil.keys()[0].clone().into();
    let account = signer.address();
    let destination = Address::repeat_byte(0xaa);

    let submitter = Submitter::new(&anvil.endpoint(), signer, destination, 1).unwrap();
    let mut nonces = NonceAllocator::new(submitter.pending_nonce().await.unwrap());

    let first = nonces.reserve();
    let second = nonces.reserve();

    // Broadcast the higher nonce first; it waits in the pool until the lower
    // one lands, so both mine regardless of broadcast order.
    let pending_second = submitter.broadcast_plain_call(Vec::new(), second).await.unwrap();
    let pending_first = submitter.broadcast_plain_call(Vec::new(), first).await.unwrap();

    let receipt_first = submitter.confirm(pending_first).await.unwrap();
    let receipt_second = submitter.confirm(pending_second).await.unwrap();
    assert!(receipt_first.status());
    assert!(receipt_second.status());

    let provider = ProviderBuilder::new().on_http(anvil.endpoint().parse().unwrap());
    let count = provider.get_transaction_count(account).await.unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
#[ignore = "requires the anvil binary on PATH"]
async fn blob_transaction_carries_the_sidecar() {
    let anvil = Anvil::new().port(free_port()).spawn();
    let signer: PrivateKeySigner = anvil.keys()[0].clone().into();
    let destination = Address::repeat_byte(0xbb);

    let submitter = Submitter::new(&anvil.endpoint(), signer, destination, 1).unwrap();
    let mut nonces = NonceAllocator::new(submitter.pending_nonce().await.unwrap());

    let codec = BlobCodec::new(EnvKzgSettings::default());
    let committed = codec.commit_payload(b"compressed conflation bytes").unwrap();
    let sidecar = blobsub_eip4844::sidecar(vec![committed]);

    let pending =
        submitter.broadcast_blob_call(Vec::new(), sidecar, nonces.reserve()).await.unwrap();
    let receipt = submitter.confirm(pending).await.unwrap();

    assert!(receipt.status());
    assert!(receipt.blob_gas_used.is_some());
}
