//! Transaction construction and broadcast against the rollup contract.

use alloy::{
    eips::eip4844::BlobTransactionSidecar,
    network::{Ethereum, EthereumWallet, TransactionBuilder, TransactionBuilder4844},
    primitives::Address,
    providers::{PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::http::reqwest,
};
use tracing::{error, info};

type RecommendedFiller = alloy::providers::fillers::JoinFill<
    alloy::providers::Identity,
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::GasFiller,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::BlobGasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::NonceFiller,
                alloy::providers::fillers::ChainIdFiller,
            >,
        >,
    >,
>;

type SubmitterProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        RecommendedFiller,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    alloy::providers::RootProvider<Ethereum>,
    Ethereum,
>;

/// A transaction that was handed to the network but not yet confirmed.
pub type PendingSubmission = PendingTransactionBuilder<Ethereum>;

/// Errors for this module.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// failed to parse the given http rpc url
    #[error("failed to parse rpc url")]
    RpcUrlParse,
    /// rpc transport error
    #[error(transparent)]
    Rpc(#[from] alloy::transports::RpcError<alloy::transports::TransportErrorKind>),
    /// error while broadcasting a tx
    #[error("error while broadcasting tx: {0}")]
    TxBroadcast(alloy::transports::RpcError<alloy::transports::TransportErrorKind>),
    /// error while waiting for tx inclusion
    #[error("error while waiting for tx inclusion: {0}")]
    TxInclusion(#[from] alloy::providers::PendingTransactionError),
}

/// Builds and broadcasts the pipeline's transactions.
///
/// Fee fields are quoted fresh from the network at build time; there is no
/// retry or backoff on a stale quote, a rejected transaction aborts the run.
/// Nonces always come from the caller so several transactions can be queued
/// before the first receipt arrives.
#[derive(Debug)]
pub struct Submitter {
    provider: SubmitterProvider,
    account: Address,
    destination: Address,
    confirmations: u64,
}

impl Submitter {
    /// Connect a submitter signing with `signer` and targeting `destination`.
    pub fn new(
        rpc_url: &str,
        signer: PrivateKeySigner,
        destination: Address,
        confirmations: u64,
    ) -> Result<Self, Error> {
        let url: reqwest::Url = rpc_url.parse().map_err(|_| Error::RpcUrlParse)?;
        info!("🧾 submitter sending transactions to rpc url {url}");

        let account = signer.address();
        let wallet = EthereumWallet::new(signer);
        let provider =
            ProviderBuilder::new().wallet(wallet).on_http(url);

        Ok(Self { provider, account, destination, confirmations })
    }

    /// The signing account's current pending transaction count, used to seed
    /// the nonce allocator once per run.
    pub async fn pending_nonce(&self) -> Result<u64, Error> {
        self.provider.get_transaction_count(self.account).pending().await.map_err(Into::into)
    }

    /// Broadcast a type-3 envelope carrying `sidecar` out-of-band.
    pub async fn broadcast_blob_call(
        &self,
        calldata: Vec<u8>,
        sidecar: BlobTransactionSidecar,
        nonce: u64,
    ) -> Result<PendingSubmission, Error> {
        let fees = self.provider.estimate_eip1559_fees(None).await?;
        let blob_fee = self.provider.get_blob_base_fee().await?;

        let tx = TransactionRequest::default()
            .with_to(self.destination)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas)
            .with_max_fee_per_blob_gas(blob_fee)
            .with_blob_sidecar(sidecar);

        self.broadcast(tx, nonce).await
    }

    /// Broadcast a plain eip1559 envelope.
    pub async fn broadcast_plain_call(
        &self,
        calldata: Vec<u8>,
        nonce: u64,
    ) -> Result<PendingSubmission, Error> {
        let fees = self.provider.estimate_eip1559_fees(None).await?;

        let tx = TransactionRequest::default()
            .with_to(self.destination)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        self.broadcast(tx, nonce).await
    }

    async fn broadcast(
        &self,
        tx: TransactionRequest,
        nonce: u64,
    ) -> Result<PendingSubmission, Error> {
        let pending = self.provider.send_transaction(tx).await.map_err(|error| {
            error!(?error, nonce, "tx broadcast failure");
            Error::TxBroadcast(error)
        })?;

        info!(tx_hash = ?pending.tx_hash(), nonce, "tx broadcast");
        Ok(pending)
    }

    /// Wait until `pending` has the required confirmations.
    pub async fn confirm(&self, pending: PendingSubmission) -> Result<TransactionReceipt, Error> {
        let tx_hash = *pending.tx_hash();
        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .get_receipt()
            .await
            .map_err(|error| {
                error!(?error, ?tx_hash, "tx inclusion failed");
                Error::TxInclusion(error)
            })?;

        info!(
            receipt.transaction_index,
            receipt.block_number,
            ?receipt.block_hash,
            ?receipt.transaction_hash,
            "tx included"
        );
        Ok(receipt)
    }
}
