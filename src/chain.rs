use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolValue;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{ChainError, looks_like_revert};

/// Hard timeout on gas estimation.
const ESTIMATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard timeout on broadcasting the signed transaction.
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard timeout on waiting for the receipt.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Gas limit used when estimation times out.
const GAS_FALLBACK_TIMEOUT: u64 = 300_000;

/// Gas limit used when estimation fails for any non-revert reason.
const GAS_FALLBACK_ERROR: u64 = 200_000;

/// Retry budget per submission.
const MAX_ATTEMPTS: u32 = 3;

/// Pause between retry attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Proof submission selectors, taken from the deployed contract. The contract
/// is unverified, so the raw selector is ground truth — no ABI name
/// resolution.
pub const SUBMIT_REQUEST_SELECTOR: [u8; 4] = [0x7c, 0x1e, 0x45, 0xa0];
pub const SUBMIT_AGENT_SELECTOR: [u8; 4] = [0xb3, 0x5a, 0x9e, 0x21];

/// One proof submission: a 4-byte selector plus ABI-encoded parameters.
#[derive(Debug, Clone)]
pub struct ProofCall {
    pub selector: [u8; 4],
    pub params: Bytes,
}

impl ProofCall {
    /// Proof that the request with `id` and `title` was created today.
    pub fn request_proof(id: u64, title: &str) -> Self {
        Self {
            selector: SUBMIT_REQUEST_SELECTOR,
            params: (U256::from(id), title.to_string())
                .abi_encode_params()
                .into(),
        }
    }

    /// Proof that the agent with `id` and `name` was created today.
    pub fn agent_proof(id: u64, name: &str) -> Self {
        Self {
            selector: SUBMIT_AGENT_SELECTOR,
            params: (U256::from(id), name.to_string())
                .abi_encode_params()
                .into(),
        }
    }

    /// Calldata: selector first, encoded parameters after.
    pub fn calldata(&self) -> Bytes {
        let mut data = Vec::with_capacity(4 + self.params.len());
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&self.params);
        data.into()
    }
}

/// Submits proof transactions with a bounded retry budget and independent
/// hard timeouts on estimation, broadcast, and confirmation. Each timeout
/// races the RPC call against a timer and discards the loser — the
/// transport's own timeout is not trusted.
pub struct ChainSubmitter {
    rpc_url: Url,
    contract: Address,
    signer: PrivateKeySigner,
}

impl ChainSubmitter {
    pub fn new(rpc_url: Url, contract: Address, signer: PrivateKeySigner) -> Self {
        Self {
            rpc_url,
            contract,
            signer,
        }
    }

    /// Submit one proof call. Reverts — simulated or confirmed — are terminal
    /// for this submission; network failures and timeouts retry with a fresh
    /// gas estimate.
    pub async fn submit(&self, call: &ProofCall) -> Result<(), ChainError> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());

        let mut last_err = ChainError::Transport("no attempt made".to_string());
        for attempt in 1..=MAX_ATTEMPTS {
            match self.submit_once(&provider, call).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_terminal() => return Err(err),
                Err(err) => {
                    warn!(
                        "Proof submission attempt {attempt}/{MAX_ATTEMPTS} failed: {err}"
                    );
                    last_err = err;
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        Err(last_err)
    }

    async fn submit_once<P: Provider>(
        &self,
        provider: &P,
        call: &ProofCall,
    ) -> Result<(), ChainError> {
        let tx = TransactionRequest::default()
            .with_to(self.contract)
            .with_input(call.calldata());

        let gas_limit = self.estimate_gas(provider, &tx).await?;
        let tx = tx.with_gas_limit(gas_limit);

        let pending =
            match tokio::time::timeout(BROADCAST_TIMEOUT, provider.send_transaction(tx)).await {
                Err(_) => return Err(ChainError::Timeout("broadcast")),
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    if looks_like_revert(&msg) {
                        return Err(ChainError::SimulatedRevert);
                    }
                    return Err(ChainError::Transport(msg));
                }
                Ok(Ok(pending)) => pending,
            };

        let tx_hash = *pending.tx_hash();
        debug!("Broadcast {tx_hash}");

        let receipt = match tokio::time::timeout(CONFIRM_TIMEOUT, pending.get_receipt()).await {
            Err(_) => return Err(ChainError::Timeout("confirmation")),
            Ok(Err(e)) => return Err(ChainError::Transport(e.to_string())),
            Ok(Ok(receipt)) => receipt,
        };

        if !receipt.status() {
            return Err(ChainError::ConfirmedRevert);
        }
        info!(
            "Proof {tx_hash} confirmed in block {}",
            receipt.block_number.unwrap_or_default()
        );
        Ok(())
    }

    /// Gas estimation raced against `ESTIMATE_TIMEOUT`. A timeout or a
    /// non-revert failure falls back to a fixed limit so the submission still
    /// proceeds; a simulated revert aborts it.
    async fn estimate_gas<P: Provider>(
        &self,
        provider: &P,
        tx: &TransactionRequest,
    ) -> Result<u64, ChainError> {
        match tokio::time::timeout(ESTIMATE_TIMEOUT, provider.estimate_gas(tx.clone())).await {
            Err(_) => {
                warn!("Gas estimation timed out, using fallback limit {GAS_FALLBACK_TIMEOUT}");
                Ok(GAS_FALLBACK_TIMEOUT)
            }
            Ok(Err(e)) => {
                let msg = e.to_string();
                if looks_like_revert(&msg) {
                    return Err(ChainError::SimulatedRevert);
                }
                warn!("Gas estimation failed ({msg}), using fallback limit {GAS_FALLBACK_ERROR}");
                Ok(GAS_FALLBACK_ERROR)
            }
            Ok(Ok(estimate)) => Ok(with_headroom(estimate)),
        }
    }
}

/// Inflate a successful estimate by 20%.
fn with_headroom(estimate: u64) -> u64 {
    estimate + estimate / 5
}
