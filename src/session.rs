use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::api::Envelope;
use crate::config::{AccountEntry, ApiConfig, Endpoints};
use crate::error::ApiError;

/// Correlation id header attached to every outbound attempt.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request timeout on the underlying transport. The retry layer treats
/// this the same as any other network failure.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One wallet-controlled account. Loaded once at startup, immutable for the
/// run's lifetime.
#[derive(Clone)]
pub struct Account {
    pub signer: PrivateKeySigner,
    pub address: Address,
    pub proxy: Option<String>,
}

impl Account {
    pub fn from_entry(entry: &AccountEntry) -> Result<Self> {
        let signer: PrivateKeySigner =
            entry.private_key.trim().parse().context("invalid private key")?;
        let address = signer.address();
        Ok(Self {
            signer,
            address,
            proxy: entry.proxy.clone(),
        })
    }

    /// Lowercased 0x address. Used as the identity key in the cooldown store.
    pub fn identity(&self) -> String {
        self.address.to_string().to_lowercase()
    }

    /// Short display label: the last 6 hex chars of the address.
    pub fn label(&self) -> String {
        let identity = self.identity();
        identity[identity.len().saturating_sub(6)..].to_string()
    }

    /// EIP-191 signature over the raw nonce string, 0x-prefixed hex.
    pub async fn sign_nonce(&self, nonce: &str) -> Result<String, ApiError> {
        let signature = self
            .signer
            .sign_message(nonce.as_bytes())
            .await
            .map_err(|e| ApiError::Auth(format!("signing failed: {e}")))?;
        Ok(alloy::hex::encode_prefixed(signature.as_bytes()))
    }
}

/// Authenticated HTTP session for one account's cycle. Created per account
/// per cycle and discarded at cycle end; the bearer token is replaced in
/// place whenever re-authentication succeeds.
pub struct Session {
    pub account: Account,
    pub(crate) token: Option<String>,
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct NonceData {
    nonce: String,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

impl Session {
    pub fn new(account: &Account, api: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            account: account.clone(),
            token: None,
            http: build_client(account.proxy.as_deref())?,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            endpoints: api.endpoints.clone(),
        })
    }

    /// Rebuild the proxy-bound transport after a network-class failure.
    pub fn reset_transport(&mut self) -> Result<(), ApiError> {
        debug!("[{}] rebuilding transport", self.account.label());
        self.http = build_client(self.account.proxy.as_deref())?;
        Ok(())
    }

    /// Sign-in handshake: fetch a single-use nonce, sign it with the wallet
    /// key, and exchange the signature for a bearer token.
    ///
    /// A non-zero application code at either step fails with the server's
    /// message. There is no retry here — the request executor owns that.
    pub async fn authenticate(&mut self) -> Result<(), ApiError> {
        let nonce = self.fetch_nonce().await?;
        let signature = self.account.sign_nonce(&nonce).await?;
        let token = self.exchange_token(&nonce, &signature).await?;
        self.token = Some(token);
        Ok(())
    }

    async fn fetch_nonce(&self) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, self.endpoints.nonce);
        let response = self
            .http
            .get(&url)
            .query(&[("address", self.account.identity())])
            .header(REQUEST_ID_HEADER, new_correlation_id())
            .send()
            .await
            .map_err(|e| ApiError::Auth(format!("nonce request failed: {e}")))?;
        let envelope: Envelope<NonceData> = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("nonce response malformed: {e}")))?;
        if !envelope.is_success() {
            return Err(ApiError::Auth(envelope.message));
        }
        envelope
            .data
            .map(|d| d.nonce)
            .ok_or_else(|| ApiError::Auth("nonce missing from response".to_string()))
    }

    async fn exchange_token(&self, nonce: &str, signature: &str) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, self.endpoints.auth);
        let body = serde_json::json!({
            "address": self.account.identity(),
            "signature": signature,
            "nonce": nonce,
        });
        let response = self
            .http
            .post(&url)
            .header(REQUEST_ID_HEADER, new_correlation_id())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Auth(format!("login request failed: {e}")))?;
        let envelope: Envelope<TokenData> = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("login response malformed: {e}")))?;
        if !envelope.is_success() {
            return Err(ApiError::Auth(envelope.message));
        }
        envelope
            .data
            .map(|d| d.token)
            .ok_or_else(|| ApiError::Auth("token missing from response".to_string()))
    }
}

/// Fresh correlation id for one outbound attempt. Never reused across
/// attempts, including re-auth reissues.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn build_client(proxy: Option<&str>) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
    if let Some(url) = proxy {
        let proxy = reqwest::Proxy::all(url)
            .map_err(|e| ApiError::Network(format!("invalid proxy {url}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountEntry;

    // Well-known dev key (anvil account #0)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn test_account() -> Account {
        Account::from_entry(&AccountEntry {
            private_key: TEST_KEY.to_string(),
            proxy: None,
        })
        .expect("valid test key")
    }

    #[test]
    fn identity_is_lowercased_address() {
        let account = test_account();
        assert_eq!(account.identity(), TEST_ADDRESS);
    }

    #[test]
    fn label_is_address_tail() {
        let account = test_account();
        assert_eq!(account.label(), "b92266");
    }

    #[test]
    fn key_without_prefix_parses() {
        let account = Account::from_entry(&AccountEntry {
            private_key: TEST_KEY.trim_start_matches("0x").to_string(),
            proxy: None,
        })
        .expect("unprefixed key");
        assert_eq!(account.identity(), TEST_ADDRESS);
    }

    #[test]
    fn bad_key_is_rejected() {
        let result = Account::from_entry(&AccountEntry {
            private_key: "not-a-key".to_string(),
            proxy: None,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn nonce_signature_is_prefixed_hex() {
        let account = test_account();
        let signature = account.sign_nonce("challenge-123").await.unwrap();
        // 0x prefix + 65 bytes as hex
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 65 * 2);
        // Deterministic for the same nonce and key
        assert_eq!(signature, account.sign_nonce("challenge-123").await.unwrap());
    }

    #[test]
    fn correlation_ids_are_distinct() {
        let a = new_correlation_id();
        let b = new_correlation_id();
        assert_ne!(a, b);
    }
}
