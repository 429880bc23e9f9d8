//! # Signer Clients
//!
//! HTTP clients for the two key services the backfill checks against:
//! the blockchain signer (Ethereum key) and the signer (RSA messaging key).

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::domain::{EthPublicKey, RegistryCacheError, RsaPublicKey};
use crate::ports::{EthKeySigner, RsaKeySigner};

/// Path of the Ethereum public key endpoint.
pub const ETH_PUBLIC_KEY_PATH: &str = "/v0/key-manage/eth/public-key";
/// Path of the RSA public key endpoint.
pub const RSA_PUBLIC_KEY_PATH: &str = "/v0/key-manage/rsa/public-key";

/// GET-only JSON client bound to one service base URL.
pub struct HttpSignerClient {
    client: Client,
    base_url: String,
}

impl HttpSignerClient {
    /// Client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryCacheError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryCacheError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RegistryCacheError> {
        let url = self.url(path);
        debug!(url = %url, "Fetching signer key");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RegistryCacheError::KeyVerification(format!("GET {}: {}", url, e)))?;
        response
            .json()
            .await
            .map_err(|e| RegistryCacheError::KeyVerification(format!("GET {}: {}", url, e)))
    }
}

#[async_trait]
impl EthKeySigner for HttpSignerClient {
    async fn get_eth_key(&self) -> Result<EthPublicKey, RegistryCacheError> {
        self.get_json(ETH_PUBLIC_KEY_PATH).await
    }
}

#[async_trait]
impl RsaKeySigner for HttpSignerClient {
    async fn get_rsa_key(&self) -> Result<RsaPublicKey, RegistryCacheError> {
        self.get_json(RSA_PUBLIC_KEY_PATH).await
    }
}
