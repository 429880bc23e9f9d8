//! # Node Key Verification
//!
//! After a backfill the node checks that the keys its signers hold are the
//! ones the registry publishes for its company. Checks run in order and
//! stop at the first failure:
//!
//! 1. fetch the Ethereum key from the blockchain signer;
//! 2. find the member whose `staticId` is the configured company;
//! 3. match the signer address against `ethPubKeys[].address`;
//! 4. fetch the RSA key from the messaging signer;
//! 5. match its modulus against the `n` of `komgoMessagingPubKeys[].key`.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use shared_crypto::addresses_equal;

use crate::domain::{AttributeKey, KeyList, MemberFilter, MemberRecord, RegistryCacheError};
use crate::ports::{CacheStore, EthKeySigner, RsaKeySigner};

#[derive(Deserialize)]
struct PublishedRsaKey {
    n: String,
}

/// Checks the node's signer keys against the registry.
pub struct NodeKeyVerifier {
    store: Arc<dyn CacheStore>,
    eth_signer: Arc<dyn EthKeySigner>,
    rsa_signer: Arc<dyn RsaKeySigner>,
    company_static_id: String,
}

impl NodeKeyVerifier {
    /// Create a verifier for `company_static_id`.
    pub fn new(
        store: Arc<dyn CacheStore>,
        eth_signer: Arc<dyn EthKeySigner>,
        rsa_signer: Arc<dyn RsaKeySigner>,
        company_static_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            eth_signer,
            rsa_signer,
            company_static_id: company_static_id.into(),
        }
    }

    /// `Ok(true)` when both keys match the registry; signer and store
    /// errors are returned as errors.
    pub async fn verify(&self) -> Result<bool, RegistryCacheError> {
        let eth_key = self.eth_signer.get_eth_key().await?;

        let Some(member) = self.find_company().await? else {
            warn!(static_id = %self.company_static_id, "Company not found in registry");
            return Ok(false);
        };

        if !eth_address_published(&member, &eth_key.address) {
            warn!(
                static_id = %self.company_static_id,
                address = %eth_key.address,
                "Signer Ethereum address not published in registry"
            );
            return Ok(false);
        }

        let rsa_key = self.rsa_signer.get_rsa_key().await?;
        if !rsa_modulus_published(&member, &rsa_key.n) {
            warn!(
                static_id = %self.company_static_id,
                "Signer RSA key not published in registry"
            );
            return Ok(false);
        }

        info!(static_id = %self.company_static_id, "Node keys verified");
        Ok(true)
    }

    async fn find_company(&self) -> Result<Option<MemberRecord>, RegistryCacheError> {
        let filter = MemberFilter::attribute_eq(
            AttributeKey::StaticId,
            self.company_static_id.clone(),
        );
        Ok(self.store.get_members(&filter).await?.into_iter().next())
    }
}

fn eth_address_published(member: &MemberRecord, address: &str) -> bool {
    member
        .keys(KeyList::EthPubKeys)
        .iter()
        .filter_map(|entry| entry.address.as_deref())
        .filter(|published| !published.is_empty())
        .any(|published| addresses_equal(published, address))
}

fn rsa_modulus_published(member: &MemberRecord, modulus: &str) -> bool {
    member
        .keys(KeyList::KomgoMessagingPubKeys)
        .iter()
        .filter(|entry| !entry.key.is_empty())
        .filter_map(|entry| match serde_json::from_str::<PublishedRsaKey>(&entry.key) {
            Ok(key) => Some(key.n),
            Err(e) => {
                warn!(error = %e, "Unparseable messaging key in registry");
                None
            }
        })
        .any(|n| n == modulus)
}
