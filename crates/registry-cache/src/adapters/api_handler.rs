//! # Operator API Handler
//!
//! Transport-independent controller behind the operator HTTP routes. The
//! node binary maps routes onto these methods and renders errors with
//! [`ErrorResponse`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use shared_types::EventPosition;

use crate::domain::{
    AttributeKey, BatchOutcome, MemberFilter, MemberRecord, PopulationState, PopulationStateGate,
    ProductAvailability, RegistryCacheError,
};
use crate::ports::{CacheStore, EventsProcessorApi, ManagedService};

/// Error body returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Stable error code (`EBLK01`, `EVAL01`, ...).
    pub error_code: String,
    /// Human readable message.
    pub message: String,
    /// Per-field validation details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
}

impl ErrorResponse {
    /// HTTP status for `err`.
    pub fn status_code(err: &RegistryCacheError) -> u16 {
        err.kind().status_code()
    }
}

impl From<&RegistryCacheError> for ErrorResponse {
    fn from(err: &RegistryCacheError) -> Self {
        let fields = match err {
            RegistryCacheError::InvalidFilter { fields, .. } => fields.clone(),
            _ => None,
        };
        Self {
            error_code: err.kind().error_code().to_string(),
            message: err.to_string(),
            fields,
        }
    }
}

/// Block range requested by `POST /v0/registry/cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateRequest {
    /// First block.
    pub from_block: u64,
    /// Last block.
    pub to_block: u64,
}

/// Registry cache controller.
pub struct RegistryCacheController {
    processor: Arc<dyn EventsProcessorApi>,
    store: Arc<dyn CacheStore>,
    live: Arc<dyn ManagedService>,
    gate: Arc<PopulationStateGate>,
}

impl RegistryCacheController {
    /// Create the controller.
    pub fn new(
        processor: Arc<dyn EventsProcessorApi>,
        store: Arc<dyn CacheStore>,
        live: Arc<dyn ManagedService>,
        gate: Arc<PopulationStateGate>,
    ) -> Self {
        Self {
            processor,
            store,
            live,
            gate,
        }
    }

    /// Process one block range. When the range reaches the chain head the
    /// read gate opens and the live consumer starts.
    pub async fn populate(
        &self,
        request: PopulateRequest,
    ) -> Result<BatchOutcome, RegistryCacheError> {
        if request.from_block > request.to_block {
            return Err(RegistryCacheError::EventValidation(format!(
                "fromBlock {} is after toBlock {}",
                request.from_block, request.to_block
            )));
        }
        let outcome = self
            .processor
            .process_events_batch(request.from_block, request.to_block)
            .await?;
        if outcome.service_started {
            self.gate.set(PopulationState::Complete);
            self.live.start().await?;
        }
        Ok(outcome)
    }

    /// Stop live consumption, drop every member and the watermark, and close
    /// the read gate.
    pub async fn clear(&self) -> Result<(), RegistryCacheError> {
        self.live.stop().await?;
        self.store.clear_all().await?;
        self.gate.set(PopulationState::Initialised);
        info!("Registry cache cleared by operator");
        Ok(())
    }

    /// Start the live consumer.
    pub async fn start_cache_event_service(&self) -> Result<(), RegistryCacheError> {
        self.live.start().await
    }

    /// Members matching the JSON filter. Fails while the cache is not
    /// populated and when nothing matches.
    pub async fn get_members(
        &self,
        companies_filter: Option<&str>,
    ) -> Result<Vec<MemberRecord>, RegistryCacheError> {
        self.gate.ensure_complete()?;
        let filter = MemberFilter::parse(companies_filter.unwrap_or_default())?;
        let members = self.store.get_members(&filter).await?;
        if members.is_empty() {
            return Err(RegistryCacheError::member_not_found());
        }
        Ok(members)
    }

    /// Position of the last applied event.
    pub async fn last_processed_event(&self) -> Result<EventPosition, RegistryCacheError> {
        self.store.last_event_processed().await?.ok_or_else(|| {
            RegistryCacheError::ContentNotFound("No event has been processed yet".to_string())
        })
    }

    /// Products the company subscribes to; empty when it has none.
    pub async fn get_products(&self, static_id: &str) -> Result<Vec<Value>, RegistryCacheError> {
        self.gate.ensure_complete()?;
        let member = self.find_company(static_id).await?;
        Ok(match member
            .attribute(AttributeKey::KomgoProducts)
            .map(|value| value.to_json())
        {
            Some(Value::Array(products)) => products,
            _ => Vec::new(),
        })
    }

    /// Whether the company subscribes to `product_id`.
    pub async fn get_product_availability(
        &self,
        static_id: &str,
        product_id: &str,
    ) -> Result<ProductAvailability, RegistryCacheError> {
        let products = self.get_products(static_id).await?;
        let is_available = products.iter().any(|product| match product {
            Value::Object(fields) => {
                fields.get("productId").and_then(Value::as_str) == Some(product_id)
            }
            Value::String(id) => id == product_id,
            _ => false,
        });
        Ok(ProductAvailability { is_available })
    }

    async fn find_company(&self, static_id: &str) -> Result<MemberRecord, RegistryCacheError> {
        let filter = MemberFilter::attribute_eq(AttributeKey::StaticId, static_id);
        self.store
            .get_members(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(RegistryCacheError::member_not_found)
    }
}
