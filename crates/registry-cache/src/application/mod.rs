//! # Application Layer
//!
//! Services orchestrating the domain and the outbound ports: the events
//! processor, the backfill coordinator, the live consumer and the relay.

mod periodic;

pub mod cache_event_service;
pub mod events_processor;
pub mod key_verification;
pub mod population_service;
pub mod relay;

pub use cache_event_service::CacheEventService;
pub use events_processor::EventsProcessor;
pub use key_verification::NodeKeyVerifier;
pub use population_service::{backfill_ranges, RegistryCachePopulationService};
pub use relay::BlockchainEventRelay;
