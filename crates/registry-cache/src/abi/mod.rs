//! # Contract ABI
//!
//! Enough of the Solidity ABI to decode registry and resolver logs:
//! static types, `string` and `bytes`.

pub mod catalog;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod registry_events;
pub mod types;
pub mod value;

pub use catalog::EventCatalog;
pub use decoder::{decode_log, decode_params};
pub use encoder::encode_params;
pub use errors::AbiError;
pub use registry_events::to_registry_event;
pub use types::{parse_abi_events, EventDefinition, EventParam, ParamType};
pub use value::AbiValue;
