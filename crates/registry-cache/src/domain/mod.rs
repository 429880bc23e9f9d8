//! # Domain Layer
//!
//! Member records, events, mutations, filters and the population gate.

pub mod errors;
pub mod events;
pub mod filter;
pub mod member;
pub mod mutation;
pub mod population;
pub mod value_objects;

pub use errors::{ErrorKind, RegistryCacheError};
pub use events::{names, DecodedEvent, MemberLookup, RegistryEvent};
pub use filter::{Condition, MemberFilter, IDENTITY_FIELDS};
pub use member::{AttributeKey, AttributeValue, KeyEntry, KeyList, MemberRecord};
pub use mutation::{apply_mutation, MemberMutation};
pub use population::{PopulationState, PopulationStateGate};
pub use value_objects::{
    BatchOutcome, CommitOutcome, DeployedContract, EthPublicKey, ProcessedEvent,
    ProductAvailability, RsaPublicKey, TickOutcome,
};
