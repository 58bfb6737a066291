#![forbid(unsafe_code)]

pub mod address;
pub mod event;
pub mod record;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
pub use event::{EventEnvelope, RegistryEvent};
pub use record::{
    RatingPreset, RecordView, ReputationConstants, ReputationRecord, INITIAL_REPUTATION,
    MAX_REPUTATION, MIN_REPUTATION,
};
