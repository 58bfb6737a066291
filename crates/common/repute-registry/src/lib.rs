#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod sled_store;
pub mod state;
pub mod store;

pub use bootstrap::{run_bootstrap, BootstrapReport};
pub use config::{RegistryConfig, SeedRating};
pub use error::RegistryError;
pub use registry::{EventSink, ReputationRegistry, TracingEventSink};
pub use sled_store::SledRegistryStore;
pub use state::{running_average, RegistrySnapshot, RegistryState};
pub use store::{InMemoryRegistryStore, RegistryStore};

pub use repute_types::{
    Address, EventEnvelope, RatingPreset, RecordView, RegistryEvent, ReputationConstants,
    ReputationRecord, INITIAL_REPUTATION, MAX_REPUTATION, MIN_REPUTATION,
};
