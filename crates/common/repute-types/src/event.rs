use crate::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notifications emitted by the registry, one per register or update step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    UserRegistered {
        address: Address,
        initial_score: u64,
    },
    ReputationUpdated {
        address: Address,
        old_score: u64,
        new_score: u64,
        actor: Address,
    },
}

impl RegistryEvent {
    /// Short label used for metrics and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::UserRegistered { .. } => "user_registered",
            RegistryEvent::ReputationUpdated { .. } => "reputation_updated",
        }
    }

    /// The address whose record the event describes.
    pub fn subject(&self) -> &Address {
        match self {
            RegistryEvent::UserRegistered { address, .. } => address,
            RegistryEvent::ReputationUpdated { address, .. } => address,
        }
    }
}

/// An event as stored in the registry log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Position in the log, starting at zero.
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: RegistryEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_keyed_by_variant() {
        let event = RegistryEvent::ReputationUpdated {
            address: Address::from_low_u64(1),
            old_score: 500,
            new_score: 800,
            actor: Address::from_low_u64(2),
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["ReputationUpdated"]["new_score"], 800);
        assert_eq!(
            value["ReputationUpdated"]["actor"],
            "0x0000000000000000000000000000000000000002"
        );
        assert_eq!(event.kind(), "reputation_updated");
        assert_eq!(event.subject(), &Address::from_low_u64(1));
    }

    #[test]
    fn envelope_survives_bincode() {
        let envelope = EventEnvelope {
            seq: 3,
            recorded_at: Utc::now(),
            event: RegistryEvent::UserRegistered {
                address: Address::from_low_u64(9),
                initial_score: 500,
            },
        };
        let bytes = bincode::serialize(&envelope).unwrap();
        let back: EventEnvelope = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, envelope);
    }
}
