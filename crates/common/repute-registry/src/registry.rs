use crate::error::RegistryError;
use crate::metrics;
use crate::state::{RegistrySnapshot, RegistryState};
use crate::store::RegistryStore;
use repute_types::{
    Address, EventEnvelope, RatingPreset, RecordView, ReputationConstants, ReputationRecord,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Receives every notification after the operation that produced it has committed.
pub trait EventSink: std::fmt::Debug + Send + Sync {
    fn on_event(&self, envelope: &EventEnvelope);
}

/// Writes each notification to the tracing log.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_event(&self, envelope: &EventEnvelope) {
        info!(
            seq = envelope.seq,
            kind = envelope.event.kind(),
            address = %envelope.event.subject(),
            "registry event: {:?}",
            envelope.event
        );
    }
}

/// Shared handle to a reputation registry.
///
/// A single mutex guards the whole state, and each operation, batches
/// included, holds it from start to finish. When a store is attached the new
/// snapshot and the operation's events are committed before the lock is
/// released; if committing fails the previous state is put back and the
/// error returned.
pub struct ReputationRegistry {
    state: Mutex<RegistryState>,
    store: Option<Arc<dyn RegistryStore>>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Default for ReputationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReputationRegistry {
    /// Creates an empty, purely in-memory registry.
    pub fn new() -> Self {
        Self::from_state(RegistryState::new())
    }

    pub fn from_state(state: RegistryState) -> Self {
        metrics::set_registered_users(state.total_users());
        Self {
            state: Mutex::new(state),
            store: None,
            sinks: Vec::new(),
        }
    }

    /// Opens a registry backed by `store`, restoring its last commit if present.
    pub async fn open(store: Arc<dyn RegistryStore>) -> Result<Self, RegistryError> {
        let state = match store.load().await? {
            Some(state) => {
                info!(
                    users = state.total_users(),
                    events = state.event_count(),
                    "Restored registry snapshot"
                );
                state
            }
            None => RegistryState::new(),
        };
        let mut registry = Self::from_state(state);
        registry.store = Some(store);
        Ok(registry)
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn constants(&self) -> ReputationConstants {
        ReputationConstants::default()
    }

    /// Registers `address` and returns its fresh record.
    pub async fn register(&self, address: &Address) -> Result<ReputationRecord, RegistryError> {
        self.apply("register", |state| {
            state.register(address);
            Ok(state.reputation_data(address))
        })
        .await
    }

    pub async fn register_self(
        &self,
        caller: &Address,
    ) -> Result<ReputationRecord, RegistryError> {
        self.register(caller).await
    }

    /// Registers each address in order and returns the registration sequence
    /// as it stands afterwards.
    pub async fn batch_register(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Address>, RegistryError> {
        self.apply("batch_register", |state| {
            state.batch_register(addresses);
            Ok(state.registered_users().to_vec())
        })
        .await
    }

    /// Submits a rating and returns the ratee's new score.
    pub async fn submit_rating(
        &self,
        caller: &Address,
        ratee: &Address,
        rating: u64,
    ) -> Result<u64, RegistryError> {
        self.apply("submit_rating", |state| {
            state.submit_rating(caller, ratee, rating)
        })
        .await
    }

    pub async fn submit_preset(
        &self,
        caller: &Address,
        ratee: &Address,
        preset: RatingPreset,
    ) -> Result<u64, RegistryError> {
        self.submit_rating(caller, ratee, preset.value()).await
    }

    pub async fn give_positive_rating(
        &self,
        caller: &Address,
        ratee: &Address,
    ) -> Result<u64, RegistryError> {
        self.submit_preset(caller, ratee, RatingPreset::Positive).await
    }

    pub async fn give_negative_rating(
        &self,
        caller: &Address,
        ratee: &Address,
    ) -> Result<u64, RegistryError> {
        self.submit_preset(caller, ratee, RatingPreset::Negative).await
    }

    pub async fn give_neutral_rating(
        &self,
        caller: &Address,
        ratee: &Address,
    ) -> Result<u64, RegistryError> {
        self.submit_preset(caller, ratee, RatingPreset::Neutral).await
    }

    /// Overwrites a score without touching the rating counter. Returns the
    /// record as this call left it.
    pub async fn set_reputation(
        &self,
        caller: &Address,
        address: &Address,
        score: u64,
    ) -> Result<ReputationRecord, RegistryError> {
        self.apply("set_reputation", |state| {
            state.set_reputation(caller, address, score);
            Ok(state.reputation_data(address))
        })
        .await
    }

    pub async fn reset_reputation(
        &self,
        caller: &Address,
        address: &Address,
    ) -> Result<ReputationRecord, RegistryError> {
        self.apply("reset_reputation", |state| {
            state.reset_reputation(caller, address);
            Ok(state.reputation_data(address))
        })
        .await
    }

    pub async fn lookup(&self, address: &Address) -> RecordView {
        self.state.lock().await.lookup(address)
    }

    pub async fn reputation(&self, address: &Address) -> u64 {
        self.state.lock().await.reputation(address)
    }

    pub async fn reputation_data(&self, address: &Address) -> ReputationRecord {
        self.state.lock().await.reputation_data(address)
    }

    pub async fn is_registered(&self, address: &Address) -> bool {
        self.state.lock().await.is_registered(address)
    }

    pub async fn registered_users(&self) -> Vec<Address> {
        self.state.lock().await.registered_users().to_vec()
    }

    pub async fn total_users(&self) -> usize {
        self.state.lock().await.total_users()
    }

    pub async fn batch_reputations(&self, addresses: &[Address]) -> Vec<u64> {
        self.state.lock().await.batch_reputations(addresses)
    }

    pub async fn events_since(&self, since: u64) -> Vec<EventEnvelope> {
        self.state.lock().await.events_since(since).to_vec()
    }

    /// Copy of the records and registration order, without the event log.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.state.lock().await.snapshot().clone()
    }

    async fn apply<T, F>(&self, operation: &'static str, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut RegistryState) -> Result<T, RegistryError>,
    {
        let mut state = self.state.lock().await;
        let backup = self.store.as_ref().map(|_| state.snapshot().clone());
        let first_new = state.event_count();

        let outcome = match f(&mut state) {
            Ok(value) => match &self.store {
                Some(store) => store
                    .commit(state.snapshot(), &state.events()[first_new..])
                    .await
                    .map(|_| value),
                None => Ok(value),
            },
            Err(e) => Err(e),
        };

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                if let Some(previous) = backup {
                    state.rollback(previous, first_new);
                }
                warn!(operation, error = %e, "Registry operation rolled back");
                metrics::record_operation(operation, false);
                return Err(e);
            }
        };

        metrics::record_operation(operation, true);
        metrics::set_registered_users(state.total_users());
        for envelope in &state.events()[first_new..] {
            metrics::record_event(envelope.event.kind());
            for sink in &self.sinks {
                sink.on_event(envelope);
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRegistryStore;
    use async_trait::async_trait;
    use repute_types::RegistryEvent;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        seen: StdMutex<Vec<RegistryEvent>>,
    }

    impl EventSink for RecordingSink {
        fn on_event(&self, envelope: &EventEnvelope) {
            self.seen.lock().unwrap().push(envelope.event);
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RegistryStore for FailingStore {
        async fn load(&self) -> Result<Option<RegistryState>, RegistryError> {
            Ok(None)
        }

        async fn commit(
            &self,
            _snapshot: &RegistrySnapshot,
            _events: &[EventEnvelope],
        ) -> Result<(), RegistryError> {
            Err(RegistryError::Storage("disk full".to_string()))
        }
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[tokio::test]
    async fn sinks_see_events_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let registry = ReputationRegistry::new().with_event_sink(sink.clone());
        let (rater, ratee) = (addr(1), addr(2));

        registry.give_positive_rating(&rater, &ratee).await.unwrap();

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], RegistryEvent::UserRegistered { address: ratee, initial_score: 500 });
        assert_eq!(seen[1], RegistryEvent::UserRegistered { address: rater, initial_score: 500 });
        assert_eq!(
            seen[2],
            RegistryEvent::ReputationUpdated {
                address: ratee,
                old_score: 500,
                new_score: 800,
                actor: rater,
            }
        );
    }

    #[tokio::test]
    async fn failed_save_rolls_back_everything() {
        let sink = Arc::new(RecordingSink::default());
        let registry = ReputationRegistry::open(Arc::new(FailingStore))
            .await
            .unwrap()
            .with_event_sink(sink.clone());

        let err = registry
            .batch_register(&[addr(1), addr(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));

        assert_eq!(registry.total_users().await, 0);
        assert!(!registry.is_registered(&addr(1)).await);
        assert!(registry.events_since(0).await.is_empty());
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_restores_previous_snapshot() {
        let store = Arc::new(InMemoryRegistryStore::new());
        {
            let registry = ReputationRegistry::open(store.clone()).await.unwrap();
            registry.set_reputation(&addr(9), &addr(1), 640).await.unwrap();
        }

        let registry = ReputationRegistry::open(store).await.unwrap();
        assert_eq!(registry.reputation(&addr(1)).await, 640);
        assert_eq!(registry.registered_users().await, vec![addr(1)]);
        assert_eq!(registry.events_since(0).await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_ratings_are_serialised() {
        let registry = Arc::new(ReputationRegistry::new());
        let ratee = addr(100);
        registry.register(&ratee).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32u64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.submit_rating(&addr(i), &ratee, 500).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = registry.reputation_data(&ratee).await;
        assert_eq!(record.total_ratings, 32);
        assert_eq!(record.score, 500);
    }

    #[tokio::test]
    async fn commits_stay_flat_as_history_grows() {
        let store = Arc::new(InMemoryRegistryStore::new());
        let registry = ReputationRegistry::open(store.clone()).await.unwrap();
        let (admin, a) = (addr(9), addr(1));

        let mut sizes = Vec::new();
        for round in 0..4u64 {
            for i in 0..250 {
                registry.set_reputation(&admin, &a, round * 250 + i).await.unwrap();
            }
            let snapshot = store.snapshot().await.unwrap();
            sizes.push(bincode::serialized_size(&snapshot).unwrap());
        }

        assert!(sizes.windows(2).all(|w| w[0] == w[1]), "{:?}", sizes);
        assert_eq!(store.event_count().await, 1001);
        assert_eq!(registry.total_users().await, 1);
    }

    #[tokio::test]
    async fn mutations_return_the_record_they_produced() {
        let registry = ReputationRegistry::new();
        let (admin, a) = (addr(9), addr(1));

        let record = registry.register(&a).await.unwrap();
        assert_eq!(record, ReputationRecord::registered());

        registry.submit_rating(&admin, &a, 100).await.unwrap();
        let record = registry.set_reputation(&admin, &a, 720).await.unwrap();
        assert_eq!((record.score, record.total_ratings), (720, 1));

        let record = registry.reset_reputation(&admin, &a).await.unwrap();
        assert_eq!(record, ReputationRecord::registered());

        let users = registry.batch_register(&[addr(2), a]).await.unwrap();
        assert_eq!(users, vec![a, admin, addr(2)]);
    }
}
