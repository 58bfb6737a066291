use crate::error::RegistryError;
use crate::state::{RegistrySnapshot, RegistryState};
use async_trait::async_trait;
use repute_types::EventEnvelope;
use tokio::sync::RwLock;

/// Persistence for the registry snapshot and its append-only event log.
#[async_trait]
pub trait RegistryStore: Send + Sync + 'static {
    /// Returns the last committed state, if any.
    async fn load(&self) -> Result<Option<RegistryState>, RegistryError>;

    /// Replaces the stored snapshot and appends `events` to the stored log.
    ///
    /// On error nothing from this call may remain visible to a later `load`.
    async fn commit(
        &self,
        snapshot: &RegistrySnapshot,
        events: &[EventEnvelope],
    ) -> Result<(), RegistryError>;
}

#[derive(Default)]
struct Stored {
    snapshot: Option<RegistrySnapshot>,
    events: Vec<EventEnvelope>,
}

/// Keeps the latest snapshot and the event log in memory. Used by tests and
/// ephemeral deployments.
#[derive(Default)]
pub struct InMemoryRegistryStore {
    inner: RwLock<Stored>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with an existing state.
    pub fn with_state(state: RegistryState) -> Self {
        Self {
            inner: RwLock::new(Stored {
                snapshot: Some(state.snapshot().clone()),
                events: state.events().to_vec(),
            }),
        }
    }

    /// The last committed snapshot.
    pub async fn snapshot(&self) -> Option<RegistrySnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn load(&self) -> Result<Option<RegistryState>, RegistryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshot
            .clone()
            .map(|snapshot| RegistryState::from_parts(snapshot, inner.events.clone())))
    }

    async fn commit(
        &self,
        snapshot: &RegistrySnapshot,
        events: &[EventEnvelope],
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        inner.snapshot = Some(snapshot.clone());
        inner.events.extend_from_slice(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repute_types::Address;

    #[tokio::test]
    async fn empty_store_loads_nothing() {
        let store = InMemoryRegistryStore::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_replaces_snapshot_and_appends_events() {
        let store = InMemoryRegistryStore::new();
        let mut state = RegistryState::new();
        state.register(&Address::from_low_u64(1));
        store.commit(state.snapshot(), state.events()).await.unwrap();

        let logged = state.event_count();
        state.register(&Address::from_low_u64(2));
        store
            .commit(state.snapshot(), &state.events()[logged..])
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.total_users(), 2);
        assert_eq!(loaded, state);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn seeded_store_loads_the_seed() {
        let mut state = RegistryState::new();
        state.submit_rating(&Address::from_low_u64(1), &Address::from_low_u64(2), 50).unwrap();

        let store = InMemoryRegistryStore::with_state(state.clone());
        assert_eq!(store.load().await.unwrap(), Some(state));
        assert_eq!(store.event_count().await, 3);
    }
}
