use crate::error::RegistryError;
use crate::metrics::record_store_error;
use crate::state::{RegistrySnapshot, RegistryState};
use crate::store::RegistryStore;
use async_trait::async_trait;
use repute_types::EventEnvelope;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::future::Future;
use tracing::{error, warn};

const STATE_TREE_NAME: &str = "registry_state";
const EVENTS_TREE_NAME: &str = "registry_events";
const SNAPSHOT_KEY: &[u8] = b"snapshot";

type EncodedEvent = ([u8; 8], Vec<u8>);

/// Events are keyed by big-endian sequence number so tree order is log order.
fn event_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

/// A RegistryStore backed by a Sled database.
///
/// The snapshot lives under a single key in `registry_state`; each event is
/// its own entry in `registry_events`. A commit writes both trees in one
/// transaction.
#[derive(Clone)] // sled::Db is Arc internally
pub struct SledRegistryStore {
    db: Db,
}

impl SledRegistryStore {
    /// Opens or creates a Sled database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            RegistryError::Storage(format!(
                "failed to open sled database at {}: {}",
                path.display(),
                e
            ))
        })?;
        let store = Self { db };
        store.trees()?;
        Ok(store)
    }

    fn open_tree(&self, name: &str) -> Result<Tree, RegistryError> {
        self.db.open_tree(name).map_err(|e| {
            record_store_error("sled", "open_tree");
            error!(tree = name, error = %e, "Failed to open registry tree");
            RegistryError::Storage(format!("failed to open {} tree: {}", name, e))
        })
    }

    fn trees(&self) -> Result<(Tree, Tree), RegistryError> {
        Ok((
            self.open_tree(STATE_TREE_NAME)?,
            self.open_tree(EVENTS_TREE_NAME)?,
        ))
    }

    async fn flush(&self) -> Result<(), RegistryError> {
        self.db.flush_async().await.map(|_| ()).map_err(|e| {
            record_store_error("sled", "flush");
            error!(error = %e, "Failed to flush registry commit");
            RegistryError::Storage(format!("commit flush failed: {}", e))
        })
    }

    /// Writes the commit, then awaits `flush`. If flushing fails the trees are
    /// put back to what they held before, so the failed commit is never loaded.
    async fn commit_with<F>(
        &self,
        snapshot: &RegistrySnapshot,
        events: &[EventEnvelope],
        flush: F,
    ) -> Result<(), RegistryError>
    where
        F: Future<Output = Result<(), RegistryError>>,
    {
        let (state_tree, event_tree) = self.trees()?;
        let snapshot_bytes = bincode::serialize(snapshot).map_err(|e| {
            record_store_error("sled", "encode");
            error!(error = %e, "Failed to encode registry snapshot");
            RegistryError::Codec(format!("snapshot encode failed: {}", e))
        })?;
        let encoded_events = events
            .iter()
            .map(|envelope| {
                bincode::serialize(envelope)
                    .map(|bytes| (event_key(envelope.seq), bytes))
                    .map_err(|e| {
                        record_store_error("sled", "encode");
                        error!(seq = envelope.seq, error = %e, "Failed to encode registry event");
                        RegistryError::Codec(format!("event encode failed: {}", e))
                    })
            })
            .collect::<Result<Vec<EncodedEvent>, RegistryError>>()?;

        let previous = (&state_tree, &event_tree)
            .transaction(|(state_tx, event_tx)| {
                let previous = state_tx.insert(SNAPSHOT_KEY, snapshot_bytes.as_slice())?;
                for (key, value) in &encoded_events {
                    event_tx.insert(&key[..], value.as_slice())?;
                }
                Ok::<_, ConflictableTransactionError<RegistryError>>(previous)
            })
            .map_err(|e: TransactionError<RegistryError>| {
                record_store_error("sled", "commit");
                error!(error = %e, "Failed to write registry commit");
                RegistryError::Storage(format!("commit write failed: {}", e))
            })?;

        if let Err(e) = flush.await {
            self.revert(&state_tree, &event_tree, previous, &encoded_events);
            return Err(e);
        }
        Ok(())
    }

    fn revert(
        &self,
        state_tree: &Tree,
        event_tree: &Tree,
        previous: Option<IVec>,
        written: &[EncodedEvent],
    ) {
        let reverted = (state_tree, event_tree).transaction(|(state_tx, event_tx)| {
            match &previous {
                Some(bytes) => {
                    state_tx.insert(SNAPSHOT_KEY, bytes.clone())?;
                }
                None => {
                    state_tx.remove(SNAPSHOT_KEY)?;
                }
            }
            for (key, _) in written {
                event_tx.remove(&key[..])?;
            }
            Ok::<_, ConflictableTransactionError<RegistryError>>(())
        });

        match reverted {
            Ok(()) => warn!(events = written.len(), "Reverted unflushed registry commit"),
            Err(e) => {
                record_store_error("sled", "revert");
                error!(error = %e, "Failed to revert unflushed registry commit");
            }
        }
    }

    fn load_events(&self, event_tree: &Tree) -> Result<Vec<EventEnvelope>, RegistryError> {
        let mut events = Vec::with_capacity(event_tree.len());
        for item in event_tree.iter() {
            let (_, bytes) = item.map_err(|e| {
                record_store_error("sled", "get");
                error!(error = %e, "Failed to read registry event");
                RegistryError::Storage(format!("event read failed: {}", e))
            })?;
            let envelope = bincode::deserialize::<EventEnvelope>(&bytes).map_err(|e| {
                record_store_error("sled", "decode");
                error!(error = %e, "Failed to decode registry event");
                RegistryError::Codec(format!("event decode failed: {}", e))
            })?;
            if envelope.seq != events.len() as u64 {
                record_store_error("sled", "decode");
                return Err(RegistryError::Codec(format!(
                    "event log gap: expected seq {}, found {}",
                    events.len(),
                    envelope.seq
                )));
            }
            events.push(envelope);
        }
        Ok(events)
    }
}

#[async_trait]
impl RegistryStore for SledRegistryStore {
    async fn load(&self) -> Result<Option<RegistryState>, RegistryError> {
        let (state_tree, event_tree) = self.trees()?;
        let bytes = match state_tree.get(SNAPSHOT_KEY) {
            Ok(Some(ivec)) => ivec,
            Ok(None) => return Ok(None),
            Err(e) => {
                record_store_error("sled", "get");
                error!(error = %e, "Failed to read registry snapshot");
                return Err(RegistryError::Storage(format!("snapshot read failed: {}", e)));
            }
        };

        let snapshot = bincode::deserialize::<RegistrySnapshot>(&bytes).map_err(|e| {
            record_store_error("sled", "decode");
            error!(error = %e, "Failed to decode registry snapshot");
            RegistryError::Codec(format!("snapshot decode failed: {}", e))
        })?;
        let events = self.load_events(&event_tree)?;
        Ok(Some(RegistryState::from_parts(snapshot, events)))
    }

    async fn commit(
        &self,
        snapshot: &RegistrySnapshot,
        events: &[EventEnvelope],
    ) -> Result<(), RegistryError> {
        self.commit_with(snapshot, events, self.flush()).await
    }
}
