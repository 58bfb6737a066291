use crate::error::RegistryError;
use chrono::Utc;
use repute_types::{
    Address, EventEnvelope, RecordView, RegistryEvent, ReputationRecord, INITIAL_REPUTATION,
    MAX_REPUTATION,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Folds one more rating into a cumulative mean.
///
/// Returns `floor((score * count + rating) / (count + 1))`, computed in `u128`
/// so neither the product nor the divisor can overflow. `None` only if the
/// result does not fit in `u64`, which cannot happen for in-range inputs.
pub fn running_average(score: u64, count: u64, rating: u64) -> Option<u64> {
    let count = u128::from(count);
    let sum = u128::from(score)
        .checked_mul(count)?
        .checked_add(u128::from(rating))?;
    u64::try_from(sum / (count + 1)).ok()
}

/// The persisted part of the registry: records and registration order.
///
/// The event log is kept out of the snapshot so that saving stays
/// proportional to the number of participants, not to the history length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    records: HashMap<Address, ReputationRecord>,
    registered: Vec<Address>,
}

impl RegistrySnapshot {
    pub fn registered_users(&self) -> &[Address] {
        &self.registered
    }
}

/// The complete registry state: the snapshot plus the event log.
///
/// All mutation goes through the methods here. Callers are expected to hold
/// exclusive access for the whole of each call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryState {
    snapshot: RegistrySnapshot,
    events: Vec<EventEnvelope>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembles a state from a stored snapshot and its event log.
    pub fn from_parts(snapshot: RegistrySnapshot, events: Vec<EventEnvelope>) -> Self {
        Self { snapshot, events }
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    /// Puts back an earlier snapshot and drops every event logged after `event_count`.
    pub fn rollback(&mut self, snapshot: RegistrySnapshot, event_count: usize) {
        self.snapshot = snapshot;
        self.events.truncate(event_count);
    }

    /// Total lookup. Unknown addresses yield [`RecordView::Default`].
    pub fn lookup(&self, address: &Address) -> RecordView {
        match self.snapshot.records.get(address) {
            Some(record) if record.is_registered => RecordView::Stored(*record),
            _ => RecordView::Default,
        }
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.lookup(address).is_stored()
    }

    pub fn reputation(&self, address: &Address) -> u64 {
        self.lookup(address).score()
    }

    pub fn reputation_data(&self, address: &Address) -> ReputationRecord {
        self.lookup(address).record()
    }

    pub fn registered_users(&self) -> &[Address] {
        &self.snapshot.registered
    }

    pub fn total_users(&self) -> usize {
        self.snapshot.registered.len()
    }

    pub fn batch_reputations(&self, addresses: &[Address]) -> Vec<u64> {
        addresses.iter().map(|a| self.reputation(a)).collect()
    }

    pub fn events(&self) -> &[EventEnvelope] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Events with `seq >= since`, in log order.
    pub fn events_since(&self, since: u64) -> &[EventEnvelope] {
        let start = usize::try_from(since)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// (Re)registers `address` with a fresh record.
    ///
    /// The address is appended to the registration order only the first time.
    /// Any existing rating history is discarded.
    pub fn register(&mut self, address: &Address) {
        if !self.is_registered(address) {
            self.snapshot.registered.push(*address);
        }
        self.snapshot.records.insert(*address, ReputationRecord::registered());
        debug!(%address, "registered");
        self.emit(RegistryEvent::UserRegistered {
            address: *address,
            initial_score: INITIAL_REPUTATION,
        });
    }

    pub fn batch_register(&mut self, addresses: &[Address]) {
        for address in addresses {
            self.register(address);
        }
    }

    /// Applies one rating from `caller` to `ratee` and returns the new score.
    ///
    /// Both parties are registered first if needed, ratee before caller. The
    /// rating is capped at [`MAX_REPUTATION`].
    pub fn submit_rating(
        &mut self,
        caller: &Address,
        ratee: &Address,
        raw_rating: u64,
    ) -> Result<u64, RegistryError> {
        // Checked up front so a failure leaves no partial registration behind.
        if let RecordView::Stored(existing) = self.lookup(ratee) {
            if existing.total_ratings == u64::MAX {
                return Err(RegistryError::RatingCountOverflow { address: *ratee });
            }
        }

        if !self.is_registered(ratee) {
            self.register(ratee);
        }
        if !self.is_registered(caller) {
            self.register(caller);
        }

        let rating = raw_rating.min(MAX_REPUTATION);
        let record = self
            .snapshot
            .records
            .entry(*ratee)
            .or_insert_with(ReputationRecord::registered);
        let overflow = RegistryError::RatingCountOverflow { address: *ratee };
        let next_count = record.total_ratings.checked_add(1).ok_or(overflow)?;
        let old_score = record.score;
        let new_score = running_average(old_score, record.total_ratings, rating)
            .ok_or(RegistryError::RatingCountOverflow { address: *ratee })?
            .min(MAX_REPUTATION);

        record.score = new_score;
        record.total_ratings = next_count;
        debug!(%ratee, %caller, rating, old_score, new_score, count = next_count, "rating applied");

        self.emit(RegistryEvent::ReputationUpdated {
            address: *ratee,
            old_score,
            new_score,
            actor: *caller,
        });
        Ok(new_score)
    }

    /// Overwrites the score directly, leaving the rating counter untouched.
    pub fn set_reputation(&mut self, caller: &Address, address: &Address, new_score: u64) -> u64 {
        if !self.is_registered(address) {
            self.register(address);
        }

        let new_score = new_score.min(MAX_REPUTATION);
        let record = self
            .snapshot
            .records
            .entry(*address)
            .or_insert_with(ReputationRecord::registered);
        let old_score = record.score;
        record.score = new_score;
        debug!(%address, %caller, old_score, new_score, "score set");

        self.emit(RegistryEvent::ReputationUpdated {
            address: *address,
            old_score,
            new_score,
            actor: *caller,
        });
        new_score
    }

    /// Returns a record to its initial score with no ratings.
    ///
    /// An unregistered address is simply registered, which emits only
    /// `UserRegistered`.
    pub fn reset_reputation(&mut self, caller: &Address, address: &Address) {
        if !self.is_registered(address) {
            self.register(address);
            return;
        }

        let record = self
            .snapshot
            .records
            .entry(*address)
            .or_insert_with(ReputationRecord::registered);
        let old_score = record.score;
        record.score = INITIAL_REPUTATION;
        record.total_ratings = 0;
        debug!(%address, %caller, old_score, "reputation reset");

        self.emit(RegistryEvent::ReputationUpdated {
            address: *address,
            old_score,
            new_score: INITIAL_REPUTATION,
            actor: *caller,
        });
    }

    fn emit(&mut self, event: RegistryEvent) {
        let seq = self.events.len() as u64;
        self.events.push(EventEnvelope {
            seq,
            recorded_at: Utc::now(),
            event,
        });
    }
}
