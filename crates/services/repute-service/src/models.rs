use repute_types::{Address, RatingPreset, ReputationRecord};
use serde::{Deserialize, Serialize};

// Addresses arrive as plain strings so that malformed ones map to 400 rather
// than a JSON extractor rejection.

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub caller: String,
    /// Omitted for self-registration.
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRegisterRequest {
    pub caller: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub caller: String,
    pub ratee: String,
    /// Raw rating; exactly one of `rating` and `preset` must be given.
    pub rating: Option<u64>,
    pub preset: Option<RatingPreset>,
}

#[derive(Debug, Deserialize)]
pub struct SetScoreRequest {
    pub caller: String,
    pub score: u64,
}

#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchScoresRequest {
    pub addresses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub since: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordResponse {
    pub address: Address,
    pub score: u64,
    pub total_ratings: u64,
    pub is_registered: bool,
}

impl RecordResponse {
    pub fn new(address: Address, record: ReputationRecord) -> Self {
        Self {
            address,
            score: record.score,
            total_ratings: record.total_ratings,
            is_registered: record.is_registered,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreResponse {
    pub address: Address,
    pub score: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredResponse {
    pub address: Address,
    pub is_registered: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsersResponse {
    pub users: Vec<Address>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingResponse {
    pub ratee: Address,
    pub rating: u64,
    pub new_score: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchScoresResponse {
    pub scores: Vec<u64>,
}
