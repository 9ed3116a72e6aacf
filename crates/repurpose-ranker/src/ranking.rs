//! Final ordering and the ranked response envelope.

use chrono::{DateTime, Utc};
use repurpose_common::{Disease, Prediction};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Stable sort by final score, descending, then keep the first `top_k`.
/// Equal scores keep their upstream order.
pub fn rank(mut predictions: Vec<Prediction>, top_k: usize) -> Vec<Prediction> {
    predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    predictions.truncate(top_k);
    predictions
}

/// Everything one prediction request returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResponse {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub disease: Disease,
    pub model: String,
    /// Candidates produced by aggregation.
    pub candidates_considered: usize,
    /// Candidates that survived scoring (before truncation).
    pub evaluated: usize,
    /// Candidates skipped because features or inference failed.
    pub skipped: usize,
    pub gates_applied: bool,
    pub predictions: Vec<Prediction>,
}
