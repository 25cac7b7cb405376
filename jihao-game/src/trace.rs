//! Explainability telemetry for weighted scene selection.
use serde::{Deserialize, Serialize};

/// Record of one weighted draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionTrace {
    /// Identifier for the selection pool (e.g., `jihao.next_scene`).
    pub pool_id: String,
    /// Point on `0..total_weight` the draw landed on.
    pub roll: f64,
    pub candidates: Vec<WeightedCandidate>,
    pub chosen_id: String,
    /// Set when every scene was excluded and the pick fell back to a uniform draw.
    #[serde(default)]
    pub relaxed: bool,
}

impl SelectionTrace {
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.candidates
            .iter()
            .map(|candidate| candidate.final_weight)
            .sum()
    }

    #[must_use]
    pub fn candidate(&self, id: &str) -> Option<&WeightedCandidate> {
        self.candidates.iter().find(|candidate| candidate.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedCandidate {
    pub id: String,
    pub base_weight: f64,
    /// Multipliers applied in order.
    pub multipliers: Vec<WeightFactor>,
    pub final_weight: f64,
}

/// Single multiplicative weight factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightFactor {
    pub label: String,
    pub value: f64,
}

impl WeightFactor {
    #[must_use]
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}
