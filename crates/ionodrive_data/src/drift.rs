use serde::{Deserialize, Serialize};

/// Velocity of the grid frame, m/s.
///
/// Zero unless the run follows the background E x B drift.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DriftField {
    pub v2: f64,
    pub v3: f64,
}
