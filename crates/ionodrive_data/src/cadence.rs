use serde::{Deserialize, Serialize};

/// Next-due times of the four cadences, in simulated seconds.
///
/// Disabled cadences report `None`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct CadenceState {
    pub neutral_background: Option<f64>,
    pub field_output: Option<f64>,
    pub aux_output: Option<f64>,
    pub milestone: Option<f64>,
}
