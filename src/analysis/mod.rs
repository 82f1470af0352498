//! Envelope extraction, event detection and the orchestrating pipeline

pub mod bands;
pub mod flux;
pub mod grid;
pub mod onset;
pub mod pipeline;
pub mod result;
pub mod sections;
pub mod stats;
pub mod tempo;

/// Per-frame scalar values with each frame's center time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub values: Vec<f32>,
    pub times_ms: Vec<f64>,
}

impl Envelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
