//! Relevance coefficients for one request

use boardsearch_core::WeightConfig;

/// Relevance coefficients, fixed for the lifetime of a request
///
/// The frequency signal needs a per-topic aggregate over the whole candidate
/// set, so it is only granted to privileged (logged in) requesters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightFactors {
    /// Matching messages in the topic relative to its size
    pub frequency: f64,
    /// Recency
    pub age: f64,
    /// Share of terms in the body
    pub body: f64,
    /// Share of terms in the subject
    pub subject: f64,
    /// Opening message of its topic
    pub first_message: f64,
    /// Sticky topic
    pub sticky: f64,
}

impl WeightFactors {
    /// Build from configuration
    pub fn from_config(config: &WeightConfig, privileged: bool) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        WeightFactors {
            frequency: if privileged { clamp(config.frequency) } else { 0.0 },
            age: clamp(config.age),
            body: clamp(config.body),
            subject: clamp(config.subject),
            first_message: clamp(config.first_message),
            sticky: clamp(config.sticky),
        }
    }

    /// Sum of every coefficient
    pub fn total(&self) -> f64 {
        self.frequency + self.age + self.body + self.subject + self.first_message + self.sticky
    }

    /// True when the frequency signal takes part in ranking
    pub fn uses_frequency(&self) -> bool {
        self.frequency > 0.0
    }
}

impl Default for WeightFactors {
    fn default() -> Self {
        Self::from_config(&WeightConfig::default(), true)
    }
}
