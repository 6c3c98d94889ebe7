use serde::{Deserialize, Serialize};

/// Judgment on whether an uploaded image is a retinal fundus photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_retinal: bool,
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}

impl ValidationVerdict {
    pub fn new(is_retinal: bool, confidence: f64, reason: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            is_retinal,
            confidence,
            reason: reason.into(),
            fallback_used: false,
            suggestions: None,
        }
    }

    /// Safe verdict used whenever the judge could not be reached or understood.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            is_retinal: false,
            confidence: 0.0,
            reason: reason.into(),
            fallback_used: true,
            suggestions: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Option<String>) -> Self {
        self.suggestions = suggestions.filter(|s| !s.trim().is_empty());
        self
    }
}
