use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ClassificationResult, FinalDiagnosis, SymptomAnswers};
use uuid::Uuid;

/// One persisted detection, as stored in the `detection_history` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_ref: String,
    pub detected_condition: String,
    pub possible_conditions: Vec<String>,
    pub symptoms_used: SymptomAnswers,
    pub models_used: Vec<String>,
    pub confidence: f64,
    pub symptoms_match: bool,
    pub created_at: DateTime<Utc>,
}

impl DetectionRecord {
    pub fn new(
        user_id: Uuid,
        image_ref: String,
        classification: &ClassificationResult,
        answers: SymptomAnswers,
        diagnosis: &FinalDiagnosis,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            image_ref,
            detected_condition: diagnosis.primary_disease.clone(),
            possible_conditions: diagnosis.possible_conditions.clone(),
            symptoms_used: answers,
            models_used: classification.models_used.clone(),
            confidence: classification.confidence,
            symptoms_match: diagnosis.symptoms_match,
            created_at: Utc::now(),
        }
    }
}
