use serde::{Deserialize, Serialize};

use crate::diagnosis::{Advisory, ClassificationResult, FinalDiagnosis};
use crate::disease::DiseaseSlug;
use crate::pipeline::{PipelineState, RunId};
use crate::verdict::ValidationVerdict;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub run_id: RunId,
    pub state: PipelineState,
    pub verdict: ValidationVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub run_id: RunId,
    pub diagnosis: FinalDiagnosis,
    pub advisory: Advisory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_slug: Option<DiseaseSlug>,
}

impl DiagnosisResponse {
    pub fn new(run_id: RunId, diagnosis: FinalDiagnosis) -> Self {
        let advisory = diagnosis.advisory();
        let disease_slug = DiseaseSlug::from_label(&diagnosis.primary_disease);
        Self {
            run_id,
            diagnosis,
            advisory,
            disease_slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub validator_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}
