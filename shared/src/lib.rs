pub mod api;
pub mod diagnosis;
pub mod disease;
pub mod pipeline;
pub mod symptoms;
pub mod verdict;

pub use api::{DetectResponse, DiagnosisResponse, ErrorResponse, HealthResponse};
pub use diagnosis::{
    reconcile, reconcile_with, Advisory, AdvisoryKind, ClassificationResult, ExactMatcher, FinalDiagnosis,
    LabelMatcher, SubstringMatcher,
};
pub use disease::{DiseaseInfo, DiseaseSlug};
pub use pipeline::{PipelineEvent, PipelineFailure, PipelineState, RunId, TransitionError};
pub use symptoms::{predict, SymptomAnswers, SymptomLabel, SymptomPrediction};
pub use verdict::ValidationVerdict;
