//! Detection pipeline as an explicit state machine.
//!
//! Every event after `ImageSelected` carries the run id it belongs to. Selecting a new
//! image starts a new run, and events for any earlier run are rejected as stale.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use uuid::Uuid;

use crate::diagnosis::{ClassificationResult, FinalDiagnosis};
use crate::symptoms::SymptomAnswers;
use crate::verdict::ValidationVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineFailure {
    InputRejected { reason: String },
    ClassificationUnavailable { reason: String },
}

impl PipelineFailure {
    pub fn retryable(&self) -> bool {
        matches!(self, PipelineFailure::ClassificationUnavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PipelineState {
    Idle,
    Preprocessing {
        run_id: RunId,
    },
    Validating {
        run_id: RunId,
    },
    ValidatedInvalid {
        run_id: RunId,
        verdict: ValidationVerdict,
    },
    Classifying {
        run_id: RunId,
        verdict: ValidationVerdict,
    },
    AwaitingSymptoms {
        run_id: RunId,
        verdict: ValidationVerdict,
        classification: ClassificationResult,
    },
    Reconciling {
        run_id: RunId,
        classification: ClassificationResult,
        answers: SymptomAnswers,
    },
    Done {
        run_id: RunId,
        classification: ClassificationResult,
        diagnosis: FinalDiagnosis,
    },
    Error {
        run_id: RunId,
        failure: PipelineFailure,
        verdict: Option<ValidationVerdict>,
    },
}

#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum PipelineEvent {
    ImageSelected { run_id: RunId },
    Preprocessed { run_id: RunId },
    InputRejected { run_id: RunId, reason: String },
    Validated { run_id: RunId, verdict: ValidationVerdict },
    Classified { run_id: RunId, classification: ClassificationResult },
    ClassificationFailed { run_id: RunId, reason: String },
    RetryClassification { run_id: RunId },
    SymptomsSubmitted { run_id: RunId, answers: SymptomAnswers },
    Reconciled { run_id: RunId, diagnosis: FinalDiagnosis },
    Reset,
}

impl PipelineEvent {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            PipelineEvent::ImageSelected { run_id }
            | PipelineEvent::Preprocessed { run_id }
            | PipelineEvent::InputRejected { run_id, .. }
            | PipelineEvent::Validated { run_id, .. }
            | PipelineEvent::Classified { run_id, .. }
            | PipelineEvent::ClassificationFailed { run_id, .. }
            | PipelineEvent::RetryClassification { run_id }
            | PipelineEvent::SymptomsSubmitted { run_id, .. }
            | PipelineEvent::Reconciled { run_id, .. } => Some(*run_id),
            PipelineEvent::Reset => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The event belongs to a run that has been superseded or reset.
    Stale {
        current: Option<RunId>,
        received: RunId,
    },
    Illegal {
        state: &'static str,
        event: &'static str,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::Stale { current, received } => match current {
                Some(current) => write!(f, "run {received} was superseded by run {current}"),
                None => write!(f, "run {received} is no longer active"),
            },
            TransitionError::Illegal { state, event } => {
                write!(f, "cannot apply {event} while {state}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            PipelineState::Idle => None,
            PipelineState::Preprocessing { run_id }
            | PipelineState::Validating { run_id }
            | PipelineState::ValidatedInvalid { run_id, .. }
            | PipelineState::Classifying { run_id, .. }
            | PipelineState::AwaitingSymptoms { run_id, .. }
            | PipelineState::Reconciling { run_id, .. }
            | PipelineState::Done { run_id, .. }
            | PipelineState::Error { run_id, .. } => Some(*run_id),
        }
    }

    /// Whether the normalized image is still needed by a later stage.
    pub fn holds_image(&self) -> bool {
        match self {
            PipelineState::Preprocessing { .. }
            | PipelineState::Validating { .. }
            | PipelineState::Classifying { .. }
            | PipelineState::AwaitingSymptoms { .. }
            | PipelineState::Reconciling { .. } => true,
            PipelineState::Error { failure, .. } => failure.retryable(),
            PipelineState::Idle
            | PipelineState::ValidatedInvalid { .. }
            | PipelineState::Done { .. } => false,
        }
    }

    pub fn apply(&self, event: PipelineEvent) -> Result<PipelineState, TransitionError> {
        match event {
            PipelineEvent::Reset => return Ok(PipelineState::Idle),
            PipelineEvent::ImageSelected { run_id } => {
                return Ok(PipelineState::Preprocessing { run_id });
            }
            _ => {}
        }

        if let Some(received) = event.run_id() {
            let current = self.run_id();
            if current != Some(received) {
                return Err(TransitionError::Stale { current, received });
            }
        }

        let illegal = TransitionError::Illegal {
            state: self.name(),
            event: event.name(),
        };

        let next = match (self, event) {
            (PipelineState::Preprocessing { run_id }, PipelineEvent::Preprocessed { .. }) => {
                PipelineState::Validating { run_id: *run_id }
            }
            (
                PipelineState::Preprocessing { run_id },
                PipelineEvent::InputRejected { reason, .. },
            ) => PipelineState::Error {
                run_id: *run_id,
                failure: PipelineFailure::InputRejected { reason },
                verdict: None,
            },
            (PipelineState::Validating { run_id }, PipelineEvent::Validated { verdict, .. }) => {
                if verdict.is_retinal {
                    PipelineState::Classifying {
                        run_id: *run_id,
                        verdict,
                    }
                } else {
                    PipelineState::ValidatedInvalid {
                        run_id: *run_id,
                        verdict,
                    }
                }
            }
            (
                PipelineState::Classifying { run_id, verdict },
                PipelineEvent::Classified { classification, .. },
            ) => PipelineState::AwaitingSymptoms {
                run_id: *run_id,
                verdict: verdict.clone(),
                classification,
            },
            (
                PipelineState::Classifying { run_id, verdict },
                PipelineEvent::ClassificationFailed { reason, .. },
            ) => PipelineState::Error {
                run_id: *run_id,
                failure: PipelineFailure::ClassificationUnavailable { reason },
                verdict: Some(verdict.clone()),
            },
            (
                PipelineState::Error {
                    run_id,
                    failure: PipelineFailure::ClassificationUnavailable { .. },
                    verdict: Some(verdict),
                },
                PipelineEvent::RetryClassification { .. },
            ) if verdict.is_retinal => PipelineState::Classifying {
                run_id: *run_id,
                verdict: verdict.clone(),
            },
            (
                PipelineState::AwaitingSymptoms {
                    run_id,
                    classification,
                    ..
                },
                PipelineEvent::SymptomsSubmitted { answers, .. },
            ) => PipelineState::Reconciling {
                run_id: *run_id,
                classification: classification.clone(),
                answers,
            },
            (
                PipelineState::Reconciling {
                    run_id,
                    classification,
                    ..
                },
                PipelineEvent::Reconciled { diagnosis, .. },
            ) => PipelineState::Done {
                run_id: *run_id,
                classification: classification.clone(),
                diagnosis,
            },
            _ => return Err(illegal),
        };

        Ok(next)
    }
}
