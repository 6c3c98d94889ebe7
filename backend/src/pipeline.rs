use shared::{
    predict, reconcile_with, DetectResponse, DiagnosisResponse, LabelMatcher, PipelineEvent,
    PipelineState, RunId, SubstringMatcher, SymptomAnswers, ValidationVerdict,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::ClassifierClient;
use crate::config::ImageSettings;
use crate::error::ApiError;
use crate::history::{DetectionRecord, HistoryRecorder};
use crate::preprocess::{self, NormalizedImage, UploadedImage};
use crate::session::SessionStore;
use crate::storage::s3_service::S3Service;
use crate::validator::ValidatorClient;

/// Drives one user's detection run through the pipeline state machine.
///
/// Upstream calls happen between two session updates and never under the
/// session lock. A result that arrives after the user started a new run is
/// rejected by the state machine and reported as a conflict.
#[derive(Clone)]
pub struct DetectionPipeline {
    sessions: SessionStore,
    validator: ValidatorClient,
    classifier: ClassifierClient,
    recorder: Arc<dyn HistoryRecorder>,
    matcher: Arc<dyn LabelMatcher + Send + Sync>,
    image_settings: ImageSettings,
}

impl DetectionPipeline {
    pub fn new(
        sessions: SessionStore,
        validator: ValidatorClient,
        classifier: ClassifierClient,
        recorder: Arc<dyn HistoryRecorder>,
        image_settings: ImageSettings,
    ) -> Self {
        Self {
            sessions,
            validator,
            classifier,
            recorder,
            matcher: Arc::new(SubstringMatcher),
            image_settings,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn LabelMatcher + Send + Sync>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn validator_configured(&self) -> bool {
        self.validator.is_configured()
    }

    pub fn upload_limit(&self) -> usize {
        self.image_settings.max_upload_bytes
    }

    pub fn recorder(&self) -> Arc<dyn HistoryRecorder> {
        self.recorder.clone()
    }

    /// Supersedes any run in flight, then preprocesses, validates and, when the
    /// image is a fundus photograph, classifies it.
    pub async fn start(&self, user_id: Uuid, upload: UploadedImage) -> Result<DetectResponse, ApiError> {
        let run_id = self.sessions.begin_run(user_id);
        log::info!(
            "Run {} started for user {} ({}, {} bytes)",
            run_id,
            user_id,
            upload.mime_type,
            upload.bytes.len()
        );

        let settings = self.image_settings.clone();
        let normalized = actix_web::web::block(move || preprocess::normalize(&upload, &settings))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let image = match normalized {
            Ok(image) => Arc::new(image),
            Err(e) => {
                log::warn!("Run {} rejected input: {}", run_id, e);
                self.sessions.apply(
                    user_id,
                    PipelineEvent::InputRejected {
                        run_id,
                        reason: e.to_string(),
                    },
                )?;
                return Err(ApiError::InputRejected(e));
            }
        };

        self.sessions
            .apply(user_id, PipelineEvent::Preprocessed { run_id })?;
        self.sessions.attach_image(user_id, run_id, image.clone())?;

        let verdict = self.validator.validate(&image).await;
        let state = self.sessions.apply(
            user_id,
            PipelineEvent::Validated {
                run_id,
                verdict: verdict.clone(),
            },
        )?;

        if !matches!(state, PipelineState::Classifying { .. }) {
            log::info!("Run {} stopped at validation: {}", run_id, verdict.reason);
            return Ok(DetectResponse {
                run_id,
                state,
                verdict,
                classification: None,
            });
        }

        self.classify(user_id, run_id, &image, verdict).await
    }

    /// Manual retry after the classifier was unavailable.
    pub async fn retry_classification(
        &self,
        user_id: Uuid,
        run_id: RunId,
    ) -> Result<DetectResponse, ApiError> {
        let state = self
            .sessions
            .apply(user_id, PipelineEvent::RetryClassification { run_id })?;
        let verdict = match state {
            PipelineState::Classifying { verdict, .. } => verdict,
            other => {
                return Err(ApiError::Internal(format!(
                    "retry left run {} in {}",
                    run_id,
                    other.name()
                )))
            }
        };
        let image = self
            .sessions
            .image_for(user_id, run_id)
            .ok_or(ApiError::RunNotFound(run_id))?;

        self.classify(user_id, run_id, &image, verdict).await
    }

    async fn classify(
        &self,
        user_id: Uuid,
        run_id: RunId,
        image: &NormalizedImage,
        verdict: ValidationVerdict,
    ) -> Result<DetectResponse, ApiError> {
        match self.classifier.classify(image).await {
            Ok(classification) => {
                let state = self.sessions.apply(
                    user_id,
                    PipelineEvent::Classified {
                        run_id,
                        classification: classification.clone(),
                    },
                )?;
                Ok(DetectResponse {
                    run_id,
                    state,
                    verdict,
                    classification: Some(classification),
                })
            }
            Err(e) => {
                log::error!("Run {} classification failed: {}", run_id, e);
                let reason = e.to_string();
                self.sessions.apply(
                    user_id,
                    PipelineEvent::ClassificationFailed {
                        run_id,
                        reason: reason.clone(),
                    },
                )?;
                Err(ApiError::ClassificationUnavailable { run_id, reason })
            }
        }
    }

    /// Reconciles the classification with the submitted symptoms. The history
    /// write is spawned and never delays the response.
    pub fn diagnose(
        &self,
        user_id: Uuid,
        run_id: RunId,
        answers: SymptomAnswers,
    ) -> Result<DiagnosisResponse, ApiError> {
        let state = self
            .sessions
            .apply(user_id, PipelineEvent::SymptomsSubmitted { run_id, answers })?;
        let classification = match state {
            PipelineState::Reconciling { classification, .. } => classification,
            other => {
                return Err(ApiError::Internal(format!(
                    "symptoms left run {} in {}",
                    run_id,
                    other.name()
                )))
            }
        };

        let prediction = predict(&answers);
        let diagnosis = reconcile_with(self.matcher.as_ref(), &classification, &prediction);
        log::info!(
            "Run {} diagnosis: {} ({}%), symptoms match: {}",
            run_id,
            diagnosis.primary_disease,
            diagnosis.confidence_percent,
            diagnosis.symptoms_match
        );

        let image = self.sessions.image_for(user_id, run_id);
        self.sessions.apply(
            user_id,
            PipelineEvent::Reconciled {
                run_id,
                diagnosis: diagnosis.clone(),
            },
        )?;

        match image {
            Some(image) => match S3Service::image_key(user_id, &image.bytes, &image.mime_type) {
                Ok(image_ref) => {
                    let record = DetectionRecord::new(
                        user_id,
                        image_ref,
                        &classification,
                        answers,
                        &diagnosis,
                    );
                    self.spawn_record(record, image);
                }
                Err(e) => log::error!("Run {} not recorded: {}", run_id, e),
            },
            None => log::error!("Run {} not recorded: image already released", run_id),
        }

        Ok(DiagnosisResponse::new(run_id, diagnosis))
    }

    fn spawn_record(&self, record: DetectionRecord, image: Arc<NormalizedImage>) {
        let recorder = self.recorder.clone();
        actix_web::rt::spawn(async move {
            let record_id = record.id;
            if let Err(e) = recorder.record(record, image).await {
                log::error!("Failed to save detection history {}: {}", record_id, e);
            }
        });
    }

    pub fn status(&self, user_id: Uuid, run_id: RunId) -> Result<PipelineState, ApiError> {
        self.sessions
            .snapshot(user_id, run_id)
            .ok_or(ApiError::RunNotFound(run_id))
    }

    pub fn reset(&self, user_id: Uuid) {
        self.sessions.reset(user_id);
    }
}
