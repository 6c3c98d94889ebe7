use futures::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;

use super::models::DetectionRecord;
use crate::db::history_repository::{HistoryRepository, RepositoryError};
use crate::preprocess::NormalizedImage;
use crate::storage::s3_service::{S3Service, S3ServiceError};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Storage error: {0}")]
    Storage(#[from] S3ServiceError),
}

/// Persistence boundary for completed detections.
///
/// `record` is the only call on the diagnosis path, and callers never await it
/// before answering the user. `list` and `delete` back the history page.
pub trait HistoryRecorder: Send + Sync {
    fn record(
        &self,
        record: DetectionRecord,
        image: Arc<NormalizedImage>,
    ) -> BoxFuture<'_, Result<(), HistoryError>>;

    fn list(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<DetectionRecord>, HistoryError>>;

    fn delete(&self, user_id: Uuid, record_id: Uuid) -> BoxFuture<'_, Result<bool, HistoryError>>;
}

/// Stores the image in S3 under its content hash, then the record in DynamoDB.
#[derive(Clone)]
pub struct DynamoHistoryRecorder {
    repository: HistoryRepository,
    s3_service: S3Service,
}

impl DynamoHistoryRecorder {
    pub fn new(repository: HistoryRepository, s3_service: S3Service) -> Self {
        Self {
            repository,
            s3_service,
        }
    }
}

impl HistoryRecorder for DynamoHistoryRecorder {
    fn record(
        &self,
        record: DetectionRecord,
        image: Arc<NormalizedImage>,
    ) -> BoxFuture<'_, Result<(), HistoryError>> {
        Box::pin(async move {
            self.s3_service
                .upload_image(&image.bytes, &record.image_ref, &image.mime_type)
                .await?;
            self.repository.create_record(&record).await?;
            Ok(())
        })
    }

    fn list(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<DetectionRecord>, HistoryError>> {
        Box::pin(async move { Ok(self.repository.list_user_records(user_id).await?) })
    }

    fn delete(&self, user_id: Uuid, record_id: Uuid) -> BoxFuture<'_, Result<bool, HistoryError>> {
        Box::pin(async move {
            Ok(self
                .repository
                .delete_user_record(user_id, record_id)
                .await?)
        })
    }
}
