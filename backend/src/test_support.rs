use actix_web::{web, App, HttpServer};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::history_repository::sort_newest_first;
use crate::history::{DetectionRecord, HistoryError, HistoryRecorder};
use crate::preprocess::NormalizedImage;
use crate::storage::s3_service::S3ServiceError;

/// Starts a throwaway upstream on an ephemeral port and returns its base URL.
pub(crate) async fn spawn_upstream<F>(configure: F) -> String
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let server = HttpServer::new(move || App::new().configure(configure.clone()))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

/// An address nothing listens on.
pub(crate) fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// In-memory history that reports every write attempt on a channel.
pub(crate) struct MemoryHistory {
    records: Mutex<Vec<DetectionRecord>>,
    fail: bool,
    attempts: mpsc::UnboundedSender<DetectionRecord>,
}

impl MemoryHistory {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DetectionRecord>) {
        Self::build(false)
    }

    /// Every write fails with a storage error.
    pub(crate) fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<DetectionRecord>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<DetectionRecord>) {
        let (attempts, receiver) = mpsc::unbounded_channel();
        let history = Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fail,
            attempts,
        });
        (history, receiver)
    }

    pub(crate) fn insert(&self, record: DetectionRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub(crate) fn records(&self) -> Vec<DetectionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl HistoryRecorder for MemoryHistory {
    fn record(
        &self,
        record: DetectionRecord,
        _image: Arc<NormalizedImage>,
    ) -> BoxFuture<'_, Result<(), HistoryError>> {
        Box::pin(async move {
            let _ = self.attempts.send(record.clone());
            if self.fail {
                return Err(HistoryError::Storage(S3ServiceError::S3(
                    "bucket unreachable".to_string(),
                )));
            }
            self.insert(record);
            Ok(())
        })
    }

    fn list(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<DetectionRecord>, HistoryError>> {
        Box::pin(async move {
            let mut records: Vec<_> = self
                .records()
                .into_iter()
                .filter(|record| record.user_id == user_id)
                .collect();
            sort_newest_first(&mut records);
            Ok(records)
        })
    }

    fn delete(&self, user_id: Uuid, record_id: Uuid) -> BoxFuture<'_, Result<bool, HistoryError>> {
        Box::pin(async move {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|record| !(record.id == record_id && record.user_id == user_id));
            Ok(records.len() != before)
        })
    }
}
