pub mod models;
pub mod recorder;

pub use models::DetectionRecord;
pub use recorder::{DynamoHistoryRecorder, HistoryError, HistoryRecorder};
