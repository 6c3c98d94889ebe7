use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::history::models::DetectionRecord;

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct HistoryRepository {
    client: Client,
    history_table: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

impl HistoryRepository {
    pub fn new(client: Client, history_table: String) -> Self {
        Self {
            client,
            history_table,
        }
    }

    pub async fn create_record(&self, record: &DetectionRecord) -> Result<(), RepositoryError> {
        let item = record_to_item(record)?;

        self.client
            .put_item()
            .table_name(&self.history_table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed for record {}: {:?}", record.id, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;

        log::info!(
            "Saved detection {} for user {} to '{}'",
            record.id,
            record.user_id,
            self.history_table
        );
        Ok(())
    }

    pub async fn get_record(
        &self,
        record_id: Uuid,
    ) -> Result<Option<DetectionRecord>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(record_id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.history_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        result.item.map(record_from_item).transpose()
    }

    /// All records owned by `user_id`, newest first.
    pub async fn list_user_records(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DetectionRecord>, RepositoryError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.history_table)
                .filter_expression("user_id = :user_id")
                .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            if let Some(items) = result.items {
                for item in items {
                    records.push(record_from_item(item)?);
                }
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Deletes a record only if it belongs to `user_id`. Returns whether anything was removed.
    pub async fn delete_user_record(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        match self.get_record(record_id).await? {
            Some(record) if record.user_id == user_id => {}
            Some(_) => {
                log::warn!(
                    "User {} attempted to delete record {} owned by another user",
                    user_id,
                    record_id
                );
                return Ok(false);
            }
            None => return Ok(false),
        }

        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(record_id.to_string()));

        self.client
            .delete_item()
            .table_name(&self.history_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(true)
    }
}

pub fn sort_newest_first(records: &mut [DetectionRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn string_list(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

pub fn record_to_item(record: &DetectionRecord) -> Result<Item, RepositoryError> {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(record.user_id.to_string()),
    );
    item.insert(
        "image_ref".to_string(),
        AttributeValue::S(record.image_ref.clone()),
    );
    item.insert(
        "detected_condition".to_string(),
        AttributeValue::S(record.detected_condition.clone()),
    );
    item.insert(
        "possible_conditions".to_string(),
        string_list(&record.possible_conditions),
    );
    item.insert(
        "symptoms_used".to_string(),
        AttributeValue::S(serde_json::to_string(&record.symptoms_used)?),
    );
    item.insert("models_used".to_string(), string_list(&record.models_used));
    item.insert(
        "confidence".to_string(),
        AttributeValue::N(record.confidence.to_string()),
    );
    item.insert(
        "symptoms_match".to_string(),
        AttributeValue::Bool(record.symptoms_match),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(record.created_at.to_rfc3339()),
    );
    Ok(item)
}

fn get_string(item: &Item, name: &str) -> Result<String, RepositoryError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", name)))
}

fn get_uuid(item: &Item, name: &str) -> Result<Uuid, RepositoryError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", name)))
}

fn get_string_list(item: &Item, name: &str) -> Result<Vec<String>, RepositoryError> {
    let values = match item.get(name) {
        Some(value) => value
            .as_l()
            .map_err(|_| RepositoryError::InvalidData(format!("Invalid {}", name)))?,
        None => return Ok(Vec::new()),
    };
    values
        .iter()
        .map(|v| {
            v.as_s()
                .cloned()
                .map_err(|_| RepositoryError::InvalidData(format!("Invalid entry in {}", name)))
        })
        .collect()
}

pub fn record_from_item(item: Item) -> Result<DetectionRecord, RepositoryError> {
    let symptoms_used = serde_json::from_str(&get_string(&item, "symptoms_used")?)?;

    let confidence = item
        .get("confidence")
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid confidence".to_string()))?;

    let symptoms_match = *item
        .get("symptoms_match")
        .and_then(|v| v.as_bool().ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid symptoms_match".to_string()))?;

    let created_at = item
        .get("created_at")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

    Ok(DetectionRecord {
        id: get_uuid(&item, "id")?,
        user_id: get_uuid(&item, "user_id")?,
        image_ref: get_string(&item, "image_ref")?,
        detected_condition: get_string(&item, "detected_condition")?,
        possible_conditions: get_string_list(&item, "possible_conditions")?,
        symptoms_used,
        models_used: get_string_list(&item, "models_used")?,
        confidence,
        symptoms_match,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::SymptomAnswers;

    fn record() -> DetectionRecord {
        DetectionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            image_ref: "images/u/abc.jpg".to_string(),
            detected_condition: "Glaucoma".to_string(),
            possible_conditions: vec!["Glaucoma".to_string(), "Cataract".to_string()],
            symptoms_used: SymptomAnswers {
                eye_pain: true,
                loss_of_side_vision: true,
                ..Default::default()
            },
            models_used: Vec::new(),
            confidence: 0.64,
            symptoms_match: true,
            created_at: DateTime::parse_from_rfc3339("2025-11-02T10:15:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn item_layout_matches_table_columns() {
        let item = record_to_item(&record()).unwrap();
        assert_eq!(item["detected_condition"].as_s().unwrap(), "Glaucoma");
        assert_eq!(item["confidence"].as_n().unwrap(), "0.64");
        assert_eq!(item["possible_conditions"].as_l().unwrap().len(), 2);
        assert!(item["models_used"].as_l().unwrap().is_empty());
        assert!(item["symptoms_used"].as_s().unwrap().contains("\"eyePain\":true"));
        assert_eq!(*item["symptoms_match"].as_bool().unwrap(), true);
    }

    #[test]
    fn stored_item_reads_back() {
        let original = record();
        let parsed = record_from_item(record_to_item(&original).unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn missing_lists_read_as_empty() {
        let mut item = record_to_item(&record()).unwrap();
        item.remove("models_used");
        assert!(record_from_item(item).unwrap().models_used.is_empty());
    }

    #[test]
    fn corrupt_items_are_reported() {
        let mut item = record_to_item(&record()).unwrap();
        item.insert("confidence".to_string(), AttributeValue::S("high".to_string()));
        assert!(matches!(
            record_from_item(item),
            Err(RepositoryError::InvalidData(_))
        ));

        let mut item = record_to_item(&record()).unwrap();
        item.remove("user_id");
        assert!(record_from_item(item).is_err());
    }

    #[test]
    fn newest_records_come_first() {
        let older = record();
        let mut newer = record();
        newer.created_at = older.created_at + Duration::hours(1);
        let mut records = vec![older.clone(), newer.clone()];
        sort_newest_first(&mut records);
        assert_eq!(records[0].id, newer.id);
        assert_eq!(records[1].id, older.id);
    }
}
