use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use shared::ClassificationResult;
use url::Url;

use crate::config::ClassifierSettings;
use crate::preprocess::NormalizedImage;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Classifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    disease: String,
    confidence: f64,
    #[serde(default, alias = "modelsUsed")]
    models_used: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ClassifierClient {
    http_client: HttpClient,
    endpoint: Url,
    api_key: Option<String>,
}

impl ClassifierClient {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        settings: &ClassifierSettings,
    ) -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http_client,
            endpoint,
            api_key,
        })
    }

    pub async fn classify(
        &self,
        image: &NormalizedImage,
    ) -> Result<ClassificationResult, ClassifierError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("image", part);

        let mut request = self.http_client.post(self.endpoint.clone()).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        log::info!("Classifying {} ({} bytes)", image.file_name, image.bytes.len());
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result = parse_classification(&body)?;
        log::info!(
            "Classifier predicted {} ({:.2}) using {:?}",
            result.disease,
            result.confidence,
            result.models_used
        );
        Ok(result)
    }
}

pub fn parse_classification(body: &str) -> Result<ClassificationResult, ClassifierError> {
    let raw: RawClassification =
        serde_json::from_str(body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    let disease = raw.disease.trim();
    if disease.is_empty() {
        return Err(ClassifierError::Malformed("empty disease label".to_string()));
    }
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(ClassifierError::Malformed(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    Ok(ClassificationResult {
        disease: disease.to_string(),
        confidence: raw.confidence,
        models_used: raw.models_used.unwrap_or_default(),
    })
}
