use reqwest::Client as HttpClient;
use serde_json::json;
use shared::ValidationVerdict;
use url::Url;

use super::response::{interpret, FallbackCause};
use crate::config::ValidatorSettings;
use crate::preprocess::NormalizedImage;

/// Client for the vision model that judges whether an image is a fundus photograph.
#[derive(Clone)]
pub struct ValidatorClient {
    http_client: HttpClient,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    prompt: String,
}

impl ValidatorClient {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        settings: &ValidatorSettings,
    ) -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http_client,
            endpoint,
            api_key,
            model: settings.model.clone(),
            prompt: settings.prompt.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Always yields a verdict. Transport and upstream failures collapse to the
    /// fallback verdict so the caller can still show a reason.
    pub async fn validate(&self, image: &NormalizedImage) -> ValidationVerdict {
        let Some(api_key) = &self.api_key else {
            log::warn!("Validator API key not set, returning offline verdict");
            return FallbackCause::NotConfigured.verdict();
        };

        let request_body = json!({
            "model": self.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": self.prompt },
                    { "type": "input_image", "image_url": image.data_url() }
                ]
            }],
            "text": { "format": { "type": "json_object" } }
        });

        log::info!(
            "Validating {} ({}x{}, {} bytes) with {}",
            image.file_name,
            image.width,
            image.height,
            image.bytes.len(),
            self.model
        );

        let response = match self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::error!("Validator request failed: {}", e);
                return FallbackCause::Transport.verdict();
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::error!("Failed to read validator response: {}", e);
                return FallbackCause::Transport.verdict();
            }
        };

        if !status.is_success() {
            log::error!("Validator returned {}: {}", status, body);
            return FallbackCause::UpstreamStatus.verdict();
        }

        log::debug!("Raw validator response: {}", body);
        let verdict = interpret(&body);
        log::info!(
            "Validator verdict: retinal={}, confidence={:.2}, fallback={}",
            verdict.is_retinal,
            verdict.confidence,
            verdict.fallback_used
        );
        verdict
    }
}
