use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to read pipeline config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse pipeline config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

const DEFAULT_VALIDATOR_URL: &str = "https://api.openai.com/v1/responses";
const DEFAULT_JWT_AUDIENCE: &str = "authenticated";

const DEFAULT_VALIDATOR_PROMPT: &str = "You are an ophthalmology expert.
Determine if this image is a human retinal fundus photograph.
A fundus photograph is circular or oval on a dark background and shows the optic disc,
blood vessels radiating from it and the macula, in red, orange or yellow tones.
External eye photos, faces, other scans and non-medical images are not fundus photographs.
Return ONLY valid JSON with keys:
\"isRetinal\" (boolean), \"confidence\" (0-1), \"reason\" (string) and,
when the image is not retinal, \"suggestions\" (string) describing a proper fundus image.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub version: f32,
    pub image: ImageSettings,
    pub validator: ValidatorSettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub max_edge: u32,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub model: String,
    pub timeout_secs: u64,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            image: ImageSettings::default(),
            validator: ValidatorSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_edge: 512,
            jpeg_quality: 80,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            prompt: DEFAULT_VALIDATOR_PROMPT.to_string(),
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ValidatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Loads the YAML file at `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!(
                "Pipeline config {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(config_str)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.image.max_edge == 0 {
            return Err(ConfigError::Invalid {
                key: "image.max_edge",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::Invalid {
                key: "image.jpeg_quality",
                reason: format!("{} is outside 1..=100", self.image.jpeg_quality),
            });
        }
        if self.validator.timeout_secs == 0 || self.classifier.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout_secs",
                reason: "timeouts must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub validator_url: Url,
    pub validator_api_key: Option<String>,
    pub classifier_url: Url,
    pub classifier_api_key: Option<String>,
    pub history_table: String,
    pub s3_bucket: String,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));
        let parse_url = |key: &'static str, value: String| {
            Url::parse(&value).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        };

        let port = match optional("PORT") {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => 8081,
        };

        let validator_url = parse_url(
            "VALIDATOR_API_URL",
            optional("VALIDATOR_API_URL").unwrap_or_else(|| DEFAULT_VALIDATOR_URL.to_string()),
        )?;
        let classifier_url = parse_url("CLASSIFIER_API_URL", required("CLASSIFIER_API_URL")?)?;

        let pipeline_path = optional("PIPELINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(default_pipeline_path);
        let mut pipeline = PipelineConfig::load(&pipeline_path)?;
        if let Some(model) = optional("VALIDATOR_MODEL") {
            pipeline.validator.model = model;
        }

        Ok(Self {
            port,
            jwt_secret: required("JWT_SECRET")?,
            jwt_audience: optional("JWT_AUDIENCE")
                .unwrap_or_else(|| DEFAULT_JWT_AUDIENCE.to_string()),
            validator_url,
            validator_api_key: optional("VALIDATOR_API_KEY"),
            classifier_url,
            classifier_api_key: optional("CLASSIFIER_API_KEY"),
            history_table: required("DYNAMODB_HISTORY_TABLE")?,
            s3_bucket: required("S3_BUCKET_NAME")?,
            pipeline,
        })
    }
}

fn default_pipeline_path() -> PathBuf {
    match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(manifest_dir) => PathBuf::from(manifest_dir).join("../config/pipeline.yaml"),
        Err(_) => PathBuf::from("config/pipeline.yaml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", "secret"),
            ("CLASSIFIER_API_URL", "http://classifier.local/api/predict_simple"),
            ("DYNAMODB_HISTORY_TABLE", "detection_history"),
            ("S3_BUCKET_NAME", "ocunova-images"),
            ("PIPELINE_CONFIG", "/nonexistent/pipeline.yaml"),
        ]
    }

    #[test]
    fn missing_validator_key_is_not_an_error() {
        let config = AppConfig::from_lookup(lookup(&base_env())).unwrap();
        assert!(config.validator_api_key.is_none());
        assert_eq!(config.validator_url.as_str(), DEFAULT_VALIDATOR_URL);
        assert_eq!(config.port, 8081);
        assert_eq!(config.jwt_audience, "authenticated");
        assert_eq!(config.pipeline.image.max_edge, 512);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = base_env();
        env.push(("VALIDATOR_API_KEY", "   "));
        let config = AppConfig::from_lookup(lookup(&env)).unwrap();
        assert!(config.validator_api_key.is_none());
    }

    #[test]
    fn missing_jwt_secret_fails() {
        let env: Vec<_> = base_env()
            .into_iter()
            .filter(|(k, _)| *k != "JWT_SECRET")
            .collect();
        let err = AppConfig::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_classifier_url_fails() {
        let mut env = base_env();
        env.retain(|(k, _)| *k != "CLASSIFIER_API_URL");
        env.push(("CLASSIFIER_API_URL", "not a url"));
        let err = AppConfig::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "CLASSIFIER_API_URL",
                ..
            }
        ));
    }

    #[test]
    fn model_override_from_env() {
        let mut env = base_env();
        env.push(("VALIDATOR_MODEL", "gpt-4o"));
        let config = AppConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.pipeline.validator.model, "gpt-4o");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml(
            "version: 1.1\nimage:\n  max_edge: 256\nclassifier:\n  timeout_secs: 15\n",
        )
        .unwrap();
        assert_eq!(config.image.max_edge, 256);
        assert_eq!(config.image.jpeg_quality, 80);
        assert_eq!(config.classifier.timeout(), Duration::from_secs(15));
        assert_eq!(config.validator.timeout_secs, 30);
        assert!(config.validator.prompt.contains("isRetinal"));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let err = PipelineConfig::from_yaml("image:\n  jpeg_quality: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "image.jpeg_quality",
                ..
            }
        ));
    }

    #[test]
    fn shipped_config_parses() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/pipeline.yaml");
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.image.max_upload_bytes, 5 * 1024 * 1024);
    }
}
