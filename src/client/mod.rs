//! Classification API client.
//!
//! Uploads an image as `multipart/form-data` and decodes the JSON
//! label → probability map the classifier answers with.

use crate::input::ImageInput;
use crate::models::ClassificationMap;
use anyhow::{anyhow, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the classifier client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Multipart field name the server reads the image from.
    pub field_name: String,
    pub timeout_seconds: u64,
    /// Retries after the first attempt.
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api/predict".to_string(),
            field_name: "file".to_string(),
            timeout_seconds: 60,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl From<&crate::config::ApiConfig> for ClientConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            api_url: config.url.clone(),
            field_name: config.field_name.clone(),
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Error body returned by the classifier on bad requests.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Outcome of a single request attempt.
enum AttemptError {
    /// Worth another attempt (connection, timeout, 5xx).
    Retryable(anyhow::Error),
    /// Will fail the same way again (4xx, bad body).
    Fatal(anyhow::Error),
}

/// Client for the plant disease classification API.
pub struct ClassifierClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl ClassifierClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Endpoint this client posts to.
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// Upload an image and return the classifier's probability map.
    pub async fn classify(&self, image: &ImageInput) -> Result<ClassificationMap> {
        let attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(
                "Uploading {} to {} (attempt {}/{})",
                image.file_name, self.config.api_url, attempt, attempts
            );

            match self.send_once(image).await {
                Ok(map) => {
                    info!("Classifier returned {} labels", map.len());
                    return Ok(map);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) => {
                    if attempt < attempts {
                        warn!("Attempt {} failed: {}. Retrying...", attempt, e);
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No request was made")))
    }

    async fn send_once(&self, image: &ImageInput) -> Result<ClassificationMap, AttemptError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime_type)
            .map_err(|e| AttemptError::Fatal(anyhow!("Invalid MIME type: {}", e)))?;
        let form = Form::new().part(self.config.field_name.clone(), part);

        let response = self
            .http_client
            .post(&self.config.api_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Retryable(anyhow!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    AttemptError::Retryable(anyhow!(
                        "Cannot connect to classifier at {}",
                        self.config.api_url
                    ))
                } else {
                    AttemptError::Retryable(anyhow!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = anyhow!("Classifier API error {}: {}", status, error_message(&body));
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                AttemptError::Retryable(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        response
            .json::<ClassificationMap>()
            .await
            .map_err(|e| AttemptError::Fatal(anyhow!("Failed to parse classifier response: {}", e)))
    }
}

/// Extract the message from an `{"error": ...}` body, or return the body as-is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Built-in example response, used when fallback to sample data is enabled.
pub fn sample_classification() -> ClassificationMap {
    [
        ("Manzana___Podredumbre_negra", 0.022210918366909027),
        ("Manzana___Roña_del_manzano", 0.6731756329536438),
        ("Manzana___saludable", 0.2475418746471405),
        ("Maíz___Mancha_foliar_por_Cercospora", 0.02118958719074726),
        ("Maíz___Tizón_foliar_norteño", 0.0009554149582982063),
        ("Maíz___saludable", 0.013545230962336063),
        ("Tomate___Mancha_foliar_por_Septoriosis", 0.007391240913420916),
        ("Tomate___Tizón_tardío", 0.0006959199672564864),
        ("Tomate___saludable", 0.002276195678859949),
        ("Uva___Sarampión_negro", 0.0017166787292808294),
        ("Uva___Tizón_foliar_Isariopsis", 0.001491655595600605),
        ("Uva___saludable", 0.007809591479599476),
    ]
    .into_iter()
    .map(|(label, p)| (label.to_string(), p))
    .collect()
}
