use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::{EngineError, Result};
use crate::settings::GeneratorSettings;
use crate::utils::truncate_for_log;

/// Free-text completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    async fn is_available(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Ollama-compatible `/api/generate` client.
pub struct OllamaClient {
    client: Client,
    url: String,
    tags_url: String,
    model: String,
    temperature: f64,
    top_p: f64,
    num_predict: u32,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(settings: &GeneratorSettings) -> Self {
        Self {
            client: Client::new(),
            url: settings.url.clone(),
            tags_url: settings.tags_url.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            num_predict: settings.num_predict,
            request_timeout: Duration::from_millis(settings.timeout_ms.max(1)),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_predict: self.num_predict,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let body: GenerateResponse = serde_json::from_str(&text)
            .map_err(|err| EngineError::malformed(err.to_string(), truncate_for_log(&text, 500)))?;
        Ok(body.response)
    }

    async fn is_available(&self) -> bool {
        let response = match self
            .client
            .get(&self.tags_url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            _ => return false,
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.iter().any(|m| {
                m.name == self.model || m.name.split(':').next() == Some(self.model.as_str())
            }),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, Canned};

    fn client(base: &str, model: &str) -> OllamaClient {
        OllamaClient::new(&GeneratorSettings {
            url: format!("{base}/api/generate"),
            tags_url: format!("{base}/api/tags"),
            model: model.into(),
            timeout_ms: 2000,
            ..GeneratorSettings::default()
        })
    }

    #[tokio::test]
    async fn test_generate_returns_response_field() {
        let base = serve(vec![(
            "/api/generate",
            Canned::ok(r#"{"model":"gemma2:9b","response":"{\"reasoning\":\"ok\"}","done":true}"#),
        )])
        .await;
        let text = client(&base, "gemma2:9b").generate_text("hi").await.unwrap();
        assert_eq!(text, r#"{"reasoning":"ok"}"#);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let base = serve(vec![("/api/generate", Canned::status(500, "boom"))]).await;
        let err = client(&base, "gemma2:9b").generate_text("hi").await.unwrap_err();
        assert!(matches!(err, EngineError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_body_without_response_is_malformed() {
        let base = serve(vec![("/api/generate", Canned::ok("not json at all"))]).await;
        let err = client(&base, "gemma2:9b").generate_text("hi").await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_availability_checks_model_list() {
        let base = serve(vec![(
            "/api/tags",
            Canned::ok(r#"{"models":[{"name":"gemma2:9b"},{"name":"llama3:latest"}]}"#),
        )])
        .await;
        assert!(client(&base, "gemma2:9b").is_available().await);
        assert!(client(&base, "llama3").is_available().await);
        assert!(!client(&base, "mistral").is_available().await);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let generator = client("http://127.0.0.1:9", "gemma2:9b");
        assert!(!generator.is_available().await);
    }
}
