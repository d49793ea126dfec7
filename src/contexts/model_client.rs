use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::SamplingOptions;
use crate::data::CompletionModel;

const TAGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup failures talking to the inference endpoint.
#[derive(Debug, Error)]
pub enum ModelClientError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("cannot reach inference endpoint at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("inference endpoint at {url} did not answer within {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("inference endpoint returned status {0} when listing models")]
    Status(u16),
    #[error("cannot decode model list: {0}")]
    InvalidTags(#[source] reqwest::Error),
    #[error("no models are installed on the inference endpoint")]
    NoModelsInstalled,
}

/// The model picked at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub name: String,
    /// True when none of the preferred candidates were installed.
    pub fallback: bool,
}

/// Picks the first candidate that is installed, else the first installed model.
pub fn select_model(candidates: &[String], installed: &[String]) -> Option<ModelChoice> {
    if let Some(name) = candidates.iter().find(|c| installed.contains(c)) {
        return Some(ModelChoice {
            name: name.clone(),
            fallback: false,
        });
    }
    installed.first().map(|name| ModelChoice {
        name: name.clone(),
        fallback: true,
    })
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: &'a SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
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

/// Client for an Ollama-compatible `/api/generate` endpoint.
///
/// Holds the model selected at startup; every call is otherwise stateless.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    sampling: SamplingOptions,
}

impl OllamaClient {
    /// Creates a client bound to an already-known model.
    pub fn with_model(
        base_url: &str,
        model: impl Into<String>,
        sampling: SamplingOptions,
    ) -> Result<Self, ModelClientError> {
        let client = Client::builder()
            .build()
            .map_err(ModelClientError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            sampling,
        })
    }

    /// Queries the endpoint for installed models and binds to the best one.
    ///
    /// # Arguments
    /// * `base_url` - Endpoint base address, e.g. `http://localhost:11434`
    /// * `candidates` - Preferred model identifiers, most preferred first
    /// * `sampling` - Per-request sampling parameters
    pub async fn connect(
        base_url: &str,
        candidates: &[String],
        sampling: SamplingOptions,
    ) -> Result<(Self, ModelChoice), ModelClientError> {
        let mut client = Self::with_model(base_url, String::new(), sampling)?;
        let installed = client.installed_models().await?;
        debug!("Installed models: {:?}", installed);

        let choice =
            select_model(candidates, &installed).ok_or(ModelClientError::NoModelsInstalled)?;
        if choice.fallback {
            warn!(
                "None of the preferred models {:?} are installed; falling back to '{}'",
                candidates, choice.name
            );
        } else {
            info!("Using model: {}", choice.name);
        }

        client.model = choice.name.clone();
        Ok((client, choice))
    }

    /// Lists the names reported by `GET /api/tags`.
    pub async fn installed_models(&self) -> Result<Vec<String>, ModelClientError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = timeout(TAGS_TIMEOUT, self.client.get(&url).send())
            .await
            .map_err(|_| ModelClientError::Timeout {
                url: url.clone(),
                secs: TAGS_TIMEOUT.as_secs(),
            })?
            .map_err(|source| ModelClientError::Unreachable {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ModelClientError::Status(response.status().as_u16()));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(ModelClientError::InvalidTags)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: user_prompt,
            system: system_prompt,
            stream: false,
            options: &self.sampling,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("endpoint returned {}: {}", status, body.trim()));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| format!("cannot decode response: {}", e))?;
        Ok(data.response)
    }
}

#[async_trait]
impl CompletionModel for OllamaClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, limit: Duration) -> String {
        if self.model.is_empty() {
            error!("No model selected");
            return String::new();
        }

        let started = Instant::now();
        debug!(
            "Sending completion request to {} (model {}, timeout {}s)",
            self.base_url,
            self.model,
            limit.as_secs()
        );

        match timeout(limit, self.generate(system_prompt, user_prompt)).await {
            Ok(Ok(text)) => {
                info!(
                    "Completion finished in {}ms ({} chars)",
                    started.elapsed().as_millis(),
                    text.len()
                );
                text
            }
            Ok(Err(reason)) => {
                error!("LLM call failed: {}", reason);
                String::new()
            }
            Err(_) => {
                error!("LLM request timed out after {}s", limit.as_secs());
                String::new()
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn mount_tags(server: &MockServer, models: &[&str]) {
        let body = json!({
            "models": models.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>()
        });
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn prefers_candidates_in_order() {
        let choice = select_model(
            &names(&["qwen2.5-coder:32b", "codellama:13b"]),
            &names(&["llama3:8b", "codellama:13b", "qwen2.5-coder:32b"]),
        )
        .unwrap();
        assert_eq!(choice.name, "qwen2.5-coder:32b");
        assert!(!choice.fallback);
    }

    #[test]
    fn falls_back_to_first_installed() {
        let choice = select_model(&names(&["qwen2.5-coder:32b"]), &names(&["llama3:8b"])).unwrap();
        assert_eq!(choice.name, "llama3:8b");
        assert!(choice.fallback);
    }

    #[test]
    fn nothing_installed_means_no_choice() {
        assert!(select_model(&names(&["qwen2.5-coder:32b"]), &[]).is_none());
    }

    #[tokio::test]
    async fn connect_binds_preferred_model() {
        let server = MockServer::start().await;
        mount_tags(&server, &["llama3:8b", "deepseek-coder:6.7b"]).await;

        let (client, choice) = OllamaClient::connect(
            &server.uri(),
            &names(&["qwen2.5-coder:32b", "deepseek-coder:6.7b"]),
            SamplingOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(choice.name, "deepseek-coder:6.7b");
        assert_eq!(client.model_name(), "deepseek-coder:6.7b");
    }

    #[tokio::test]
    async fn connect_fails_without_models() {
        let server = MockServer::start().await;
        mount_tags(&server, &[]).await;

        let err = OllamaClient::connect(&server.uri(), &names(&["x"]), SamplingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelClientError::NoModelsInstalled));
    }

    #[tokio::test]
    async fn connect_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = OllamaClient::connect(&server.uri(), &names(&["x"]), SamplingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelClientError::Status(503)));
    }

    #[tokio::test]
    async fn complete_sends_expected_body_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "prompt": "user text",
                "system": "system text",
                "stream": false,
                "options": { "top_k": 40, "num_ctx": 4096 }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "response": "{\"a\": \"b\"}" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OllamaClient::with_model(&server.uri(), "test-model", SamplingOptions::default())
                .unwrap();
        let text = client
            .complete("system text", "user text", Duration::from_secs(5))
            .await;
        assert_eq!(text, "{\"a\": \"b\"}");
    }

    #[tokio::test]
    async fn complete_returns_empty_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client =
            OllamaClient::with_model(&server.uri(), "m", SamplingOptions::default()).unwrap();
        assert_eq!(client.complete("s", "u", Duration::from_secs(5)).await, "");
    }

    #[tokio::test]
    async fn complete_returns_empty_on_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client =
            OllamaClient::with_model(&server.uri(), "m", SamplingOptions::default()).unwrap();
        assert_eq!(client.complete("s", "u", Duration::from_secs(5)).await, "");
    }

    #[tokio::test]
    async fn complete_gives_up_at_the_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": "late" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client =
            OllamaClient::with_model(&server.uri(), "m", SamplingOptions::default()).unwrap();
        let started = Instant::now();
        let text = client.complete("s", "u", Duration::from_secs(1)).await;

        assert_eq!(text, "");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
