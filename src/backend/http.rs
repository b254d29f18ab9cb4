use super::traits::{Backend, GenerateOptions};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// HTTP client for the generation API.
///
/// No overall request timeout: a slow generation hangs only the one message
/// waiting on it, never the runtime. Connection establishment still times
/// out so a dead host fails fast.
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
    username: &'a str,
    use_history: bool,
    remove_sources: bool,
    use_proxies: bool,
    cookie_file: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    reply: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate(
        &self,
        message: &str,
        username: &str,
        opts: &GenerateOptions,
    ) -> anyhow::Result<String> {
        let request = GenerateRequest {
            message,
            username,
            use_history: opts.use_history,
            remove_sources: opts.remove_sources,
            use_proxies: opts.use_proxies,
            cookie_file: opts.cookie_file.to_string_lossy().into_owned(),
        };

        let mut req = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request);
        if let Some(key) = self.api_key.as_ref() {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("generation API returned {status}: {body}");
        }

        let parsed: GenerateResponse = response.json().await?;
        if parsed.reply.trim().is_empty() {
            anyhow::bail!("generation API returned an empty reply");
        }
        Ok(parsed.reply)
    }

    async fn health_check(&self) -> bool {
        // Any HTTP response counts as reachable; only transport errors fail.
        self.client.get(&self.base_url).send().await.is_ok()
    }
}
