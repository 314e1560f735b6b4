//! HTTP embedding providers.
//!
//! `openai` talks to any OpenAI-compatible `POST {api_base}/embeddings`
//! endpoint (batched); `ollama` calls `POST {api_base}/api/embeddings` once per
//! text. Responses are folded to the configured dimension and normalized.
//! Errors are reported, never retried.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::{l2_normalize, EmbeddingProvider};
use crate::config::EmbeddingConfig;

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";
const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    OpenAi,
    Ollama,
}

pub struct RemoteEmbeddingProvider {
    flavor: Flavor,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
    name: String,
}

impl RemoteEmbeddingProvider {
    pub fn openai(config: &EmbeddingConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.api_key.is_empty(),
            "openai embeddings need embedding.api_key or OPENAI_API_KEY"
        );
        Ok(Self::build(
            Flavor::OpenAi,
            config,
            OPENAI_DEFAULT_BASE,
            OPENAI_DEFAULT_MODEL,
        ))
    }

    pub fn ollama(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::build(
            Flavor::Ollama,
            config,
            OLLAMA_DEFAULT_BASE,
            OLLAMA_DEFAULT_MODEL,
        ))
    }

    fn build(
        flavor: Flavor,
        config: &EmbeddingConfig,
        default_base: &str,
        default_model: &str,
    ) -> Self {
        let api_base = match config.api_base.trim_end_matches('/') {
            "" => default_base.to_string(),
            base => base.to_string(),
        };
        // the stock model name belongs to the hashed provider
        let model = match config.model.as_str() {
            "" | "fnv1a-trigram" => default_model.to_string(),
            m => m.to_string(),
        };
        let prefix = match flavor {
            Flavor::OpenAi => "openai",
            Flavor::Ollama => "ollama",
        };
        Self {
            flavor,
            name: format!("{prefix}/{model}"),
            api_base,
            api_key: config.api_key.clone(),
            model,
            dimensions: config.dimensions.max(1),
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
        }
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build embedding client")
    }

    fn post(&self, url: String, body: Value) -> Result<Value> {
        let mut request = self.client()?.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request
            .send()
            .with_context(|| format!("embedding request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "embedding request failed with status {}: {}",
                status.as_u16(),
                body.chars().take(240).collect::<String>()
            );
        }
        response
            .json::<Value>()
            .context("failed to parse embedding response json")
    }

    fn embed_openai(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let payload = self.post(
            format!("{}/embeddings", self.api_base),
            serde_json::json!({ "model": self.model, "input": texts }),
        )?;
        let data = payload
            .get("data")
            .and_then(Value::as_array)
            .context("embedding response missing data array")?;
        if data.len() != texts.len() {
            bail!(
                "embedding response size mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            );
        }
        data.iter()
            .map(|item| {
                let raw = item
                    .get("embedding")
                    .context("embedding item missing embedding array")?;
                self.parse_vector(raw)
            })
            .collect()
    }

    fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        let payload = self.post(
            format!("{}/api/embeddings", self.api_base),
            serde_json::json!({ "model": self.model, "prompt": text }),
        )?;
        let raw = payload
            .get("embedding")
            .context("ollama response missing embedding array")?;
        self.parse_vector(raw)
    }

    fn parse_vector(&self, raw: &Value) -> Result<Vec<f32>> {
        let values = raw
            .as_array()
            .context("embedding must be an array")?
            .iter()
            .map(|c| {
                c.as_f64()
                    .map(|v| v as f32)
                    .context("embedding component must be numeric")
            })
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            bail!("embedding response contained an empty vector");
        }
        Ok(fold_to_dimensions(&values, self.dimensions))
    }
}

impl EmbeddingProvider for RemoteEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.flavor {
            Flavor::OpenAi => self
                .embed_openai(&[text])?
                .into_iter()
                .next()
                .context("embedding response was empty"),
            Flavor::Ollama => self.embed_ollama(text),
        }
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.flavor {
            Flavor::OpenAi => self.embed_openai(texts),
            Flavor::Ollama => texts.iter().map(|t| self.embed_ollama(t)).collect(),
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fold a vector of any length into `dimensions` buckets, then normalize.
fn fold_to_dimensions(values: &[f32], dimensions: usize) -> Vec<f32> {
    let mut resized = vec![0.0f32; dimensions];
    for (index, value) in values.iter().enumerate() {
        resized[index % dimensions] += *value;
    }
    l2_normalize(&mut resized);
    resized
}
