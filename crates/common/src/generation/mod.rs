//! Text generation abstraction
//!
//! Provides:
//! - Call presets tuned per use (quick, reading, summary, warm-up)
//! - An Ollama `/api/generate` client with per-call timeouts
//! - A scriptable mock for tests

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::metrics::GatewayTimer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a generation call is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Quick,
    Reading,
    Summary,
    WarmUp,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Quick => "quick",
            CallKind::Reading => "reading",
            CallKind::Summary => "summary",
            CallKind::WarmUp => "warm_up",
        }
    }
}

/// Sampling and timeout settings for one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub kind: CallKind,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repeat_penalty: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

fn stops(sequences: &[&str]) -> Vec<String> {
    sequences.iter().map(|s| s.to_string()).collect()
}

impl GenerationOptions {
    /// Short, low-temperature answers
    pub fn quick() -> Self {
        Self {
            kind: CallKind::Quick,
            max_tokens: 400,
            temperature: 0.1,
            top_p: Some(0.9),
            top_k: None,
            repeat_penalty: Some(1.1),
            stop_sequences: Vec::new(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Grounded answers over retrieved protocol text
    pub fn reading() -> Self {
        Self {
            kind: CallKind::Reading,
            max_tokens: 500,
            temperature: 0.2,
            top_p: Some(0.85),
            top_k: Some(25),
            repeat_penalty: Some(1.15),
            stop_sequences: stops(&["Human:", "Question:", "User:", "\n\nQ:", "\n\nQuestion:"]),
            timeout: Duration::from_secs(45),
        }
    }

    /// Executive prose over approved sections
    pub fn summary() -> Self {
        Self {
            kind: CallKind::Summary,
            max_tokens: 600,
            temperature: 0.2,
            top_p: Some(0.8),
            top_k: Some(30),
            repeat_penalty: Some(1.2),
            stop_sequences: stops(&["Human:", "User:", "Question:", "\n\nQuestion:", "\n\nUser:"]),
            timeout: Duration::from_secs(45),
        }
    }

    /// Tiny probe that loads the model
    pub fn warm_up() -> Self {
        Self {
            kind: CallKind::WarmUp,
            max_tokens: 10,
            temperature: 0.1,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            stop_sequences: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl GenerationConfig {
    /// Preset for `kind` with the configured timeout applied
    pub fn options(&self, kind: CallKind) -> GenerationOptions {
        let (preset, secs) = match kind {
            CallKind::Quick => (GenerationOptions::quick(), self.quick_timeout_secs),
            CallKind::Reading => (GenerationOptions::reading(), self.reading_timeout_secs),
            CallKind::Summary => (GenerationOptions::summary(), self.summary_timeout_secs),
            CallKind::WarmUp => (GenerationOptions::warm_up(), self.warm_up_timeout_secs),
        };
        preset.with_timeout(Duration::from_secs(secs))
    }
}

/// Trait for text generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Ollama generation client
pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        // Timeouts are set per request from the call preset
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
        })
    }

    async fn make_request(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: options.top_p,
                top_k: options.top_k,
                repeat_penalty: options.repeat_penalty,
                stop: options.stop_sequences.clone(),
            },
        };

        let response = self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::generation_transport(e, options.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::generation_transport(e, options.timeout))?;

        let text = result.response.trim();
        if text.is_empty() {
            return Err(AppError::GenerationEmpty);
        }
        Ok(text.to_string())
    }
}

fn outcome_label(result: &Result<String>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.is_timeout() => "timeout",
        Err(AppError::GenerationEmpty) => "empty",
        Err(_) => "error",
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let timer = GatewayTimer::generation(options.kind.as_str());
        let result = self.make_request(prompt, options).await;
        timer.finish(outcome_label(&result));
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Scriptable generator for tests and offline runs
///
/// The responder sees the full prompt, so tests can branch on the question.
pub struct MockGenerator {
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Echo the first context block back, which keeps answers grounded offline
    pub fn echo_context() -> Self {
        Self::new(|prompt| {
            let body = prompt
                .split("[Source:")
                .nth(1)
                .and_then(|block| block.split_once("]\n"))
                .map(|(_, text)| text.split("\n\n").next().unwrap_or_default().trim().to_string())
                .unwrap_or_default();
            if body.is_empty() {
                Err(AppError::GenerationEmpty)
            } else {
                Ok(body)
            }
        })
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "mock" => Ok(Arc::new(MockGenerator::echo_context())),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider: {}", other),
        }),
    }
}

/// Outcome of the start-up probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WarmUpStatus {
    Ready { latency_ms: u64 },
    Unavailable { reason: String },
}

impl WarmUpStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, WarmUpStatus::Ready { .. })
    }
}

pub const WARM_UP_PROMPT: &str = "Hello, respond with just 'Ready'";

/// Send one tiny prompt so the provider loads the model
pub async fn warm_up(generator: &dyn Generator, options: &GenerationOptions) -> WarmUpStatus {
    let start = Instant::now();
    match generator.generate(WARM_UP_PROMPT, options).await {
        Ok(_) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            tracing::info!(latency_ms, model = generator.model_name(), "Generation model ready");
            WarmUpStatus::Ready { latency_ms }
        }
        Err(e) => {
            tracing::warn!(error = %e, model = generator.model_name(), "Generation warm-up failed");
            WarmUpStatus::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
