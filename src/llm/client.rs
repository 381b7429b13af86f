//! LLM clients: the production Ollama HTTP client and a scripted test double.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::LlmConfig;
use crate::core::errors::{Result, TqhError};

/// Text-generation capability. Implementations must be usable from
/// concurrent query pipelines, hence `Send + Sync`.
pub trait Llm: Send + Sync {
    /// Run one prompt to completion and return the generated text.
    ///
    /// Transport failures and timeouts return `LlmUnreachable`; callers remap
    /// per stage (translation vs. summarization).
    fn generate(&self, prompt: &str) -> Result<String>;
}

// ──────────────────── Ollama over HTTP ────────────────────

/// Blocking client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    agent: ureq::Agent,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Build a client with a per-call timeout baked into the agent.
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Endpoint URL used for generation calls.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .agent
            .post(&self.endpoint())
            .send_json(GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })?;
        let body: GenerateResponse =
            response
                .into_json()
                .map_err(|error| TqhError::LlmUnreachable {
                    context: "response body",
                    details: error.to_string(),
                })?;
        Ok(body.response)
    }
}

// ──────────────────── scripted double ────────────────────

/// Canned-response LLM for hermetic tests and offline development.
///
/// Responses are consumed in order; an exhausted script is a transport
/// failure, mirroring a dead endpoint.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts_seen: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts_seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of generation calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts_seen.lock().len()
    }

    /// Prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts_seen.lock().clone()
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts_seen.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| TqhError::LlmUnreachable {
                context: "scripted",
                details: "response script exhausted".to_string(),
            })
    }
}
