use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AnswerGenerator, RagError};
use crate::config::RagConfig;

const SERVICE: &str = "groq";
const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 2048;

/// Groq's OpenAI-compatible chat completions endpoint
pub struct GroqGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

impl GroqGenerator {
    pub fn from_config(client: reqwest::Client, config: &RagConfig) -> Self {
        Self {
            client,
            api_key: config.groq_api_key.clone(),
            url: config.groq_url.clone(),
            model: config.groq_model.clone(),
        }
    }

    pub fn chat_request(&self, system: &str, user: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        })
    }
}

fn parse_answer(body: Value) -> Result<String, RagError> {
    let response: ChatResponse =
        serde_json::from_value(body).map_err(|e| RagError::invalid(SERVICE, e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RagError::invalid(SERVICE, "completion has no content"))
}

#[async_trait]
impl AnswerGenerator for GroqGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String, RagError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(RagError::NotConfigured("GROQ_API_KEY"))?;

        let body = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&self.chat_request(system, user))
            .send()
            .await
            .map_err(|e| RagError::upstream(SERVICE, e))?
            .error_for_status()
            .map_err(|e| RagError::upstream(SERVICE, e))?
            .json::<Value>()
            .await
            .map_err(|e| RagError::upstream(SERVICE, e))?;

        let answer = parse_answer(body)?;
        tracing::debug!("Generated answer ({} chars) with {}", answer.len(), self.model);
        Ok(answer)
    }
}
