//! LLM-backed English-to-SQL translator.
//!
//! HTTP client against an OpenAI-compatible chat-completions endpoint. The
//! prompt pins the `users` schema and role encodings and carries a few
//! question/SQL example pairs so small models stay on format. Models still
//! occasionally wrap output in code fences despite being told not to, so
//! the response is de-fenced before being handed back.

use crate::error::{Error, Result};
use crate::query::QueryTranslator;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Default chat-completions endpoint (Groq's OpenAI-compatible API).
const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default translation model.
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Hard cap on one translation round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// System prompt pinning the schema the model translates against.
const SYSTEM_PROMPT: &str = "\
You are an expert in converting English questions to SQL code!
The SQL database has the name users and has the following columns:
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    name TEXT,
    role INTEGER NOT NULL DEFAULT 2,
    karma REAL NOT NULL DEFAULT 0

role = 0 for admin, role = 1 for moderator/mod, role = 2 for user.
The SQL code should not have ``` fences or the word sql in the output.";

/// Few-shot examples keeping small models on format.
const EXAMPLES: [(&str, &str); 4] = [
    ("How many admins are there", "select count(*) from users where role=0"),
    ("Give name of all users", "select name from users where role=2"),
    ("Tell me the names of everyone", "select name from users"),
    ("Tell me who are suspicious users", "select * from users where karma<-2"),
];

/// Chat-completions translator configuration.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key: None,
        }
    }
}

/// Translator backed by a remote chat-completions API.
pub struct LlmTranslator {
    client: reqwest::Client,
    config: TranslatorConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl LlmTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    fn messages(text: &str) -> Vec<serde_json::Value> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": SYSTEM_PROMPT,
        })];
        for (question, sql) in EXAMPLES {
            messages.push(serde_json::json!({"role": "user", "content": question}));
            messages.push(serde_json::json!({"role": "assistant", "content": sql}));
        }
        messages.push(serde_json::json!({"role": "user", "content": text}));
        messages
    }
}

#[async_trait]
impl QueryTranslator for LlmTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": Self::messages(text),
            "temperature": 0.0,
        });

        let mut request = self.client.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Execution(format!("translator request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Execution(format!(
                "translator returned HTTP {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Execution(format!("translator response unreadable: {e}")))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::Execution("translator returned no choices".into()))?;

        let sql = strip_fences(content);
        tracing::debug!(question = text, sql = %sql, "query translated");
        Ok(sql)
    }
}

/// Remove markdown code fences and a leading `sql` tag if the model added
/// them anyway.
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim().to_string()
}
