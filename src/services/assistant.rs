use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::AssistantConfig;
use crate::error::{RecipeError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{}: {}", code, message),
            (Some(code), None) => write!(f, "{}", code),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub usage: Option<RunUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Serialize)]
struct NewRun<'a> {
    assistant_id: &'a str,
}

/// Thread, message and run primitives of an assistants-style API.
#[async_trait::async_trait]
pub trait AssistantThreads: Send + Sync {
    async fn create_thread(&self) -> Result<Thread>;
    async fn add_message(&self, thread_id: &str, message: &NewMessage) -> Result<()>;
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;
    /// Messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

/// Upper bound for a single assistant API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI Assistants v2 REST client.
pub struct OpenAiAssistantClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl OpenAiAssistantClient {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| RecipeError::Analysis(format!("assistant request failed: {}", e)))?;

        let status = response.status();
        log::debug!("📥 Assistant API response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Assistant API error response: {}", error_text);
            return Err(RecipeError::Analysis(format!(
                "assistant API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RecipeError::Analysis(format!("unexpected assistant API response: {}", e)))
    }
}

#[async_trait::async_trait]
impl AssistantThreads for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<Thread> {
        let url = self.api_url("/threads");
        self.send(self.client.post(&url).json(&serde_json::json!({}))).await
    }

    async fn add_message(&self, thread_id: &str, message: &NewMessage) -> Result<()> {
        let url = self.api_url(&format!("/threads/{}/messages", thread_id));
        let _: serde_json::Value = self.send(self.client.post(&url).json(message)).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let url = self.api_url(&format!("/threads/{}/runs", thread_id));
        self.send(self.client.post(&url).json(&NewRun { assistant_id })).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = self.api_url(&format!("/threads/{}/runs/{}", thread_id, run_id));
        self.send(self.client.get(&url)).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let url = self.api_url(&format!("/threads/{}/messages", thread_id));
        let list: MessageList = self.send(self.client.get(&url)).await?;
        Ok(list.data)
    }
}
