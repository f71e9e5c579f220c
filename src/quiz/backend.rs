use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::types::{ChatMessage, CompletionResponse, Role as ChatRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Hard failures of the completion service. These are never retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("completion request failed: {0}")]
    Transport(#[from] chatgpt::err::Error),
    #[error("completion service returned no choices")]
    EmptyResponse,
}

/// Anything that turns a list of chat messages into a single reply text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, BackendError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct ChatGptBackend {
    client: ChatGPT,
}

impl ChatGptBackend {
    pub fn new(client: ChatGPT) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionBackend for ChatGptBackend {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, BackendError> {
        let history = messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    Role::System => ChatRole::System,
                    Role::User => ChatRole::User,
                },
                content: m.content.clone(),
            })
            .collect::<Vec<_>>();

        let response: CompletionResponse = self.client.send_history(&history).await?;
        let content = response
            .message_choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or(BackendError::EmptyResponse)?;

        log::debug!("Completion: {:?}", content);

        Ok(content)
    }
}
