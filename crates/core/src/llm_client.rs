use crate::conversation::{ChatTurn, Role};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;

/// Sampling parameters applied to every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// A generic client for interacting with a chat-completion LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming completion call and returns its text.
    ///
    /// An empty completion is reported as an error; callers only ever need
    /// to tell "got text" from "did not get text".
    async fn complete(&self, messages: Vec<ChatTurn>) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API (Groq, OpenAI...).
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    settings: CompletionSettings,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `settings` - Model identifier and sampling parameters for chat completions.
    pub fn new(config: OpenAIConfig, settings: CompletionSettings) -> Self {
        Self {
            client: Client::with_config(config),
            settings,
        }
    }
}

fn to_request_message(turn: ChatTurn) -> Result<ChatCompletionRequestMessage> {
    let message = match turn.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
    };
    Ok(message)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, messages: Vec<ChatTurn>) -> Result<String> {
        let messages = messages
            .into_iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .temperature(self.settings.temperature)
            .max_completion_tokens(self.settings.max_tokens)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .filter(|text| !text.trim().is_empty())
            .context("LLM response had no text content")?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_converts_to_a_request_message() {
        let system = to_request_message(ChatTurn::system("be brief")).unwrap();
        let user = to_request_message(ChatTurn::user("hello")).unwrap();
        let assistant = to_request_message(ChatTurn::assistant("hi")).unwrap();

        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));
        assert!(matches!(assistant, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn default_settings_match_the_hosted_model() {
        let settings = CompletionSettings::default();
        assert_eq!(settings.model, "llama-3.3-70b-versatile");
        assert_eq!(settings.max_tokens, 1024);
    }
}
