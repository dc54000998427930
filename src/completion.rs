//! The generation-service contract: an ordered list of role-tagged turns in,
//! one completion text out. The engine only ever talks to this trait, which
//! keeps it testable against scripted services.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::error::CompletionError;
use crate::turn::{Role, Turn};

#[derive(Clone, Copy, Debug)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Story turns want some heat; summaries want consistency.
pub const STORY_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.7,
    max_tokens: 1000,
};

pub const SUMMARY_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.3,
    max_tokens: 500,
};

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        params: SamplingParams,
    ) -> Result<String, CompletionError>;
}

/// OpenAI-backed implementation over the chat completions endpoint.
pub struct OpenAiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiService {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenAiService {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

fn to_request_message(turn: &Turn) -> Result<ChatCompletionRequestMessage, CompletionError> {
    let message = match turn.role {
        Role::Director => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into(),
        Role::Narrator => ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into(),
        Role::Player => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into(),
    };
    Ok(message)
}

#[async_trait]
impl CompletionService for OpenAiService {
    async fn complete(
        &self,
        turns: &[Turn],
        params: SamplingParams,
    ) -> Result<String, CompletionError> {
        let messages = turns
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(params.temperature)
            .max_completion_tokens(params.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyCompletion)
    }
}
