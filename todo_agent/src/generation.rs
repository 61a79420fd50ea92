// src/generation.rs -----------------------------------------------------------
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;

use crate::{config::GenerationConfig, error::GenerationError, prompt::Prompt};

type OAClient = Client<OpenAIConfig>;

#[async_trait]
pub trait Generator: Send + Sync {
    /// One call, no retry, no streaming.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Chat completions against any OpenAI-compatible endpoint (Gemini by default).
pub struct ChatGenerator {
    client: OAClient,
    model:  String,
}

impl ChatGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        let client = OAClient::with_config(
            OpenAIConfig::new()
                .with_api_base(&config.api_base)
                .with_api_key(&config.api_key),
        );
        Self {
            client,
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let req = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(
                        prompt.as_str().to_owned(),
                    ),
                    ..Default::default()
                },
            )])
            .build()?;

        let resp = self.client.chat().create(req).await?;
        first_text(resp).ok_or(GenerationError::EmptyResponse)
    }
}

// Blank text is still an answer; the normalizer turns it into no tasks.
fn first_text(resp: CreateChatCompletionResponse) -> Option<String> {
    resp.choices
        .into_iter()
        .find_map(|choice| choice.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(contents: &[Option<&str>]) -> CreateChatCompletionResponse {
        let choices: Vec<_> = contents
            .iter()
            .enumerate()
            .map(|(index, content)| {
                json!({
                    "index": index,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop",
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_760_000_000,
            "model": "gemini-2.5-pro",
            "choices": choices,
        }))
        .unwrap()
    }

    #[test]
    fn whitespace_reply_is_returned_as_is() {
        assert_eq!(first_text(response(&[Some("   \n")])).as_deref(), Some("   \n"));
    }

    #[test]
    fn blank_reply_normalizes_to_no_tasks() {
        let text = first_text(response(&[Some("  ")])).unwrap();
        assert!(crate::normalize::normalize(&text).is_empty());
    }

    #[test]
    fn first_choice_with_content_wins() {
        let resp = response(&[None, Some("[\"Pay rent\"]"), Some("[\"other\"]")]);
        assert_eq!(first_text(resp).as_deref(), Some("[\"Pay rent\"]"));
    }

    #[test]
    fn no_content_at_all_is_none() {
        assert_eq!(first_text(response(&[None])), None);
        assert_eq!(first_text(response(&[])), None);
    }
}
