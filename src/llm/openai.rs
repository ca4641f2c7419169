//! OpenAI-compatible chat-completions provider

use super::{InferenceProvider, InferenceRequest, LlmError};
use crate::config::CHAT_TEMPERATURE;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ImageDetail, ImageUrlArgs,
};
use async_openai::Client;

/// Provider for any endpoint speaking the OpenAI chat-completions protocol
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a provider for `api_base` authenticated with `api_key`
    #[must_use]
    pub fn new(api_key: &str, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
        }
    }
}

fn invalid(e: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidRequest(e.to_string())
}

/// System message plus a user message that is plain text, or text and an
/// image part when the request carries one.
fn build_messages(request: &InferenceRequest) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(request.system.as_str())
        .build()
        .map_err(invalid)?
        .into();

    let user = match &request.image {
        None => ChatCompletionRequestUserMessageArgs::default()
            .content(request.text.as_str())
            .build()
            .map_err(invalid)?,
        Some(image) => {
            let text: ChatCompletionRequestUserMessageContentPart =
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(request.text.as_str())
                    .build()
                    .map_err(invalid)?
                    .into();
            let picture: ChatCompletionRequestUserMessageContentPart =
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(
                        ImageUrlArgs::default()
                            .url(image.to_data_url())
                            .detail(ImageDetail::High)
                            .build()
                            .map_err(invalid)?,
                    )
                    .build()
                    .map_err(invalid)?
                    .into();
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![text, picture])
                .build()
                .map_err(invalid)?
        }
    };

    Ok(vec![system, user.into()])
}

fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::Reqwest(e) => LlmError::NetworkError(e.to_string()),
        OpenAIError::ApiError(e) => LlmError::ApiError(e.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg),
        other => LlmError::Unknown(other.to_string()),
    }
}

fn extract_text(response: &CreateChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait::async_trait]
impl InferenceProvider for OpenAiProvider {
    async fn complete(&self, request: &InferenceRequest, model: &str) -> Result<String, LlmError> {
        let chat = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(build_messages(request)?)
            .max_tokens(request.max_tokens)
            .temperature(CHAT_TEMPERATURE)
            .build()
            .map_err(invalid)?;

        let response = self
            .client
            .chat()
            .create(chat)
            .await
            .map_err(map_openai_error)?;

        extract_text(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompts;
    use crate::preprocessor::EncodedImage;

    #[test]
    fn test_text_request_has_system_and_user() -> Result<(), LlmError> {
        let messages = build_messages(&prompts::signal("VDI 80"))?;
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        Ok(())
    }

    #[test]
    fn test_image_request_carries_data_url() -> Result<(), LlmError> {
        let image = EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            width: 1,
            height: 1,
        };
        let messages = build_messages(&prompts::image_analysis(image, None))?;
        let ChatCompletionRequestMessage::User(user) = &messages[1] else {
            panic!("expected a user message");
        };
        let debug = format!("{:?}", user.content);
        assert!(debug.contains("data:image/jpeg;base64,/9j/"));
        Ok(())
    }
}
