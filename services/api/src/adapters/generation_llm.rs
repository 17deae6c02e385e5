//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the structured generation LLM.
//! It implements the `StructuredGenerationService` port from the `core` crate
//! using OpenAI chat completions with a JSON-schema response format.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
        ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use exam_forge_core::ports::{
    PortError, PortResult, StructuredGenerationService, StructuredPrompt,
};
use serde_json::Value;
use tracing::{debug, warn};

const SYSTEM_INSTRUCTIONS: &str = "You are ExamForge AI, an exam preparation assistant for students from Grade 9 to graduation. Follow the user's instructions exactly and reply with a single JSON object that matches the provided schema. Do not wrap the JSON in Markdown.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StructuredGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Builds the chat request: a system message, then the instruction and the
/// optional image as parts of one user message.
fn build_request(
    model: &str,
    prompt: StructuredPrompt,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
        ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt.instruction)
            .build()?
            .into(),
    ];

    if let Some(data_uri) = prompt.media {
        parts.push(
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(data_uri)
                        .detail(ImageDetail::Auto)
                        .build()?,
                )
                .build()?
                .into(),
        );
    }

    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_INSTRUCTIONS)
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()?
            .into(),
    ];

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .response_format(ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some(prompt.schema.description.to_string()),
                name: prompt.schema.name.to_string(),
                schema: Some(prompt.schema.schema),
                strict: Some(true),
            },
        })
        .n(1)
        .build()
}

/// Turns the text of the first choice into the generated object.
///
/// A missing or blank reply is "no output", not an error.
fn parse_content(content: Option<String>) -> PortResult<Option<Value>> {
    let Some(content) = content.filter(|text| !text.trim().is_empty()) else {
        return Ok(None);
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        PortError::Unexpected(format!("Generation LLM returned invalid JSON: {}", e))
    })
}

//=========================================================================================
// `StructuredGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StructuredGenerationService for OpenAiGenerationAdapter {
    async fn generate_structured(&self, prompt: StructuredPrompt) -> PortResult<Option<Value>> {
        let schema_name = prompt.schema.name;
        let request =
            build_request(&self.model, prompt).map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let Some(choice) = response.choices.into_iter().next() else {
            warn!("Generation LLM returned no choices for {}", schema_name);
            return Ok(None);
        };

        if let Some(refusal) = choice.message.refusal {
            warn!("Generation LLM refused {}: {}", schema_name, refusal);
            return Ok(None);
        }

        debug!("Generation LLM answered {}", schema_name);
        parse_content(choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_forge_core::schema::mcq_schema;
    use serde_json::json;

    fn prompt(media: Option<&str>) -> StructuredPrompt {
        StructuredPrompt {
            instruction: "Generate MCQs about osmosis.".to_string(),
            media: media.map(str::to_string),
            schema: mcq_schema(),
        }
    }

    #[test]
    fn request_uses_the_strict_json_schema_format() {
        let request = build_request("gpt-4o", prompt(None)).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "mcq_generator_output");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"][0]["text"], "Generate MCQs about osmosis.");
        assert_eq!(body["messages"][1]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn image_is_sent_as_a_second_content_part() {
        let request = build_request("gpt-4o", prompt(Some("data:image/png;base64,AAAA"))).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        let image = &body["messages"][1]["content"][1];
        assert_eq!(image["type"], "image_url");
        assert_eq!(image["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn blank_replies_are_no_output() {
        assert_eq!(parse_content(None).unwrap(), None);
        assert_eq!(parse_content(Some("  \n".to_string())).unwrap(), None);
    }

    #[test]
    fn replies_are_parsed_as_json() {
        let parsed = parse_content(Some(r#"{"mcqs": []}"#.to_string())).unwrap();
        assert_eq!(parsed, Some(json!({ "mcqs": [] })));
        assert!(parse_content(Some("Sure! Here are your questions".to_string())).is_err());
    }
}
