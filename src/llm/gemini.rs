//! Gemini `generateContent` API client.
//!
//! Thin HTTP wrapper for `/models/{model}:generateContent`. Message
//! translation and response parsing are pure functions for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::config::LlmTimeouts;
use super::types::{ChatResponse, Content, ContentBlock, LlmError, Message, Tool};

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, temperature: f32, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url, temperature })
    }

    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LlmError> {
        let body = build_request(system, messages, tools, max_tokens, self.temperature);
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        parse_response(&text, model)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTools<'a>>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTools<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    /// Omitted for argument-less tools; Gemini rejects an empty OBJECT schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Set on thought-summary parts; never sent back.
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default = "empty_args")]
    args: Value,
}

/// Argument-less calls may omit `args` or send `null`; tools expect an object.
fn empty_args() -> Value {
    json!({})
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// =============================================================================
// REQUEST BUILDING
// =============================================================================

fn build_request<'a>(
    system: &str,
    messages: &[Message],
    tools: Option<&'a [Tool]>,
    max_tokens: u32,
    temperature: f32,
) -> GenerateRequest<'a> {
    let system_instruction = if system.trim().is_empty() {
        None
    } else {
        Some(WireContent { role: None, parts: vec![text_part(system.to_string())] })
    };
    let tools = tools.filter(|t| !t.is_empty()).map(|t| {
        vec![WireTools {
            function_declarations: t
                .iter()
                .map(|tool| FunctionDeclaration {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: has_properties(&tool.input_schema).then_some(&tool.input_schema),
                })
                .collect(),
        }]
    });

    GenerateRequest {
        system_instruction,
        contents: build_contents(messages),
        tools,
        generation_config: GenerationConfig { temperature, max_output_tokens: max_tokens },
    }
}

fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty())
}

fn text_part(text: String) -> WirePart {
    WirePart { text: Some(text), ..WirePart::default() }
}

fn wire_role(role: &str) -> String {
    if role == "assistant" { "model".into() } else { "user".into() }
}

fn build_contents(messages: &[Message]) -> Vec<WireContent> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let parts = match &message.content {
            Content::Text(text) => vec![text_part(text.clone())],
            Content::Blocks(blocks) => blocks.iter().map(block_to_part).collect(),
        };
        if parts.is_empty() {
            continue;
        }
        out.push(WireContent { role: Some(wire_role(&message.role)), parts });
    }
    out
}

fn block_to_part(block: &ContentBlock) -> WirePart {
    match block {
        ContentBlock::Text { text } => text_part(text.clone()),
        ContentBlock::ToolUse { name, input, .. } => WirePart {
            function_call: Some(FunctionCall { name: name.clone(), args: input.clone() }),
            ..WirePart::default()
        },
        ContentBlock::ToolResult { name, content, is_error, .. } => {
            let response = if is_error.unwrap_or(false) {
                json!({ "error": content })
            } else {
                json!({ "content": content })
            };
            WirePart {
                function_response: Some(FunctionResponse { name: name.clone(), response }),
                ..WirePart::default()
            }
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_response(json: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let api: GenerateResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let usage = api.usage_metadata.unwrap_or(UsageMetadata { prompt_token_count: 0, candidates_token_count: 0 });
    let model = api.model_version.unwrap_or_else(|| requested_model.to_string());

    let Some(candidate) = api.candidates.into_iter().next() else {
        let reason = api
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "NO_CANDIDATES".into());
        return Ok(ChatResponse {
            content: Vec::new(),
            model,
            stop_reason: reason,
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        });
    };

    let mut content = Vec::new();
    let mut call_index = 0usize;
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought.unwrap_or(false) {
            continue;
        }
        if let Some(call) = part.function_call {
            let input = if call.args.is_null() { empty_args() } else { call.args };
            content.push(ContentBlock::ToolUse { id: format!("call_{call_index}"), name: call.name, input });
            call_index += 1;
        } else if let Some(text) = part.text {
            content.push(ContentBlock::Text { text });
        }
    }

    let stop_reason = if call_index > 0 {
        "tool_use".to_string()
    } else {
        candidate.finish_reason.unwrap_or_else(|| "STOP".into())
    };

    Ok(ChatResponse {
        content,
        model,
        stop_reason,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
