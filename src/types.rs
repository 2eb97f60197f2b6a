//! Core types for the streaming engine
//!
//! Everything the engine hands to callers lives here: the normalized [`StreamEvent`]
//! sequence, the per-turn [`TurnResult`], the multi-turn [`ConversationResult`], the
//! vendor-neutral [`Message`] list, and the [`AgentOptions`] used to configure a client.

use crate::retry::RetryConfig;
use crate::tools::Tool;
use crate::vendor::WireFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default `anthropic-version` header value sent with Anthropic requests.
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for a [`Client`](crate::Client).
///
/// Construct with [`AgentOptions::builder`]; `model` and `base_url` are required.
#[derive(Clone)]
pub struct AgentOptions {
    /// System prompt prepended to every request. Empty means none.
    pub system_prompt: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Base URL of the API, e.g. `http://localhost:1234/v1`.
    pub base_url: String,

    /// API key. Local servers usually accept anything.
    pub api_key: String,

    pub max_tokens: Option<u32>,

    pub temperature: Option<f32>,

    /// Request timeout in seconds.
    pub timeout: u64,

    /// Upper bound on model turns within one orchestration run.
    pub max_tool_iterations: u32,

    /// Which vendor wire format the remote service speaks.
    pub wire_format: WireFormat,

    /// Retry policy for opening the response stream.
    pub retry: RetryConfig,

    /// Value of the `anthropic-version` header.
    pub anthropic_version: String,

    /// Tools registered with the default tool registry.
    pub tools: Vec<Arc<Tool>>,

    pub hooks: crate::hooks::Hooks,
}

impl fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("system_prompt", &self.system_prompt)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .field("wire_format", &self.wire_format)
            .field("retry", &self.retry)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl AgentOptions {
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }
}

/// Builder for [`AgentOptions`].
#[derive(Default)]
pub struct AgentOptionsBuilder {
    system_prompt: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Option<u64>,
    max_tool_iterations: Option<u32>,
    wire_format: Option<WireFormat>,
    retry: Option<RetryConfig>,
    anthropic_version: Option<String>,
    tools: Vec<Arc<Tool>>,
    hooks: crate::hooks::Hooks,
}

impl fmt::Debug for AgentOptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptionsBuilder")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("wire_format", &self.wire_format)
            .field("tools", &format!("{} tools", self.tools.len()))
            .finish()
    }
}

impl AgentOptionsBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_tool_iterations(mut self, iterations: u32) -> Self {
        self.max_tool_iterations = Some(iterations);
        self
    }

    pub fn wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = Some(format);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn anthropic_version(mut self, version: impl Into<String>) -> Self {
        self.anthropic_version = Some(version.into());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools.into_iter().map(Arc::new));
        self
    }

    pub fn hooks(mut self, hooks: crate::hooks::Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate and build the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when `model` or `base_url` is
    /// missing, when `max_tool_iterations` is zero, or when `temperature` falls outside
    /// `0.0..=2.0`.
    pub fn build(self) -> crate::Result<AgentOptions> {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let base_url = self
            .base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| crate::Error::config("base_url is required"))?;

        let max_tool_iterations = self.max_tool_iterations.unwrap_or(5);
        if max_tool_iterations == 0 {
            return Err(crate::Error::config(
                "max_tool_iterations must be at least 1",
            ));
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(crate::Error::config(format!(
                    "temperature must be between 0.0 and 2.0, got {temp}"
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(crate::Error::config("max_tokens must be greater than 0"));
        }

        Ok(AgentOptions {
            system_prompt: self.system_prompt.unwrap_or_default(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.unwrap_or_else(|| "not-needed".to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout.unwrap_or(60),
            max_tool_iterations,
            wire_format: self.wire_format.unwrap_or_default(),
            retry: self.retry.unwrap_or_else(RetryConfig::single_attempt),
            anthropic_version: self
                .anthropic_version
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_VERSION.to_string()),
            tools: self.tools,
            hooks: self.hooks,
        })
    }
}

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A complete, model-issued request to invoke a named function.
///
/// `id` is provider-issued and opaque; it is only unique within one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Always a JSON object.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One vendor-neutral conversation message.
///
/// Assistant messages produced after a tool-requesting turn carry the interstitial text
/// (possibly empty) plus the calls they issued. Tool messages carry the serialized result
/// and the `tool_call_id` it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool messages that report a failed or skipped call rather than a result.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
            is_error: false,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(MessageRole::Assistant, text)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// A tool message reporting that the call failed or was never run.
    pub fn tool_error(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            is_error: true,
            ..Self::tool_result(tool_call_id, name, content)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Why a turn's generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            // `function_call` is the pre-tools spelling some servers still send
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    /// Map an Anthropic `stop_reason` string.
    pub fn from_anthropic(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolCalls,
            "refusal" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other(s) => s,
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
        }
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

/// A normalized, vendor-neutral streaming event.
///
/// For one turn the sequence is: any interleaving of `TextDelta` and `ToolCallDelta`,
/// optionally one `ToolCallsReady`, then exactly one `StreamCompleted`. A turn cancelled
/// before it completes has no `StreamCompleted`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    /// A fragment of a tool call, keyed by its position within the current turn.
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments_fragment: Option<String>,
    },
    ToolCallsReady {
        tool_calls: Vec<ToolCall>,
    },
    StreamCompleted {
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    pub fn tool_call_delta(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments_fragment: Option<&str>,
    ) -> Self {
        StreamEvent::ToolCallDelta {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments_fragment: arguments_fragment.map(str::to_string),
        }
    }

    pub fn completed(finish_reason: Option<FinishReason>, usage: Option<Usage>) -> Self {
        StreamEvent::StreamCompleted {
            finish_reason,
            usage,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StreamEvent::StreamCompleted { .. })
    }
}

/// Outcome of a single request/response exchange.
///
/// Owned by whoever drove the turn; never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnResult {
    pub assistant_text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    /// The turn stopped early because cancellation was observed.
    pub cancelled: bool,
}

impl TurnResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Aggregated result of a multi-turn orchestration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationResult {
    /// Assistant text of every turn, concatenated in order.
    pub text: String,
    pub finish_reason: Option<FinishReason>,
    /// Usage reported by the last turn that reported any.
    pub usage: Option<Usage>,
    /// Sum of the usage of every turn.
    pub total_usage: Usage,
    /// Number of turns requested from the service.
    pub iterations: u32,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_options_builder() {
        let options = AgentOptions::builder()
            .system_prompt("Test prompt")
            .model("test-model")
            .base_url("http://localhost:1234/v1/")
            .api_key("test-key")
            .max_tokens(1000)
            .temperature(0.5)
            .timeout(30)
            .max_tool_iterations(10)
            .wire_format(WireFormat::Anthropic)
            .build()
            .unwrap();

        assert_eq!(options.system_prompt, "Test prompt");
        assert_eq!(options.model, "test-model");
        assert_eq!(options.base_url, "http://localhost:1234/v1");
        assert_eq!(options.api_key, "test-key");
        assert_eq!(options.max_tokens, Some(1000));
        assert_eq!(options.temperature, Some(0.5));
        assert_eq!(options.timeout, 30);
        assert_eq!(options.max_tool_iterations, 10);
        assert_eq!(options.wire_format, WireFormat::Anthropic);
    }

    #[test]
    fn test_agent_options_builder_defaults() {
        let options = AgentOptions::builder()
            .model("test-model")
            .base_url("http://localhost:1234/v1")
            .build()
            .unwrap();

        assert_eq!(options.system_prompt, "");
        assert_eq!(options.api_key, "not-needed");
        assert_eq!(options.max_tokens, None);
        assert_eq!(options.temperature, None);
        assert_eq!(options.timeout, 60);
        assert_eq!(options.max_tool_iterations, 5);
        assert_eq!(options.wire_format, WireFormat::OpenAi);
        assert_eq!(options.retry.max_attempts, 1);
        assert_eq!(options.anthropic_version, DEFAULT_ANTHROPIC_VERSION);
    }

    #[test]
    fn test_agent_options_builder_missing_required() {
        let result = AgentOptions::builder()
            .base_url("http://localhost:1234/v1")
            .build();
        assert!(result.is_err());

        let result = AgentOptions::builder().model("test-model").build();
        assert!(result.is_err());

        let result = AgentOptions::builder()
            .model("  ")
            .base_url("http://localhost:1234/v1")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_options_rejects_zero_iterations() {
        let err = AgentOptions::builder()
            .model("m")
            .base_url("http://x")
            .max_tool_iterations(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_tool_iterations"));
    }

    #[test]
    fn test_agent_options_rejects_bad_temperature() {
        let result = AgentOptions::builder()
            .model("m")
            .base_url("http://x")
            .temperature(3.5)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let options = AgentOptions::builder()
            .model("m")
            .base_url("http://x")
            .api_key("sk-secret")
            .build()
            .unwrap();
        let debug = format!("{options:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Hello");

        let call = ToolCall::new("call_1", "get_weather", json!({"city": "Oslo"}));
        let msg = Message::assistant_with_tool_calls("", vec![call.clone()]);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.tool_calls, vec![call]);

        let msg = Message::tool_result("call_1", "get_weather", r#"{"temp":20}"#);
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("get_weather"));
        assert!(!msg.is_error);

        let msg = Message::tool_error("call_2", "get_weather", r#"{"error":"timeout"}"#);
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_2"));
        assert!(msg.is_error);
    }

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::Tool).unwrap(), "\"tool\"");
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_openai("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_openai("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_anthropic("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_anthropic("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_anthropic("max_tokens"), FinishReason::Length);
        assert_eq!(
            FinishReason::from_openai("weird"),
            FinishReason::Other("weird".to_string())
        );
        assert_eq!(FinishReason::ToolCalls.to_string(), "tool_calls");
    }

    #[test]
    fn test_usage_addition() {
        let mut total = Usage::default();
        total += Usage::new(10, 5);
        total += Usage::new(3, 2);
        assert_eq!(total, Usage::new(13, 7));
        assert_eq!(total.total(), 20);
    }
}
