//! Scripted in-memory transport and stream builders shared by the integration tests.

#![allow(dead_code)]

use agent_stream::{AgentOptions, ByteStream, Error, Result, Transport, WireRequest, WireFormat};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

type Body = Vec<Vec<u8>>;

/// Replays one scripted body per request, chunk by chunk.
pub struct ScriptedTransport {
    bodies: Mutex<VecDeque<Body>>,
    /// When set, every request gets this body and the script is ignored.
    repeat: Option<Body>,
    requests: Mutex<Vec<WireRequest>>,
}

impl ScriptedTransport {
    /// Each body is a list of chunks; a chunk may end in the middle of a character.
    pub fn new<B: Into<Vec<u8>>>(bodies: Vec<Vec<B>>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into_iter().map(into_chunks).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same body.
    pub fn repeating<B: Into<Vec<u8>>>(body: Vec<B>) -> Self {
        Self {
            bodies: Mutex::new(VecDeque::new()),
            repeat: Some(into_chunks(body)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A script with no bodies; the first request fails.
    pub fn empty() -> Self {
        Self::new(Vec::<Vec<String>>::new())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &WireRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());

        let body = match &self.repeat {
            Some(body) => body.clone(),
            None => self
                .bodies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::other("script exhausted"))?,
        };

        let chunks: Vec<Result<Vec<u8>>> = body.into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

fn into_chunks<B: Into<Vec<u8>>>(body: Vec<B>) -> Body {
    body.into_iter().map(Into::into).collect()
}

pub fn options(max_tool_iterations: u32) -> AgentOptions {
    AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:1234/v1")
        .max_tool_iterations(max_tool_iterations)
        .build()
        .unwrap()
}

pub fn anthropic_options() -> AgentOptions {
    AgentOptions::builder()
        .system_prompt("Be brief.")
        .model("claude-test")
        .base_url("https://api.anthropic.com/v1")
        .api_key("sk-ant-test")
        .wire_format(WireFormat::Anthropic)
        .build()
        .unwrap()
}

fn data(payload: Value) -> String {
    format!("data: {payload}\n\n")
}

/// OpenAI-style turn: one frame per text part, then `finish_reason: stop` and usage.
pub fn openai_text(parts: &[&str]) -> Vec<String> {
    let mut body: Vec<String> = parts
        .iter()
        .map(|text| data(json!({"choices": [{"index": 0, "delta": {"content": text}}]})))
        .collect();
    body.push(data(
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ));
    body.push(data(
        json!({"choices": [], "usage": {"prompt_tokens": 12, "completion_tokens": 4}}),
    ));
    body.push("data: [DONE]\n\n".to_string());
    body
}

/// OpenAI-style turn requesting one tool, with the id and name in the first fragment and
/// the arguments in the second.
pub fn openai_tool_call(id: &str, name: &str, arguments: &str) -> Vec<String> {
    vec![
        data(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": ""}}
        ]}}]})),
        data(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": arguments}}
        ]}}]})),
        data(json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 6}})),
        "data: [DONE]\n\n".to_string(),
    ]
}

/// Anthropic-style turn with a text block followed by one tool_use block.
pub fn anthropic_tool_call(text: &str, id: &str, name: &str, arguments: &[&str]) -> Vec<String> {
    let mut body = vec![
        anthropic("message_start", json!({"type": "message_start",
            "message": {"id": "msg_1", "usage": {"input_tokens": 30, "output_tokens": 1}}})),
        anthropic("content_block_start", json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "text", "text": ""}})),
        anthropic("content_block_delta", json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "text_delta", "text": text}})),
        anthropic("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        anthropic("content_block_start", json!({"type": "content_block_start", "index": 1,
            "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}})),
    ];
    for fragment in arguments {
        body.push(anthropic("content_block_delta", json!({"type": "content_block_delta",
            "index": 1, "delta": {"type": "input_json_delta", "partial_json": fragment}})));
    }
    body.push(anthropic("content_block_stop", json!({"type": "content_block_stop", "index": 1})));
    body.push(anthropic("message_delta", json!({"type": "message_delta",
        "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 15}})));
    body.push(anthropic("message_stop", json!({"type": "message_stop"})));
    body
}

/// Anthropic-style turn with a single text block.
pub fn anthropic_text(parts: &[&str]) -> Vec<String> {
    let mut body = vec![
        anthropic("message_start", json!({"type": "message_start",
            "message": {"id": "msg_2", "usage": {"input_tokens": 50, "output_tokens": 1}}})),
        anthropic("content_block_start", json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "text", "text": ""}})),
        ": keep-alive\n\n".to_string(),
        anthropic("ping", json!({"type": "ping"})),
    ];
    for text in parts {
        body.push(anthropic("content_block_delta", json!({"type": "content_block_delta",
            "index": 0, "delta": {"type": "text_delta", "text": text}})));
    }
    body.push(anthropic("content_block_stop", json!({"type": "content_block_stop", "index": 0})));
    body.push(anthropic("message_delta", json!({"type": "message_delta",
        "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 9}})));
    body.push(anthropic("message_stop", json!({"type": "message_stop"})));
    body
}

fn anthropic(event: &str, payload: Value) -> String {
    format!("event: {event}\ndata: {payload}\n\n")
}

/// Re-split a body into `size`-byte chunks, ignoring frame and character boundaries.
pub fn rechunk(body: &[String], size: usize) -> Vec<Vec<u8>> {
    body.concat().as_bytes().chunks(size).map(<[u8]>::to_vec).collect()
}
