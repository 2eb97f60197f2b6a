//! Hook integration tests
//!
//! Lifecycle hooks observe a real run: they fire in a fixed order, see the same events the
//! caller sees, and cannot change the outcome even when they misbehave.

mod common;

use agent_stream::{
    AgentOptions, CancellationContext, Client, Error, HookEvent, HookKind, Hooks, Message,
    StreamEvent, ToolRegistry, tool,
};
use common::{ScriptedTransport, openai_text, openai_tool_call};
use serde_json::json;
use std::sync::{Arc, Mutex};

const ALL_KINDS: [HookKind; 7] = [
    HookKind::StreamStart,
    HookKind::Chunk,
    HookKind::ToolCall,
    HookKind::StreamEnd,
    HookKind::Success,
    HookKind::Error,
    HookKind::Complete,
];

/// Register a recorder for every kind and return the shared log.
fn record_all(hooks: &Hooks) -> Arc<Mutex<Vec<HookEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in ALL_KINDS {
        let log = log.clone();
        hooks.on(kind, move |event| log.lock().unwrap().push(event.clone()));
    }
    log
}

/// Kinds in dispatch order, with runs of `Chunk` collapsed to one entry.
fn timeline(log: &[HookEvent]) -> Vec<HookKind> {
    let mut kinds: Vec<HookKind> = log.iter().map(HookEvent::kind).collect();
    kinds.dedup_by(|a, b| *a == HookKind::Chunk && *b == HookKind::Chunk);
    kinds
}

fn client_with(hooks: Hooks, transport: &Arc<ScriptedTransport>, max_iterations: u32) -> Client {
    let options = AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:1234/v1")
        .max_tool_iterations(max_iterations)
        .hooks(hooks)
        .build()
        .unwrap();
    let tools = ToolRegistry::new().register(
        tool("get_weather", "Weather lookup")
            .param("city", "string")
            .build(|_| async move { Ok(json!({"temp": 20})) }),
    );
    Client::with_transport(options, transport.clone(), Arc::new(tools))
}

/// Test: lifecycle order over a tool round trip
///
/// Expected: per turn StreamStart, Chunk*, StreamEnd, then ToolCall for each call;
/// Success and Complete once at the end
#[tokio::test]
async fn test_hook_order_for_tool_round_trip() {
    let hooks = Hooks::new();
    let log = record_all(&hooks);
    let transport = Arc::new(ScriptedTransport::new(vec![
        openai_tool_call("call_1", "get_weather", r#"{"city":"Oslo"}"#),
        openai_text(&["It is ", "20°C."]),
    ]));
    let mut client = client_with(hooks, &transport, 5);

    client
        .run(
            vec![Message::user("Weather?")],
            &CancellationContext::never(),
            &mut Vec::new(),
        )
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        timeline(&log),
        vec![
            HookKind::StreamStart,
            HookKind::Chunk,
            HookKind::StreamEnd,
            HookKind::ToolCall,
            HookKind::StreamStart,
            HookKind::Chunk,
            HookKind::StreamEnd,
            HookKind::Success,
            HookKind::Complete,
        ]
    );

    match &log[0] {
        HookEvent::StreamStart {
            iteration,
            message_count,
        } => {
            assert_eq!(*iteration, 1);
            assert_eq!(*message_count, 1);
        }
        other => panic!("unexpected first hook: {other:?}"),
    }
    assert!(matches!(
        log.last(),
        Some(HookEvent::Complete {
            iterations: 2,
            succeeded: true
        })
    ));
}

#[tokio::test]
async fn test_chunk_hooks_mirror_relayed_events() {
    let hooks = Hooks::new();
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = chunks.clone();
    hooks.on(HookKind::Chunk, move |event| {
        if let HookEvent::Chunk { event, .. } = event {
            sink.lock().unwrap().push(event.clone());
        }
    });

    let transport = Arc::new(ScriptedTransport::new(vec![openai_text(&["a", "b", "c"])]));
    let mut client = client_with(hooks, &transport, 5);
    let mut events: Vec<StreamEvent> = Vec::new();

    client
        .run(vec![Message::user("abc")], &CancellationContext::never(), &mut events)
        .await
        .unwrap();

    assert_eq!(*chunks.lock().unwrap(), events);
}

/// Test: failure path
///
/// Expected: the Error hook sees the same failure the caller gets, then Complete fires
#[tokio::test]
async fn test_error_hook_fires_before_failure_is_returned() {
    let hooks = Hooks::new();
    let log = record_all(&hooks);
    let transport = Arc::new(ScriptedTransport::repeating(openai_tool_call(
        "call_1",
        "get_weather",
        "{}",
    )));
    let mut client = client_with(hooks, &transport, 2);

    let err = client
        .run(vec![Message::user("loop")], &CancellationContext::never(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MaxIterationsExceeded(2)));

    let log = log.lock().unwrap();
    let tail: Vec<HookKind> = log.iter().rev().take(2).map(HookEvent::kind).collect();
    assert_eq!(tail, vec![HookKind::Complete, HookKind::Error]);
    assert!(!log.iter().any(|e| e.kind() == HookKind::Success));

    match &log[log.len() - 2] {
        HookEvent::Error { message } => assert_eq!(message, &err.to_string()),
        other => panic!("expected error hook, got {other:?}"),
    }
    assert!(matches!(
        log.last(),
        Some(HookEvent::Complete {
            iterations: 2,
            succeeded: false
        })
    ));
}

#[tokio::test]
async fn test_panicking_listener_does_not_change_outcome() {
    let hooks = Hooks::new();
    hooks.on(HookKind::Chunk, |_| panic!("broken listener"));
    hooks.on(HookKind::ToolCall, |_| panic!("broken listener"));
    let log = record_all(&hooks);

    let transport = Arc::new(ScriptedTransport::new(vec![
        openai_tool_call("call_1", "get_weather", "{}"),
        openai_text(&["fine"]),
    ]));
    let mut client = client_with(hooks, &transport, 5);
    let mut events = Vec::new();

    let result = client
        .run(vec![Message::user("go")], &CancellationContext::never(), &mut events)
        .await
        .unwrap();

    assert_eq!(result.text, "fine");
    assert_eq!(client.history().len(), 4);
    assert!(log.lock().unwrap().iter().any(|e| e.kind() == HookKind::Complete));
}

#[tokio::test]
async fn test_removed_listener_is_not_called() {
    let hooks = Hooks::new();
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let id = hooks.on(HookKind::StreamStart, move |_| *counter.lock().unwrap() += 1);

    let transport = Arc::new(ScriptedTransport::new(vec![
        openai_text(&["one"]),
        openai_text(&["two"]),
    ]));
    let mut client = client_with(hooks, &transport, 5);

    client
        .run(vec![Message::user("1")], &CancellationContext::never(), &mut Vec::new())
        .await
        .unwrap();
    assert!(client.hooks().off(HookKind::StreamStart, id));
    client
        .run(vec![Message::user("2")], &CancellationContext::never(), &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_run_still_completes_hooks() {
    let hooks = Hooks::new();
    let log = record_all(&hooks);
    let transport = Arc::new(ScriptedTransport::new(vec![openai_text(&["unused"])]));
    let mut client = client_with(hooks, &transport, 5);

    let result = client
        .run(
            vec![Message::user("hi")],
            &CancellationContext::new(|| true),
            &mut Vec::new(),
        )
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(
        timeline(&log.lock().unwrap()),
        vec![HookKind::Success, HookKind::Complete]
    );
}
