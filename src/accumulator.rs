//! Tool-call reassembly from streamed fragments.
//!
//! Tool calls arrive as [`StreamEvent::ToolCallDelta`] fragments keyed by a positional
//! index, and calls at different indices may interleave freely:
//!
//! ```text
//! delta { index: 0, id: "call_1", name: "search" }
//! delta { index: 1, id: "call_2", name: "calculate" }
//! delta { index: 0, arguments: "{\"q\"" }
//! delta { index: 1, arguments: "{\"expr\":\"2+2\"}" }
//! delta { index: 0, arguments: ":\"rust\"}" }
//! ```
//!
//! [`ToolCallAccumulator`] keeps one partial record per index and only parses the argument
//! buffer once the turn's stream is over.

use crate::types::{StreamEvent, ToolCall};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// An in-progress tool call.
///
/// `id` and `name` are first-non-null-wins: later fragments repeating or contradicting
/// them are ignored. Argument fragments are concatenated in arrival order and may split
/// the JSON text anywhere, even inside a string or a number.
#[derive(Debug, Default, Clone, PartialEq)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Merges tool-call fragments for a single turn.
///
/// Owned by the turn that created it and dropped when the turn ends. Entries are kept in
/// a [`BTreeMap`] so completed calls come out in ascending index order no matter which
/// index was seen first.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment into the entry at `index`, creating it if needed.
    pub fn push(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments_fragment: Option<&str>,
    ) {
        let entry = self.calls.entry(index).or_default();

        if entry.id.is_none() {
            entry.id = id.filter(|s| !s.is_empty()).map(str::to_string);
        }
        if entry.name.is_none() {
            entry.name = name.filter(|s| !s.is_empty()).map(str::to_string);
        }
        if let Some(fragment) = arguments_fragment {
            entry.arguments.push_str(fragment);
        }
    }

    /// Merge a [`StreamEvent::ToolCallDelta`]; any other event is ignored.
    pub fn apply(&mut self, event: &StreamEvent) {
        if let StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_fragment,
        } = event
        {
            self.push(
                *index,
                id.as_deref(),
                name.as_deref(),
                arguments_fragment.as_deref(),
            );
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Finalize every entry, in ascending index order.
    ///
    /// An empty argument buffer parses as `{}`. A call with no id gets `call_{index}`.
    ///
    /// # Errors
    ///
    /// [`Error::ToolArguments`] if an entry has no name, if its non-empty argument buffer
    /// is not valid JSON, or if the JSON is not an object. These are fatal for the turn;
    /// the caller must not invoke any of the calls.
    pub fn get_tool_calls(&self) -> Result<Vec<ToolCall>> {
        self.calls
            .iter()
            .map(|(&index, partial)| finalize(index, partial))
            .collect()
    }
}

fn finalize(index: u32, partial: &PartialToolCall) -> Result<ToolCall> {
    let name = partial
        .name
        .clone()
        .ok_or_else(|| Error::tool_arguments(index, "tool call has no function name"))?;

    let arguments = if partial.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str::<Value>(&partial.arguments)
            .map_err(|e| Error::tool_arguments(index, e.to_string()))?
    };

    if !arguments.is_object() {
        return Err(Error::tool_arguments(
            index,
            format!("arguments must be a JSON object, got {}", arguments),
        ));
    }

    let id = partial
        .id
        .clone()
        .unwrap_or_else(|| format!("call_{}", index));

    Ok(ToolCall::new(id, name, arguments))
}
