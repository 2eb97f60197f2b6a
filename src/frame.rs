//! Event-stream frame reading.
//!
//! The APIs this crate talks to stream their responses in the server-sent events layout:
//!
//! ```text
//! event: content_block_delta
//! data: {"type":"content_block_delta","index":0,...}
//!
//! data: {"id":"chatcmpl-1","choices":[...]}
//!
//! data: [DONE]
//!
//! ```
//!
//! [`FrameReader`] is a push-driven state machine: feed it byte chunks of any size as they
//! come off the wire and it hands back every record completed by those bytes. Records are
//! only ever cut on `\n` bytes, which can never sit inside a multi-byte UTF-8 sequence, so
//! the output does not depend on where the transport happened to split the body.
//!
//! [`frames`] wraps a [`ByteStream`] into a lazy stream of [`Frame`]s, reading more bytes
//! only when the consumer asks for the next frame.

use crate::Result;
use crate::transport::ByteStream;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

/// Payload that marks the end of an OpenAI-style stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One event-stream record: an optional `event:` tag and the joined `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event_type: Option<String>,
    pub data: String,
}

impl Frame {
    pub fn new(event_type: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.map(str::to_string),
            data: data.into(),
        }
    }
}

/// Incremental event-stream parser.
///
/// Lines may end in `\n` or `\r\n`. Within a record, consecutive `data:` lines are joined
/// with `\n`; `event:` sets the record's type; comments (`:` prefix), `id:`, `retry:` and
/// unrecognised lines are dropped. A blank line ends the record. A record whose data is
/// exactly `[DONE]` ends the stream and is not returned.
#[derive(Debug, Default)]
pub struct FrameReader {
    /// Bytes of the current, not yet terminated, line.
    line: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
    done: bool,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen. Once set, input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes, returning every record it completes, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.line.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];

            let line = std::mem::take(&mut self.line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            if self.done {
                return frames;
            }
        }
        self.line.extend_from_slice(rest);

        frames
    }

    /// Flush at end of input.
    ///
    /// A trailing unterminated line is processed as if it were terminated, and a record
    /// still open is emitted even without its closing blank line; some servers close the
    /// connection straight after their last `data:` line.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<Frame> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(raw);
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event_type = Some(value.to_string()),
            "id" | "retry" => {}
            _ => log::trace!("ignoring malformed event-stream line: {line}"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event_type = self.event_type.take();
        if self.data_lines.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data_lines).join("\n");
        if data == DONE_SENTINEL {
            self.done = true;
            return None;
        }

        Some(Frame { event_type, data })
    }
}

/// A pinned, boxed stream of frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

struct FrameState {
    source: ByteStream,
    reader: FrameReader,
    pending: VecDeque<Frame>,
    exhausted: bool,
}

/// Lazily turn a byte stream into frames.
///
/// Bytes are pulled from `source` only when no completed frame is waiting. The stream
/// ends at `[DONE]`, at the end of the source, or right after yielding a transport error.
pub fn frames(source: ByteStream) -> FrameStream {
    let state = FrameState {
        source,
        reader: FrameReader::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.exhausted || state.reader.is_done() {
                return None;
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    let completed = state.reader.push(&chunk);
                    state.pending.extend(completed);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.exhausted = true;
                    state.pending.extend(state.reader.finish());
                }
            }
        }
    }))
}
