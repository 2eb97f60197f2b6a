//! Error types for the streaming engine
//!
//! Frame-level faults never reach this type: malformed frames are skipped where they are
//! read. Everything here is either a turn-level fault that ends the exchange, or a
//! tool-level fault ([`Error::Tool`]) that the orchestration loop feeds back to the model.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Non-success response or an error frame sent by the model server
    #[error("API error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Transport-level streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// A completed tool call whose argument buffer is not valid JSON
    #[error("Invalid arguments for tool call at index {index}: {message}")]
    ToolArguments { index: u32, message: String },

    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model kept requesting tools past the configured bound
    #[error("max iterations ({0}) exceeded")]
    MaxIterationsExceeded(u32),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error with an optional HTTP status
    pub fn api(status: Option<u16>, msg: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: msg.into(),
        }
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool argument assembly error
    pub fn tool_arguments(index: u32, msg: impl Into<String>) -> Self {
        Error::ToolArguments {
            index,
            message: msg.into(),
        }
    }

    /// Create a new unknown tool error
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Error::UnknownTool(name.into())
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Whether a fresh attempt at opening the stream could succeed.
    ///
    /// Only transport faults qualify: network errors, timeouts, rate limits and 5xx
    /// responses. Anything produced by the engine's own protocol logic is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout | Error::Stream(_) => true,
            Error::Api {
                status: Some(status),
                ..
            } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// True for the iteration-bound failure, so callers can tell it apart.
    pub fn is_max_iterations(&self) -> bool {
        matches!(self, Error::MaxIterationsExceeded(_))
    }
}
