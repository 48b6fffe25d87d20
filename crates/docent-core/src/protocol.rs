use serde::{Deserialize, Serialize};

/// Inbound (server to client) frame on the persistent connection.
///
/// Within one exchange the server emits zero or more `Partial` frames whose
/// `full_response` values are prefix-monotonic (each a non-strict extension
/// of the previous), followed by exactly one terminal frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolFrame {
    /// Cumulative text generated so far for the current exchange.
    Partial { full_response: String },
    /// Terminal success frame with the final answer and its sources.
    Complete {
        content: String,
        sources: Vec<String>,
    },
    /// Terminal failure frame with a human-readable message.
    Error { content: String },
}

impl ProtocolFrame {
    /// Whether this frame ends the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolFrame::Complete { .. } | ProtocolFrame::Error { .. }
        )
    }

    /// Whether `next` is a prefix-compatible extension of `self`.
    ///
    /// Only meaningful between two `Partial` frames; used to check the
    /// prefix-monotonicity invariant.
    pub fn extends(&self, next: &ProtocolFrame) -> bool {
        match (self, next) {
            (
                ProtocolFrame::Partial {
                    full_response: prev,
                },
                ProtocolFrame::Partial {
                    full_response: cur,
                },
            ) => cur.starts_with(prev.as_str()),
            _ => false,
        }
    }
}

/// Outbound (client to server) request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFrame {
    pub query: String,
    pub stream: bool,
}

impl QueryFrame {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            stream: true,
        }
    }
}
