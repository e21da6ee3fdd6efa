use std::fmt;

use thiserror::Error;

/// Which half of the two-step query protocol an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    /// Submitting the query parameters on the landing page form.
    Render,
    /// Triggering the XML download on the results page form.
    Export,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPhase::Render => write!(f, "render"),
            QueryPhase::Export => write!(f, "export"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GhrsError {
    #[error("Authentication failed: portal answered HTTP {status} after {hops} redirect hops")]
    Auth { status: u16, hops: usize },

    #[error("Authentication request failed: {0}")]
    AuthTransport(#[source] reqwest::Error),

    #[error("No form found on the {phase} page")]
    NoForm { phase: QueryPhase },

    #[error("Query {phase} request returned HTTP {status}")]
    QueryHttp { phase: QueryPhase, status: u16 },

    #[error("Query {phase} request failed: {source}")]
    QueryTransport {
        phase: QueryPhase,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed date {value:?} in export row {row}")]
    MalformedDate { row: usize, value: String },

    #[error("Malformed number {value:?} in export row {row}")]
    MalformedNumber { row: usize, value: String },

    #[error("Export row {row} has no {column} column")]
    MissingColumn { row: usize, column: &'static str },

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GhrsError {
    /// Returns `true` when the portal no longer recognises the session:
    /// the expected form is missing or a query POST was rejected.
    /// Callers should authenticate again before retrying.
    pub fn is_stale_session(&self) -> bool {
        matches!(self, Self::NoForm { .. } | Self::QueryHttp { .. })
    }

    /// Returns `true` when a request hit the configured timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::AuthTransport(e) | Self::QueryTransport { source: e, .. } => e.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GhrsError>;
