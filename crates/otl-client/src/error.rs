//! Error taxonomy shared by every stage of the client.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use thiserror::Error;

use crate::table::schema::SchemaError;

pub type OtlResult<T> = Result<T, OtlError>;

/// Failure of a single HTTP exchange, classified by where it broke.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("failed to join `{path}` onto base URL: {source}")]
    UrlJoin {
        path: String,
        #[source]
        source: Arc<url::ParseError>,
    },
    #[error("request error during `{stage}`: {source}")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("unexpected HTTP status {status} during `{stage}`{}", body_excerpt(body))]
    HttpStatus {
        stage: &'static str,
        status: u16,
        /// Whatever the server sent along with the status, often an error envelope.
        body: Bytes,
    },
    #[error("failed to read HTTP body during `{stage}`: {source}")]
    Body {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
}

impl TransportError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn body(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Body {
            stage,
            source: Arc::new(error),
        }
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Request { source, .. } | Self::Body { source, .. } => {
                source.status().map(|status| status.as_u16())
            }
            Self::UrlJoin { .. } => None,
        }
    }

    /// Body of a non-2xx answer; empty for every other failure.
    pub fn response_body(&self) -> &[u8] {
        match self {
            Self::HttpStatus { body, .. } => body,
            _ => &[],
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

const EXCERPT_CHARS: usize = 200;

fn body_excerpt(body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    format!(": {excerpt}")
}

#[derive(Debug, Error, Clone)]
pub enum OtlError {
    #[error("invalid base address `{0}`")]
    InvalidBaseUrl(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("job submission rejected: {0}")]
    JobSubmission(String),
    #[error("job failed: {0}")]
    JobExecution(String),
    #[error("job was canceled")]
    JobCanceled,
    #[error("result lookup failed: {0}")]
    ResultRetrieval(String),
    #[error("failed to fetch shard `{location}`: {source}")]
    ShardFetch {
        location: String,
        #[source]
        source: TransportError,
    },
    #[error("expected exactly one schema shard, found {matches}")]
    SchemaMissing { matches: usize },
    #[error("request timed out after {}s", budget.as_secs_f64())]
    Timeout { budget: Duration },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("JSON decode error during `{stage}`: {source}")]
    Json {
        stage: &'static str,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("shard `{location}` is not valid {charset}")]
    Decode { location: String, charset: String },
    #[error("invalid record on line {line}: {message}")]
    Record { line: usize, message: String },
    #[error("shard worker failed: {0}")]
    WorkerJoin(String),
}

impl OtlError {
    pub fn json(stage: &'static str, error: serde_json::Error) -> Self {
        Self::Json {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn record(line: usize, message: impl Into<String>) -> Self {
        Self::Record {
            line,
            message: message.into(),
        }
    }

    /// Transport-level failure underneath this error, looking through shard wrappers.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            Self::ShardFetch { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The session cookie was rejected by the server.
    pub fn is_stale_session(&self) -> bool {
        self.transport().is_some_and(TransportError::is_unauthorized)
    }

    /// A cached shard location no longer exists on the server.
    pub fn is_stale_location(&self) -> bool {
        matches!(self, Self::ShardFetch { source, .. } if source.is_not_found())
    }
}
