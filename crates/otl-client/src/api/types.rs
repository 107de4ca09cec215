use std::fmt;

use bon::Builder;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Username/password pair exchanged for a session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session cookie sent with every request after login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session(String);

impl Session {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self(cookie.into())
    }

    pub fn cookie(&self) -> &str {
        &self.0
    }
}

/// One query submission as the caller describes it.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct JobRequest {
    #[builder(into)]
    pub query: String,
    /// Time-window start.
    #[builder(default)]
    pub tws: i64,
    /// Time-window finish.
    #[builder(default)]
    pub twf: i64,
    /// Seconds a result-location lookup stays cached.
    pub cache_ttl: u64,
    /// Overall budget for the run, in seconds.
    pub timeout: u64,
}

impl JobRequest {
    /// Wire fields shared by job creation and status checks.
    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("original_otl".to_string(), self.query.clone()),
            ("tws".to_string(), self.tws.to_string()),
            ("twf".to_string(), self.twf.to_string()),
            ("cache_ttl".to_string(), self.cache_ttl.to_string()),
            ("timeout".to_string(), self.timeout.to_string()),
        ]
    }
}

/// Correlation id of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(cid: impl Into<String>) -> Self {
        Self(cid.into())
    }

    /// Accepts the numeric or string `cid` forms the server emits.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self(number.to_string())),
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.trim().to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server acknowledgement of a created job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobAccepted {
    pub response: Map<String, Value>,
}

/// `{status, ...}` body shared by every JSON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Envelope {
    pub const SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(Self::SUCCESS)
    }

    /// Whole body rendered back to JSON, for error messages.
    pub fn describe(&self) -> String {
        let mut body = self.rest.clone();
        if let Some(status) = &self.status {
            body.insert("status".to_string(), Value::String(status.clone()));
        }
        Value::Object(body).to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn request_fields_use_wire_names() {
        let request = JobRequest::builder()
            .query("| makeresults")
            .cache_ttl(60)
            .timeout(30)
            .build();
        let fields = request.fields();
        assert_eq!(fields[0], ("original_otl".into(), "| makeresults".into()));
        assert_eq!(fields[1], ("tws".into(), "0".into()));
        assert_eq!(fields[4], ("timeout".into(), "30".into()));
    }

    #[test]
    fn handle_accepts_numbers_and_strings() {
        assert_eq!(JobHandle::from_json(&json!(7)), Some(JobHandle::new("7")));
        assert_eq!(JobHandle::from_json(&json!(" 42 ")), Some(JobHandle::new("42")));
        assert_eq!(JobHandle::from_json(&json!(null)), None);
    }
}
