use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    api::{
        CHECKJOB_PATH,
        types::{Envelope, JobHandle, JobRequest, Session},
    },
    deadline::Deadline,
    error::{OtlError, OtlResult},
    transport::{HttpRequest, SharedTransport},
};

const STAGE: &str = "checkjob";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What one status check reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Still running, or a status this client does not recognize.
    Pending(Option<String>),
    Succeeded(JobHandle),
    Failed(String),
    Canceled,
}

impl JobState {
    fn from_envelope(envelope: Envelope) -> OtlResult<Self> {
        let state = match envelope.status.as_deref() {
            Some(Envelope::SUCCESS) => {
                let handle = envelope
                    .rest
                    .get("cid")
                    .and_then(JobHandle::from_json)
                    .ok_or_else(|| {
                        OtlError::JobExecution(format!(
                            "job reported success without a cid: {}",
                            envelope.describe()
                        ))
                    })?;
                Self::Succeeded(handle)
            }
            Some("failed") => {
                let message = match envelope.rest.get("error") {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                    None => envelope.describe(),
                };
                Self::Failed(message)
            }
            Some("canceled") => Self::Canceled,
            other => Self::Pending(other.map(str::to_string)),
        };
        Ok(state)
    }
}

#[derive(Debug, Clone)]
pub struct JobPoller {
    transport: SharedTransport,
    interval: Duration,
}

impl JobPoller {
    pub fn new(transport: SharedTransport, interval: Duration) -> Self {
        Self {
            transport,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Checks until the job leaves the pending state or `deadline` passes.
    ///
    /// The first check goes out immediately; later ones are spaced by the
    /// poll interval.
    pub async fn poll(
        &self,
        request: &JobRequest,
        session: &Session,
        deadline: &Deadline,
    ) -> OtlResult<JobHandle> {
        deadline.guard(self.poll_until_done(request, session)).await
    }

    async fn poll_until_done(&self, request: &JobRequest, session: &Session) -> OtlResult<JobHandle> {
        let mut checks = 0usize;
        loop {
            checks += 1;
            match self.check(request, session).await? {
                JobState::Succeeded(handle) => {
                    info!(stage = STAGE, cid = %handle, checks, "job finished");
                    return Ok(handle);
                }
                JobState::Failed(message) => return Err(OtlError::JobExecution(message)),
                JobState::Canceled => return Err(OtlError::JobCanceled),
                JobState::Pending(status) => {
                    debug!(stage = STAGE, status = ?status, checks, "job still running");
                    sleep(self.interval).await;
                }
            }
        }
    }

    /// One status check.
    pub async fn check(&self, request: &JobRequest, session: &Session) -> OtlResult<JobState> {
        let http_request = HttpRequest::get(STAGE, CHECKJOB_PATH)
            .with_query(request.fields())
            .with_cookie(session.cookie());
        let response = self.transport.send(http_request).await?;
        JobState::from_envelope(response.json(STAGE)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(body: Value) -> OtlResult<JobState> {
        JobState::from_envelope(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn classifies_status_values() {
        assert_eq!(
            state(json!({"status": "success", "cid": 17})).unwrap(),
            JobState::Succeeded(JobHandle::new("17"))
        );
        assert_eq!(
            state(json!({"status": "failed", "error": "syntax error"})).unwrap(),
            JobState::Failed("syntax error".into())
        );
        assert_eq!(state(json!({"status": "canceled"})).unwrap(), JobState::Canceled);
        assert_eq!(
            state(json!({"status": "running"})).unwrap(),
            JobState::Pending(Some("running".into()))
        );
        assert_eq!(state(json!({})).unwrap(), JobState::Pending(None));
    }

    #[test]
    fn success_without_cid_is_an_error() {
        assert!(matches!(
            state(json!({"status": "success"})),
            Err(OtlError::JobExecution(_))
        ));
    }
}
