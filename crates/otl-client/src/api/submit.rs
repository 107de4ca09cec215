use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    api::{
        MAKEJOB_PATH,
        types::{Envelope, JobAccepted, JobRequest, Session},
    },
    deadline::Deadline,
    error::{OtlError, OtlResult},
    transport::{HttpRequest, RequestBody, SharedTransport},
};

const STAGE: &str = "makejob";

/// Correlation tokens are drawn from `[TOKEN_MIN, TOKEN_MAX)`.
///
/// With n jobs visible to the server at once the collision probability is
/// about n² / (2 · 9·10¹⁵).
const TOKEN_MIN: u64 = 1_000_000_000_000_000;
const TOKEN_MAX: u64 = 10_000_000_000_000_000;

/// How the job fields are put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitEncoding {
    #[default]
    Multipart,
    UrlEncoded,
}

pub fn correlation_token() -> String {
    rand::thread_rng()
        .gen_range(TOKEN_MIN..TOKEN_MAX)
        .to_string()
}

/// Request fields merged with the per-submission fields; the latter win.
pub fn job_fields(request: &JobRequest, username: &str, token: &str) -> Vec<(String, String)> {
    let additional = [
        ("sid", token),
        ("username", username),
        ("field_extraction", "false"),
        ("preview", "false"),
    ];

    let mut fields: Vec<(String, String)> = request
        .fields()
        .into_iter()
        .filter(|(name, _)| !additional.iter().any(|(extra, _)| extra == name))
        .collect();
    fields.extend(
        additional
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string())),
    );
    fields
}

#[derive(Debug, Clone)]
pub struct JobSubmitter {
    transport: SharedTransport,
    encoding: SubmitEncoding,
}

impl JobSubmitter {
    pub fn new(transport: SharedTransport, encoding: SubmitEncoding) -> Self {
        Self {
            transport,
            encoding,
        }
    }

    /// Creates the job. An HTTP 401 comes back as a transport error so the
    /// caller can refresh the session.
    pub async fn submit(
        &self,
        request: &JobRequest,
        username: &str,
        session: &Session,
        deadline: &Deadline,
    ) -> OtlResult<JobAccepted> {
        deadline
            .guard(self.submit_inner(request, username, session))
            .await
    }

    async fn submit_inner(
        &self,
        request: &JobRequest,
        username: &str,
        session: &Session,
    ) -> OtlResult<JobAccepted> {
        let token = correlation_token();
        info!(stage = STAGE, sid = %token, encoding = ?self.encoding, "creating job");

        let fields = job_fields(request, username, &token);
        let body = match self.encoding {
            SubmitEncoding::Multipart => RequestBody::Multipart(fields),
            SubmitEncoding::UrlEncoded => RequestBody::UrlEncoded(fields),
        };
        let http_request = HttpRequest::post(STAGE, MAKEJOB_PATH, body).with_cookie(session.cookie());

        let response = self.transport.send(http_request).await?;
        let envelope: Envelope = response.json(STAGE)?;
        if !envelope.is_success() {
            return Err(OtlError::JobSubmission(envelope.describe()));
        }

        debug!(stage = STAGE, sid = %token, "job accepted");
        Ok(JobAccepted {
            response: envelope.rest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_numeric_and_in_range() {
        for _ in 0..64 {
            let token = correlation_token();
            let value: u64 = token.parse().expect("numeric token");
            assert!((TOKEN_MIN..TOKEN_MAX).contains(&value));
            assert_eq!(token.len(), 16);
        }
    }

    #[test]
    fn fields_merge_request_and_fixed_flags() {
        let request = JobRequest::builder()
            .query("search index=main")
            .tws(10)
            .twf(20)
            .cache_ttl(60)
            .timeout(120)
            .build();
        let fields = job_fields(&request, "alice", "1234");
        let get = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        assert_eq!(get("original_otl"), Some("search index=main"));
        assert_eq!(get("tws"), Some("10"));
        assert_eq!(get("sid"), Some("1234"));
        assert_eq!(get("username"), Some("alice"));
        assert_eq!(get("field_extraction"), Some("false"));
        assert_eq!(get("preview"), Some("false"));
        assert_eq!(fields.len(), 9);
    }

    #[test]
    fn encoding_names_round_trip_through_config() {
        let parsed: SubmitEncoding = serde_json::from_str("\"urlencoded\"").unwrap();
        assert_eq!(parsed, SubmitEncoding::UrlEncoded);
        assert_eq!(SubmitEncoding::default(), SubmitEncoding::Multipart);
    }
}
