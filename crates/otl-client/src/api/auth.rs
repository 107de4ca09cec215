use serde_json::json;
use tracing::{debug, info};

use crate::{
    api::{
        LOGIN_PATH,
        types::{Credentials, Envelope, Session},
    },
    cache::TtlCache,
    deadline::Deadline,
    error::{OtlError, OtlResult, TransportError},
    transport::{HttpRequest, RequestBody, SharedTransport},
};

const STAGE: &str = "login";

/// Exchanges credentials for a session cookie, memoized per credentials and bucket.
#[derive(Debug, Clone)]
pub struct Authenticator {
    transport: SharedTransport,
    cache: TtlCache<Credentials, Session>,
}

impl Authenticator {
    pub fn new(transport: SharedTransport, capacity: u64) -> Self {
        Self {
            transport,
            cache: TtlCache::new(capacity),
        }
    }

    pub async fn login(
        &self,
        credentials: &Credentials,
        bucket: u64,
        deadline: &Deadline,
    ) -> OtlResult<Session> {
        let lookup =
            self.cache
                .get_or_compute(credentials.clone(), bucket, || self.authenticate(credentials));
        deadline.guard(lookup).await
    }

    /// Forces the next [`Authenticator::login`] to hit the network.
    pub async fn invalidate(&self, credentials: &Credentials) {
        debug!(username = %credentials.username, "dropping cached session");
        self.cache.invalidate(credentials).await;
    }

    async fn authenticate(&self, credentials: &Credentials) -> OtlResult<Session> {
        info!(stage = STAGE, username = %credentials.username, "authenticating");
        let body = RequestBody::Json(json!({
            "username": credentials.username,
            "password": credentials.password,
        }));

        let response = self
            .transport
            .send(HttpRequest::post(STAGE, LOGIN_PATH, body))
            .await
            .map_err(rejection)?;

        let envelope: Envelope = response
            .json(STAGE)
            .map_err(|err| OtlError::Authentication(format!("malformed login response: {err}")))?;
        if !envelope.is_success() {
            return Err(OtlError::Authentication(envelope.describe()));
        }

        let cookies = response.cookies();
        if cookies.is_empty() {
            return Err(OtlError::Authentication(
                "login response carried no session cookie".to_string(),
            ));
        }
        Ok(Session::new(cookies.join("; ")))
    }
}

/// A non-success envelope is a rejection whatever the HTTP status says.
fn rejection(err: TransportError) -> OtlError {
    if let Ok(envelope) = serde_json::from_slice::<Envelope>(err.response_body()) {
        if !envelope.is_success() {
            return OtlError::Authentication(envelope.describe());
        }
    }
    match err.status() {
        Some(status @ (401 | 403)) => {
            OtlError::Authentication(format!("server rejected credentials (HTTP {status})"))
        }
        _ => OtlError::from(err),
    }
}
