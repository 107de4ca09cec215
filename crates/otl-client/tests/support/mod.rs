//! Shared fixtures: an in-process transport that answers from a closure and
//! records traffic, plus wiremock helpers in [`mock_api`].

#![allow(dead_code)]

use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, SET_COOKIE};
use serde_json::{Value, json};
use tokio::time::Instant;

use otl_client::{
    ClientOptions, Credentials, HttpRequest, HttpResponse, JobRequest, OtlClient, Transport,
    TransportError,
};

pub const SESSION_COOKIE: &str = "session=scripted";

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    /// Successful login carrying [`SESSION_COOKIE`].
    Login,
    Text(String),
    Status(u16),
    Slow(Duration, Box<Reply>),
}

impl Reply {
    pub fn slow(delay: Duration, reply: Reply) -> Self {
        Self::Slow(delay, Box::new(reply))
    }
}

type Handler = dyn Fn(&HttpRequest) -> Reply + Send + Sync;

pub struct ScriptedTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<(Instant, String)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport").finish_non_exhaustive()
    }
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Paths requested so far, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Arrival times of requests to `path`.
    pub fn times(&self, path: &str) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, logged)| logged == path)
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.times(path).len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.log
            .lock()
            .unwrap()
            .push((Instant::now(), request.path.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let mut reply = (self.handler)(&request);
        while let Reply::Slow(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        let mut headers = HeaderMap::new();
        let body = match reply {
            Reply::Json(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Bytes::from(value.to_string())
            }
            Reply::Login => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(
                    SET_COOKIE,
                    HeaderValue::from_static("session=scripted; Path=/; HttpOnly"),
                );
                Bytes::from(json!({"status": "success"}).to_string())
            }
            Reply::Text(text) => {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                Bytes::from(text)
            }
            Reply::Status(status) => {
                return Err(TransportError::HttpStatus {
                    stage: request.stage,
                    status,
                    body: Bytes::new(),
                });
            }
            Reply::Slow(..) => unreachable!("unwrapped above"),
        };

        Ok(HttpResponse {
            status: 200,
            headers,
            body,
        })
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("admin", "secret")
}

pub fn request(timeout_secs: u64) -> JobRequest {
    JobRequest::builder()
        .query("| otstats count by host")
        .cache_ttl(60)
        .timeout(timeout_secs)
        .build()
}

pub fn client(transport: Arc<ScriptedTransport>, parallelism: usize) -> OtlClient {
    let options = ClientOptions::builder()
        .base_address("http://scripted.invalid")
        .max_parallelism(parallelism)
        .build();
    OtlClient::with_transport(&options, transport)
}

/// Happy-path answers for every endpoint except shards.
pub fn standard_reply(request: &HttpRequest, locations: &[&str]) -> Option<Reply> {
    let reply = match request.path.as_str() {
        "api/auth/login" => Reply::Login,
        "api/makejob" => Reply::Json(json!({"status": "success", "timestamp": 1})),
        "api/checkjob" => Reply::Json(json!({"status": "success", "cid": 42})),
        "api/getresult" => Reply::Json(json!({"status": "success", "data_urls": locations})),
        _ => return None,
    };
    Some(reply)
}

pub mod mock_api;
