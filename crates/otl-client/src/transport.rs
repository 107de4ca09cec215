//! Single HTTP exchanges against the job API.
//!
//! Everything above this module talks to a [`Transport`], so tests can swap
//! the network for a scripted implementation.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client, Method, Url,
    header::{self, HeaderMap},
    multipart,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{OtlError, OtlResult, TransportError};

pub const DEFAULT_CHARSET: &str = "utf-8";
const USER_AGENT: &str = concat!("otl-client/", env!("CARGO_PKG_VERSION"));

/// Payload attached to an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    UrlEncoded(Vec<(String, String)>),
    Multipart(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub stage: &'static str,
    pub method: Method,
    /// Path relative to the base address; a leading `/` is ignored.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub cookie: Option<String>,
}

impl HttpRequest {
    pub fn get(stage: &'static str, path: impl Into<String>) -> Self {
        Self {
            stage,
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            cookie: None,
        }
    }

    pub fn post(stage: &'static str, path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            body,
            ..Self::get(stage, path)
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Charset declared by `Content-Type`, falling back to UTF-8.
    pub fn charset(&self) -> String {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .and_then(|parsed| parsed.get_param(mime::CHARSET).map(|cs| cs.as_str().to_string()))
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
    }

    /// Decodes the body as JSON using the declared charset.
    pub fn json<T: DeserializeOwned>(&self, stage: &'static str) -> OtlResult<T> {
        let charset = self.charset();
        let text = decode_text(&self.body, &charset).ok_or_else(|| OtlError::Decode {
            location: stage.to_string(),
            charset,
        })?;
        serde_json::from_str(&text).map_err(|err| OtlError::json(stage, err))
    }

    /// `name=value` pairs from every `Set-Cookie` header, attributes stripped.
    pub fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Decodes `bytes` with the named charset; `None` for unknown labels or malformed input.
pub fn decode_text(bytes: &[u8], charset: &str) -> Option<String> {
    let encoding = encoding_rs::Encoding::for_label(charset.trim().as_bytes())?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (!had_errors).then(|| text.into_owned())
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Performs one request. Non-2xx answers become [`TransportError::HttpStatus`] carrying the body.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub type SharedTransport = Arc<dyn Transport>;

/// `reqwest`-backed transport rooted at the API base address.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_address: &str, request_timeout: Duration) -> OtlResult<Self> {
        let normalized = if base_address.ends_with('/') {
            base_address.to_string()
        } else {
            format!("{base_address}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|_| OtlError::InvalidBaseUrl(base_address.into()))?;

        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| TransportError::request("build_client", err))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        let relative = path.trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|err| TransportError::UrlJoin {
                path: path.to_string(),
                source: Arc::new(err),
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let stage = request.stage;
        let url = self.resolve(&request.path)?;
        debug!(stage, method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(cookie) = request.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::UrlEncoded(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, value)| {
                        form.text(name, value)
                    });
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::request(stage, err))?;

        let status = response.status();
        debug!(stage, status = status.as_u16(), "response received");
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::body(stage, err))?;

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                stage,
                status: status.as_u16(),
                body,
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
