use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    api::{
        GETRESULT_PATH,
        types::{Envelope, JobHandle, Session},
    },
    cache::TtlCache,
    deadline::Deadline,
    error::{OtlError, OtlResult},
    transport::{HttpRequest, SharedTransport},
};

const STAGE: &str = "getresult";

/// Ordered shard locations of one result.
pub type ResultLocations = Arc<[String]>;

/// Resolves a finished job to its shard locations, memoized per handle and bucket.
#[derive(Debug, Clone)]
pub struct ResultLocator {
    transport: SharedTransport,
    cache: TtlCache<JobHandle, ResultLocations>,
}

impl ResultLocator {
    pub fn new(transport: SharedTransport, capacity: u64) -> Self {
        Self {
            transport,
            cache: TtlCache::new(capacity),
        }
    }

    pub async fn locate(
        &self,
        handle: &JobHandle,
        bucket: u64,
        session: &Session,
        deadline: &Deadline,
    ) -> OtlResult<ResultLocations> {
        let lookup = self
            .cache
            .get_or_compute(handle.clone(), bucket, || self.fetch(handle, session));
        deadline.guard(lookup).await
    }

    pub async fn invalidate(&self, handle: &JobHandle) {
        debug!(cid = %handle, "dropping cached result locations");
        self.cache.invalidate(handle).await;
    }

    async fn fetch(&self, handle: &JobHandle, session: &Session) -> OtlResult<ResultLocations> {
        info!(stage = STAGE, cid = %handle, "locating result shards");
        let http_request = HttpRequest::get(STAGE, GETRESULT_PATH)
            .with_query(vec![("cid".to_string(), handle.as_str().to_string())])
            .with_cookie(session.cookie());

        let response = self.transport.send(http_request).await?;
        let envelope: Envelope = response.json(STAGE)?;
        if !envelope.is_success() {
            return Err(OtlError::ResultRetrieval(envelope.describe()));
        }

        let locations = data_urls(&envelope)?;
        debug!(stage = STAGE, cid = %handle, shards = locations.len(), "result located");
        Ok(locations)
    }
}

fn data_urls(envelope: &Envelope) -> OtlResult<ResultLocations> {
    let Some(Value::Array(urls)) = envelope.rest.get("data_urls") else {
        return Err(OtlError::ResultRetrieval(format!(
            "response has no data_urls list: {}",
            envelope.describe()
        )));
    };
    urls.iter()
        .map(|url| match url {
            Value::String(location) => Ok(location.clone()),
            other => Err(OtlError::ResultRetrieval(format!(
                "data_urls entry {other} is not a string"
            ))),
        })
        .collect()
}
