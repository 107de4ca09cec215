//! Parallel download of result shards.

use std::{collections::VecDeque, num::NonZeroUsize, sync::Arc, thread};

use bytes::Bytes;
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{
    api::types::Session,
    deadline::Deadline,
    error::{OtlError, OtlResult},
    transport::{HttpRequest, SharedTransport, decode_text},
};

const STAGE: &str = "shard";

/// Raw shard body plus the charset its response declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPayload {
    pub location: String,
    pub body: Bytes,
    pub charset: String,
}

impl ShardPayload {
    pub fn text(&self) -> OtlResult<String> {
        decode_text(&self.body, &self.charset).ok_or_else(|| OtlError::Decode {
            location: self.location.clone(),
            charset: self.charset.clone(),
        })
    }
}

pub fn host_parallelism() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

#[derive(Debug, Clone)]
pub struct ShardFetcher {
    transport: SharedTransport,
    parallelism: usize,
}

impl ShardFetcher {
    /// `parallelism == 0` uses the host's available parallelism.
    pub fn new(transport: SharedTransport, parallelism: usize) -> Self {
        let parallelism = match parallelism {
            0 => host_parallelism(),
            n => n,
        };
        Self {
            transport,
            parallelism,
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Downloads every location; the output is aligned with `locations`.
    ///
    /// The first failure aborts the remaining downloads.
    pub async fn fetch_all(
        &self,
        locations: &[String],
        session: &Session,
        deadline: &Deadline,
    ) -> OtlResult<Vec<ShardPayload>> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        deadline.guard(self.run_workers(locations, session)).await
    }

    async fn run_workers(
        &self,
        locations: &[String],
        session: &Session,
    ) -> OtlResult<Vec<ShardPayload>> {
        let workers = locations.len().min(self.parallelism).max(1);
        info!(stage = STAGE, shards = locations.len(), workers, "downloading shards");

        let queue: VecDeque<(usize, String)> = locations.iter().cloned().enumerate().collect();
        let queue = Arc::new(Mutex::new(queue));
        let cookie: Arc<str> = Arc::from(session.cookie());

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let transport = Arc::clone(&self.transport);
            let cookie = Arc::clone(&cookie);
            tasks.spawn(async move {
                let mut fetched = Vec::new();
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, location)) = next else {
                        break;
                    };
                    let payload = fetch_one(&transport, location, &cookie).await?;
                    fetched.push((index, payload));
                }
                Ok::<_, OtlError>(fetched)
            });
        }

        let mut slots: Vec<Option<ShardPayload>> = locations.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let batch = match joined {
                Ok(Ok(batch)) => batch,
                Ok(Err(err)) => {
                    warn!(stage = STAGE, error = %err, "shard download failed; aborting the rest");
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(OtlError::WorkerJoin(join_err.to_string()));
                }
            };
            for (index, payload) in batch {
                slots[index] = Some(payload);
            }
        }

        slots
            .into_iter()
            .zip(locations)
            .map(|(slot, location)| {
                slot.ok_or_else(|| OtlError::WorkerJoin(format!("no worker delivered `{location}`")))
            })
            .collect()
    }
}

async fn fetch_one(
    transport: &SharedTransport,
    location: String,
    cookie: &str,
) -> OtlResult<ShardPayload> {
    let request = HttpRequest::get(STAGE, location.as_str()).with_cookie(cookie);
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(source) => return Err(OtlError::ShardFetch { location, source }),
    };
    debug!(stage = STAGE, location = %location, bytes = response.body.len(), "shard fetched");
    Ok(ShardPayload {
        charset: response.charset(),
        body: response.body,
        location,
    })
}
