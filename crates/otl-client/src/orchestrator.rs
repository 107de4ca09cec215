//! End-to-end run of one query: login, submit, wait, locate, download, assemble.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bon::Builder;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    api::{
        Authenticator, Credentials, DEFAULT_POLL_INTERVAL, JobPoller, JobRequest, JobSubmitter,
        ResultLocator, ShardFetcher, SubmitEncoding,
    },
    cache::current_bucket,
    deadline::Deadline,
    error::{OtlError, OtlResult},
    retry::retry_once_after_invalidate,
    table::{
        ResultTable,
        assemble::assemble,
        schema::{DdlSchemaParser, SchemaParser},
    },
    transport::{HttpTransport, SharedTransport},
};

/// Fixed steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Authenticate,
    SubmitJob,
    AwaitCompletion,
    LocateResults,
    FetchShards,
    Assemble,
}

pub const TOTAL_STAGES: usize = 6;

impl Stage {
    pub const ALL: [Stage; TOTAL_STAGES] = [
        Stage::Authenticate,
        Stage::SubmitJob,
        Stage::AwaitCompletion,
        Stage::LocateResults,
        Stage::FetchShards,
        Stage::Assemble,
    ];

    /// 1-based position.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Authenticate => "Authenticating",
            Stage::SubmitJob => "Submitting job",
            Stage::AwaitCompletion => "Waiting for the job to finish",
            Stage::LocateResults => "Locating results",
            Stage::FetchShards => "Downloading result shards",
            Stage::Assemble => "Assembling table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: &'static str,
    pub stage: usize,
    pub total: usize,
}

impl From<Stage> for ProgressEvent {
    fn from(stage: Stage) -> Self {
        Self {
            message: stage.message(),
            stage: stage.number(),
            total: TOTAL_STAGES,
        }
    }
}

/// Reports each stage once, even when a retry walks back through it.
struct StageTracker<'a> {
    reached: AtomicUsize,
    sink: &'a (dyn Fn(ProgressEvent) + Send + Sync),
}

impl<'a> StageTracker<'a> {
    fn new(sink: &'a (dyn Fn(ProgressEvent) + Send + Sync)) -> Self {
        Self {
            reached: AtomicUsize::new(0),
            sink,
        }
    }

    fn enter(&self, stage: Stage) {
        let number = stage.number();
        if self.reached.fetch_max(number, Ordering::SeqCst) < number {
            info!(stage = number, total = TOTAL_STAGES, "{}", stage.message());
            (self.sink)(ProgressEvent::from(stage));
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct ClientOptions {
    #[builder(into)]
    pub base_address: String,
    /// Per HTTP request.
    #[builder(default = Duration::from_secs(60))]
    pub request_timeout: Duration,
    /// Period of the session cache bucket.
    #[builder(default = Duration::from_secs(24 * 60 * 60))]
    pub login_cache_ttl: Duration,
    #[builder(default = 3)]
    pub login_cache_capacity: u64,
    #[builder(default = 100)]
    pub result_cache_capacity: u64,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// Shard download workers; 0 means host parallelism.
    #[builder(default)]
    pub max_parallelism: usize,
    #[builder(default)]
    pub submit_encoding: SubmitEncoding,
}

/// Cheap to clone; clones share the session and result-location caches.
#[derive(Clone)]
pub struct OtlClient {
    authenticator: Authenticator,
    submitter: JobSubmitter,
    poller: JobPoller,
    locator: ResultLocator,
    fetcher: ShardFetcher,
    parser: Arc<dyn SchemaParser>,
    login_cache_ttl: Duration,
}

impl fmt::Debug for OtlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlClient")
            .field("poll_interval", &self.poller.interval())
            .field("parallelism", &self.fetcher.parallelism())
            .field("login_cache_ttl", &self.login_cache_ttl)
            .finish_non_exhaustive()
    }
}

impl OtlClient {
    pub fn new(options: &ClientOptions) -> OtlResult<Self> {
        let transport = HttpTransport::new(&options.base_address, options.request_timeout)?;
        Ok(Self::with_transport(options, Arc::new(transport)))
    }

    pub fn with_transport(options: &ClientOptions, transport: SharedTransport) -> Self {
        Self {
            authenticator: Authenticator::new(
                Arc::clone(&transport),
                options.login_cache_capacity,
            ),
            submitter: JobSubmitter::new(Arc::clone(&transport), options.submit_encoding),
            poller: JobPoller::new(Arc::clone(&transport), options.poll_interval),
            locator: ResultLocator::new(Arc::clone(&transport), options.result_cache_capacity),
            fetcher: ShardFetcher::new(transport, options.max_parallelism),
            parser: Arc::new(DdlSchemaParser),
            login_cache_ttl: options.login_cache_ttl,
        }
    }

    pub fn with_schema_parser(mut self, parser: Arc<dyn SchemaParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Runs `request` to completion within `request.timeout` seconds.
    ///
    /// `progress` sees each [`Stage`] once, in order. When the deadline
    /// passes, in-flight work is dropped and the result is
    /// [`OtlError::Timeout`] whatever else went wrong.
    pub async fn run<P>(
        &self,
        credentials: &Credentials,
        request: &JobRequest,
        progress: P,
    ) -> OtlResult<ResultTable>
    where
        P: Fn(ProgressEvent) + Send + Sync,
    {
        let started = Instant::now();
        let deadline = Deadline::after(Duration::from_secs(request.timeout));
        let tracker = StageTracker::new(&progress);

        let outcome = deadline
            .guard(self.pipeline(credentials, request, &deadline, &tracker))
            .await;

        let elapsed = started.elapsed();
        match &outcome {
            Ok(table) => info!(
                rows = table.num_rows(),
                columns = table.num_columns(),
                elapsed_secs = elapsed.as_secs_f64(),
                "query finished"
            ),
            Err(err) => warn!(
                error = %err,
                elapsed_secs = elapsed.as_secs_f64(),
                "query failed"
            ),
        }
        outcome
    }

    async fn pipeline(
        &self,
        credentials: &Credentials,
        request: &JobRequest,
        deadline: &Deadline,
        tracker: &StageTracker<'_>,
    ) -> OtlResult<ResultTable> {
        let (authenticator, submitter) = (&self.authenticator, &self.submitter);
        let login_bucket = current_bucket(self.login_cache_ttl);

        let session = retry_once_after_invalidate(
            "makejob",
            OtlError::is_stale_session,
            move || authenticator.invalidate(credentials),
            move || async move {
                tracker.enter(Stage::Authenticate);
                let session = authenticator
                    .login(credentials, login_bucket, deadline)
                    .await?;
                tracker.enter(Stage::SubmitJob);
                submitter
                    .submit(request, &credentials.username, &session, deadline)
                    .await?;
                Ok(session)
            },
        )
        .await?;

        tracker.enter(Stage::AwaitCompletion);
        let handle = self.poller.poll(request, &session, deadline).await?;

        let (locator, fetcher) = (&self.locator, &self.fetcher);
        let (handle, session) = (&handle, &session);
        let result_bucket = current_bucket(Duration::from_secs(request.cache_ttl));

        let (locations, payloads) = retry_once_after_invalidate(
            "fetch_shards",
            OtlError::is_stale_location,
            move || locator.invalidate(handle),
            move || async move {
                tracker.enter(Stage::LocateResults);
                let locations = locator
                    .locate(handle, result_bucket, session, deadline)
                    .await?;
                tracker.enter(Stage::FetchShards);
                let payloads = fetcher.fetch_all(&locations, session, deadline).await?;
                Ok((locations, payloads))
            },
        )
        .await?;

        tracker.enter(Stage::Assemble);
        assemble(&locations, &payloads, self.parser.as_ref())
    }
}
