//! Client for an asynchronous remote job API.
//!
//! A run logs in, submits a query as a job, polls until the job settles,
//! looks up where the result shards live, downloads them in parallel and
//! assembles a typed [`ResultTable`]. Sessions and result locations are
//! cached in time buckets; a rejected session or a vanished shard triggers
//! one invalidate-and-retry.

pub mod api;
pub mod cache;
pub mod deadline;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod table;
pub mod transport;

pub use api::{
    Credentials, JobHandle, JobRequest, Session, ShardPayload, SubmitEncoding, host_parallelism,
};
pub use deadline::Deadline;
pub use error::{OtlError, OtlResult, TransportError};
pub use orchestrator::{ClientOptions, OtlClient, ProgressEvent, Stage, TOTAL_STAGES};
pub use table::{
    Column, ColumnData, INDEX_NAME, ResultTable,
    schema::{ColumnType, DdlSchemaParser, Schema, SchemaError, SchemaParser},
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody, SharedTransport, Transport};
