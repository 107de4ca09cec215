//! Endpoint clients, one per step of a job's life.

pub mod auth;
pub mod locate;
pub mod poll;
pub mod shards;
pub mod submit;
pub mod types;

pub const LOGIN_PATH: &str = "api/auth/login";
pub const MAKEJOB_PATH: &str = "api/makejob";
pub const CHECKJOB_PATH: &str = "api/checkjob";
pub const GETRESULT_PATH: &str = "api/getresult";

pub use auth::Authenticator;
pub use locate::{ResultLocations, ResultLocator};
pub use poll::{DEFAULT_POLL_INTERVAL, JobPoller, JobState};
pub use shards::{ShardFetcher, ShardPayload, host_parallelism};
pub use submit::{JobSubmitter, SubmitEncoding};
pub use types::{Credentials, JobAccepted, JobHandle, JobRequest, Session};
