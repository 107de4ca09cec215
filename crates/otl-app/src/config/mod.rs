//! Layered configuration: defaults, settings files, then `OTL__*` environment.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use directories::ProjectDirs;
use otl_client::{ClientOptions, Credentials, JobRequest, SubmitEncoding};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "config/settings";
const ENV_PREFIX: &str = "OTL";
/// Points at a single settings file that overrides every other file.
pub const CONFIG_FILE_ENV: &str = "OTL_CONFIG_FILE";
/// Replaces `/etc` as the root of the system-wide settings.
pub const ETC_DIR_ENV: &str = "OTL_ETC_CONFIG_DIR";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error(transparent)]
    Build(#[from] config::ConfigError),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub caching: CachingConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_address: String,
    pub username: String,
    pub password: String,
    /// Per HTTP request, seconds.
    pub request_timeout_secs: u64,
}

/// All durations in seconds.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CachingConfig {
    pub default_job_timeout: u64,
    pub default_request_cache_ttl: u64,
    pub login_cache_ttl: u64,
    pub login_cache_capacity: u64,
    pub result_cache_capacity: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub poll_interval_ms: u64,
    /// 0 uses every available core.
    pub max_parallelism: usize,
    pub submit_encoding: SubmitEncoding,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.remote.base_address.trim().is_empty() {
            return Err(invalid("remote.base_address", "must not be empty"));
        }
        let positive = [
            ("remote.request_timeout_secs", self.remote.request_timeout_secs),
            ("caching.default_job_timeout", self.caching.default_job_timeout),
            ("caching.login_cache_capacity", self.caching.login_cache_capacity),
            ("caching.result_cache_capacity", self.caching.result_cache_capacity),
            ("client.poll_interval_ms", self.client.poll_interval_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::builder()
            .base_address(self.remote.base_address.trim())
            .request_timeout(Duration::from_secs(self.remote.request_timeout_secs))
            .login_cache_ttl(Duration::from_secs(self.caching.login_cache_ttl))
            .login_cache_capacity(self.caching.login_cache_capacity)
            .result_cache_capacity(self.caching.result_cache_capacity)
            .poll_interval(Duration::from_millis(self.client.poll_interval_ms))
            .max_parallelism(self.client.max_parallelism)
            .submit_encoding(self.client.submit_encoding)
            .build()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.remote.username, &self.remote.password)
    }

    /// Per-call overrides win over the configured defaults.
    pub fn job_request(
        &self,
        query: impl Into<String>,
        tws: i64,
        twf: i64,
        timeout: Option<u64>,
        cache_ttl: Option<u64>,
    ) -> JobRequest {
        JobRequest::builder()
            .query(query)
            .tws(tws)
            .twf(twf)
            .timeout(timeout.unwrap_or(self.caching.default_job_timeout))
            .cache_ttl(cache_ttl.unwrap_or(self.caching.default_request_cache_ttl))
            .build()
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.remote.password.is_empty() {
            copy.remote.password = REDACTED.to_string();
        }
        copy
    }
}

fn invalid(field: &'static str, reason: &str) -> AppConfigError {
    AppConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Loads and validates the configuration.
///
/// Later sources win: built-in defaults, `$OTL_ETC_CONFIG_DIR/otl/settings`
/// (default `/etc`), the per-user config dir, `./config/settings`, the file
/// named by `OTL_CONFIG_FILE`, then `OTL__SECTION__KEY` variables.
pub fn load() -> Result<AppConfig, AppConfigError> {
    let mut builder = with_defaults(Config::builder())?;
    for path in settings_files() {
        builder = builder.add_source(File::with_name(&path.to_string_lossy()).required(false));
    }
    if let Some(path) = env::var_os(CONFIG_FILE_ENV) {
        builder = builder.add_source(File::from(Path::new(&path)).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, AppConfigError> {
    Ok(builder
        .set_default("remote.base_address", "http://localhost:50000")?
        .set_default("remote.username", "admin")?
        .set_default("remote.password", "")?
        .set_default("remote.request_timeout_secs", 60)?
        .set_default("caching.default_job_timeout", 60)?
        .set_default("caching.default_request_cache_ttl", 60)?
        .set_default("caching.login_cache_ttl", 24 * 60 * 60)?
        .set_default("caching.login_cache_capacity", 3)?
        .set_default("caching.result_cache_capacity", 100)?
        .set_default("client.poll_interval_ms", 500)?
        .set_default("client.max_parallelism", 0)?
        .set_default("client.submit_encoding", "multipart")?)
}

/// Extension-less settings paths, lowest precedence first.
fn settings_files() -> Vec<PathBuf> {
    let etc_root = env::var_os(ETC_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc"));

    let mut files = vec![etc_root.join("otl").join("settings")];
    if let Some(dirs) = project_dirs() {
        files.push(dirs.config_dir().join("settings"));
    }
    files.push(PathBuf::from(CONFIG_FILE));
    files
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "otl", "otl")
}
