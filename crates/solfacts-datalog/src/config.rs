//! Engine and compiler configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::DatalogError;

pub const ENV_ENGINE: &str = "SOLFACTS_ENGINE";
pub const ENV_FUNCTORS_DIR: &str = "SOLFACTS_FUNCTORS_DIR";
pub const ENV_JOBS: &str = "SOLFACTS_JOBS";
pub const ENV_TIMEOUT_SECS: &str = "SOLFACTS_TIMEOUT_SECS";
pub const ENV_KEEP_WORKDIR: &str = "SOLFACTS_KEEP_WORKDIR";

/// How to run a compiled rule program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the compiled executable.
    pub engine: PathBuf,
    /// Directory holding the functor shared library.
    pub functors_dir: Option<PathBuf>,
    /// Worker thread count passed as `-j`.
    pub jobs: Option<usize>,
    /// Wall-clock limit for one run, in whole seconds when deserialized.
    #[serde(
        rename = "timeout_secs",
        deserialize_with = "deserialize_secs",
        serialize_with = "serialize_secs"
    )]
    pub timeout: Option<Duration>,
    /// Where working directories are created; the system temp dir if unset.
    pub work_dir_root: Option<PathBuf>,
    /// Keep working directories after the run instead of deleting them.
    pub keep_work_dir: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("analysis")
    }
}

impl EngineConfig {
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            functors_dir: None,
            jobs: None,
            timeout: None,
            work_dir_root: None,
            keep_work_dir: false,
        }
    }

    pub fn with_functors_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.functors_dir = Some(dir.into());
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_work_dir_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir_root = Some(dir.into());
        self
    }

    pub fn keep_work_dir(mut self, keep: bool) -> Self {
        self.keep_work_dir = keep;
        self
    }

    /// Defaults overridden by the `SOLFACTS_*` environment variables.
    pub fn from_env() -> Result<Self, DatalogError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DatalogError> {
        let mut config = Self::default();
        if let Some(engine) = lookup(ENV_ENGINE) {
            config.engine = PathBuf::from(engine);
        }
        if let Some(dir) = lookup(ENV_FUNCTORS_DIR) {
            config.functors_dir = Some(PathBuf::from(dir));
        }
        if let Some(jobs) = lookup(ENV_JOBS) {
            config.jobs = Some(parse_env(ENV_JOBS, &jobs)?);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = Some(Duration::from_secs(parse_env(ENV_TIMEOUT_SECS, &secs)?));
        }
        if let Some(keep) = lookup(ENV_KEEP_WORKDIR) {
            config.keep_work_dir = is_truthy(&keep);
        }
        Ok(config)
    }
}

/// How to compile a rule program with `souffle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// The `souffle` binary.
    pub souffle: PathBuf,
    /// Directory searched for functor libraries, passed as `-L`.
    pub functors_dir: Option<PathBuf>,
    /// Extra arguments appended to the command line.
    pub extra_flags: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            souffle: PathBuf::from("souffle"),
            functors_dir: None,
            extra_flags: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn with_souffle(mut self, souffle: impl Into<PathBuf>) -> Self {
        self.souffle = souffle.into();
        self
    }

    pub fn with_functors_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.functors_dir = Some(dir.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.extra_flags.push(flag.into());
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DatalogError> {
    value
        .trim()
        .parse()
        .map_err(|_| DatalogError::Config(format!("{key}: invalid value {value:?}")))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}

fn serialize_secs<S>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    timeout.map(|t| t.as_secs()).serialize(serializer)
}
