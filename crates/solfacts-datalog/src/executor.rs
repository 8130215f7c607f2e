//! Run compiled rule programs.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::DatalogError;
use crate::config::EngineConfig;
use crate::factset::FactSet;
use crate::schema::RelationSchema;
use crate::types::TypeRegistry;

/// Runs a compiled Soufflé program over a fact set.
pub struct SouffleExecutor {
    config: EngineConfig,
}

impl SouffleExecutor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Write `input` to a fresh working directory, run the engine over it and
    /// load the `outputs` it produced.
    ///
    /// A non-zero exit or a timeout is an [`DatalogError::EngineFailure`]
    /// carrying the engine's stderr; nothing is retried.
    pub async fn run(
        &self,
        input: &FactSet,
        outputs: &[RelationSchema],
        registry: &TypeRegistry,
    ) -> Result<FactSet, DatalogError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("solfacts-");
        let work_dir = match &self.config.work_dir_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let result = self.run_in(work_dir.path(), input, outputs, registry).await;

        if self.config.keep_work_dir {
            let kept = work_dir.keep();
            info!(work_dir = %kept.display(), "kept engine working directory");
        }
        result
    }

    async fn run_in(
        &self,
        work_dir: &Path,
        input: &FactSet,
        outputs: &[RelationSchema],
        registry: &TypeRegistry,
    ) -> Result<FactSet, DatalogError> {
        let in_dir = work_dir.join("in");
        let out_dir = work_dir.join("out");
        tokio::fs::create_dir_all(&in_dir).await?;
        tokio::fs::create_dir_all(&out_dir).await?;
        input.write(&in_dir)?;

        let mut command = Command::new(&self.config.engine);
        command
            .arg("-F")
            .arg(&in_dir)
            .arg("-D")
            .arg(&out_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(jobs) = self.config.jobs {
            command.arg("-j").arg(jobs.to_string());
        }
        if let Some(dir) = &self.config.functors_dir {
            command.env("LD_LIBRARY_PATH", library_path(dir));
        }

        debug!(
            engine = %self.config.engine.display(),
            in_dir = %in_dir.display(),
            out_dir = %out_dir.display(),
            jobs = ?self.config.jobs,
            "running engine"
        );

        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output?,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "engine timed out");
                    return Err(DatalogError::EngineFailure {
                        status: format!("timed out after {}ms", limit.as_millis()),
                        stderr: String::new(),
                    });
                }
            },
            None => command.output().await?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            warn!(status = %output.status, stderr = %stderr, "engine failed");
            return Err(DatalogError::EngineFailure {
                status: output.status.to_string(),
                stderr,
            });
        }

        // Log stderr warnings even on success
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "engine stderr (non-fatal)");
        }

        let facts = FactSet::read(&out_dir, outputs, registry)?;
        debug!(relations = outputs.len(), tuples = facts.len(), "engine completed");
        Ok(facts)
    }
}

/// `dir` prepended to any inherited `LD_LIBRARY_PATH`.
fn library_path(dir: &Path) -> OsString {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("LD_LIBRARY_PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| dir.as_os_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_path_starts_with_functors_dir() {
        let joined = library_path(Path::new("/opt/functors"));
        let first = std::env::split_paths(&joined).next().unwrap();
        assert_eq!(first, Path::new("/opt/functors"));
    }
}
