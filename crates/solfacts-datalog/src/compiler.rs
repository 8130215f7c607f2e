//! Assemble and compile Soufflé programs.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::DatalogError;
use crate::config::CompilerConfig;
use crate::schema::{RelationSchema, Schema};

/// Builds complete programs from a schema plus rule text, and compiles them
/// into standalone executables.
pub struct RuleCompiler {
    config: CompilerConfig,
}

impl RuleCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Generate the `.input` directive for a relation.
    pub fn input_directive(relation: &str) -> String {
        format!(".input {relation}(IO=file, filename=\"{relation}.csv\", rfc4180=true)")
    }

    /// Generate the `.output` directive for a relation.
    pub fn output_directive(relation: &str) -> String {
        format!(".output {relation}(IO=file, filename=\"{relation}.csv\", rfc4180=true)")
    }

    /// A complete program: the schema's types, declarations and membership
    /// rules, an input directive per encoded relation, the caller's `rules`
    /// (which declare the output relations), then an output directive per
    /// entry of `outputs`.
    pub fn assemble(schema: &Schema, rules: &str, outputs: &[RelationSchema]) -> String {
        let mut program = schema.to_datalog();

        program.push_str("\n// Inputs\n");
        for relation in schema.inputs() {
            program.push_str(&Self::input_directive(&relation.name));
            program.push('\n');
        }

        program.push_str("\n// Rules\n");
        program.push_str(rules.trim_end());
        program.push('\n');

        if !outputs.is_empty() {
            program.push_str("\n// Outputs\n");
            for relation in outputs {
                program.push_str(&Self::output_directive(&relation.name));
                program.push('\n');
            }
        }
        program
    }

    /// Compile `program` into an executable at `output`.
    pub async fn compile(&self, program: &str, output: &Path) -> Result<PathBuf, DatalogError> {
        if !Self::is_souffle_available(&self.config.souffle).await {
            return Err(DatalogError::SouffleNotFound(
                self.config.souffle.display().to_string(),
            ));
        }

        // Write program to temp file
        let temp_dir = tempfile::tempdir()?;
        let program_path = temp_dir.path().join("analysis.dl");
        tokio::fs::write(&program_path, program).await?;

        let mut command = Command::new(&self.config.souffle);
        command.arg(&program_path).arg("-o").arg(output);
        if let Some(dir) = &self.config.functors_dir {
            command.arg("-L").arg(dir);
        }
        command.args(&self.config.extra_flags);

        debug!(
            program_path = %program_path.display(),
            output = %output.display(),
            "compiling rule program"
        );

        let result = command.output().await?;
        let stderr = String::from_utf8_lossy(&result.stderr);
        if !result.status.success() {
            warn!(stderr = %stderr, "rule program failed to compile");
            return Err(DatalogError::Compile(stderr.into_owned()));
        }
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "souffle stderr (non-fatal)");
        }
        Ok(output.to_path_buf())
    }

    /// Check whether the `souffle` binary can be found.
    pub async fn is_souffle_available(souffle: &Path) -> bool {
        if souffle.components().count() > 1 {
            return tokio::fs::metadata(souffle).await.is_ok();
        }
        Command::new("which")
            .arg(souffle)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
