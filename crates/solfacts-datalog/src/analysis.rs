//! One analysis session: encode trees, run the engine, lift the results.

use solfacts_ast::{Grammar, Node, NodeIndex};
use tracing::debug;

use crate::DatalogError;
use crate::config::EngineConfig;
use crate::derived::{CompilerVersion, Enrichment, SolidityEnrichment};
use crate::encoder::FactEncoder;
use crate::executor::SouffleExecutor;
use crate::factset::FactSet;
use crate::lift::ResultLifter;
use crate::program::ProgramInterface;
use crate::schema::{Schema, SkipSet};
use crate::types::TypeRegistry;

/// A derived schema bound to one compiled rule program.
///
/// The session owns everything a run needs; nothing is shared between
/// sessions, so independent sessions may run concurrently.
pub struct Analysis {
    schema: Schema,
    enrichment: Box<dyn Enrichment>,
    executor: SouffleExecutor,
    interface: ProgramInterface,
    /// The schema's types plus the program's own.
    registry: TypeRegistry,
}

impl Analysis {
    pub fn new(
        grammar: &Grammar,
        skip: &SkipSet,
        enrichment: Box<dyn Enrichment>,
        interface: ProgramInterface,
        config: EngineConfig,
    ) -> Result<Self, DatalogError> {
        let schema = Schema::derive(grammar, skip, enrichment.as_ref())?;
        let mut registry = schema.registry().clone();
        interface.register_types(&mut registry)?;

        Ok(Self {
            schema,
            enrichment,
            executor: SouffleExecutor::new(config),
            interface,
            registry,
        })
    }

    /// A session over the Solidity grammar with the standard skip set and
    /// Solidity derived facts.
    pub fn solidity(
        interface: ProgramInterface,
        config: EngineConfig,
        compiler_version: Option<CompilerVersion>,
    ) -> Result<Self, DatalogError> {
        let mut enrichment = SolidityEnrichment::new();
        if let Some(version) = compiler_version {
            enrichment = enrichment.with_compiler_version(version);
        }
        Self::new(
            &solfacts_ast::solidity::grammar(),
            &SkipSet::standard(),
            Box::new(enrichment),
            interface,
            config,
        )
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Encode `roots` without running anything.
    pub fn encode<'n>(
        &self,
        roots: impl IntoIterator<Item = &'n Node>,
    ) -> Result<FactSet, DatalogError> {
        FactEncoder::new(&self.schema, self.enrichment.as_ref()).encode_all(roots)
    }

    /// Encode `roots`, run the engine and load the named output relations.
    ///
    /// The encoded input is released once the engine has finished, whether
    /// or not it succeeded.
    pub async fn run<'n, S: AsRef<str>>(
        &self,
        roots: impl IntoIterator<Item = &'n Node>,
        outputs: &[S],
    ) -> Result<FactSet, DatalogError> {
        let outputs = self.interface.outputs(outputs)?;
        let input = self.encode(roots)?;

        let result = self.executor.run(&input, &outputs, &self.registry).await;
        let released = input.release();
        debug!(released, ok = result.is_ok(), "analysis run finished");
        result
    }

    /// A lifter resolving identifiers against `nodes`, which should index the
    /// trees passed to [`Analysis::run`].
    pub fn lifter<'r, 'a>(&'r self, nodes: &'r NodeIndex<'a>) -> ResultLifter<'r, 'a> {
        ResultLifter::new(&self.registry, nodes)
    }
}
