// Pipeline registry — named analysis pipelines, filters and normalizers.
//
// The registry is filled during startup through `&mut self` and then frozen
// behind an Arc. After `freeze` nothing can register anymore, so readers on
// any thread see a fixed set of definitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::definitions::AnalysisDefinitions;
use super::pipeline::{
    AnalysisPipeline, FilterRef, FilterSpec, NamedFilter, Normalizer, ResolvedNormalizer,
    ResolvedPipeline, BUILTIN_FILTERS,
};
use crate::error::ConfigError;
use crate::store::models::IndexSpec;

/// Prefix of the names generated for inline filters. Named filters may not
/// start with it, so a generated name never shadows a defined one.
pub const INLINE_FILTER_PREFIX: &str = "_inline_";

#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    filters: BTreeMap<String, FilterSpec>,
    pipelines: BTreeMap<String, AnalysisPipeline>,
    normalizers: BTreeMap<String, Normalizer>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a definitions document.
    ///
    /// Fails on the first bad definition; a partially filled registry is
    /// never returned.
    pub fn from_definitions(definitions: &AnalysisDefinitions) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (name, spec) in &definitions.filters {
            registry.define_filter(name, spec.clone())?;
        }
        for pipeline in &definitions.pipelines {
            registry.register(pipeline.clone())?;
        }
        for normalizer in &definitions.normalizers {
            registry.register_normalizer(normalizer.clone())?;
        }
        debug!(
            filters = registry.filters.len(),
            pipelines = registry.pipelines.len(),
            normalizers = registry.normalizers.len(),
            "Pipeline registry built"
        );
        Ok(registry)
    }

    /// Make a named filter available to filter chains.
    pub fn define_filter(&mut self, name: &str, spec: FilterSpec) -> Result<(), ConfigError> {
        if self.filters.contains_key(name) || BUILTIN_FILTERS.contains(&name) {
            return Err(ConfigError::DuplicateName {
                kind: "filter",
                name: name.to_string(),
            });
        }
        if name.starts_with(INLINE_FILTER_PREFIX) {
            return Err(ConfigError::InvalidPipeline {
                name: name.to_string(),
                reason: format!(
                    "filter names starting with '{INLINE_FILTER_PREFIX}' are reserved"
                ),
            });
        }
        spec.validate()
            .map_err(|reason| ConfigError::InvalidPipeline {
                name: name.to_string(),
                reason,
            })?;
        self.filters.insert(name.to_string(), spec);
        Ok(())
    }

    /// Register a pipeline. The existing entry is untouched on any error.
    pub fn register(&mut self, pipeline: AnalysisPipeline) -> Result<(), ConfigError> {
        if self.pipelines.contains_key(&pipeline.name) {
            return Err(ConfigError::DuplicateName {
                kind: "pipeline",
                name: pipeline.name,
            });
        }
        pipeline
            .tokenizer
            .validate()
            .map_err(|reason| ConfigError::InvalidPipeline {
                name: pipeline.name.clone(),
                reason,
            })?;
        self.resolve_chain(&pipeline.name, &pipeline.filters)?;

        self.pipelines.insert(pipeline.name.clone(), pipeline);
        Ok(())
    }

    /// Register a normalizer. Only character-level filters are allowed.
    pub fn register_normalizer(&mut self, normalizer: Normalizer) -> Result<(), ConfigError> {
        if self.normalizers.contains_key(&normalizer.name) {
            return Err(ConfigError::DuplicateName {
                kind: "normalizer",
                name: normalizer.name,
            });
        }
        let chain = self.resolve_chain(&normalizer.name, &normalizer.filters)?;
        if let Some(bad) = chain.iter().find(|f| f.spec != FilterSpec::Lowercase) {
            return Err(ConfigError::InvalidPipeline {
                name: normalizer.name,
                reason: format!("filter '{}' is not allowed in a normalizer", bad.name),
            });
        }
        self.normalizers.insert(normalizer.name.clone(), normalizer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AnalysisPipeline> {
        self.pipelines.get(name)
    }

    pub fn get_normalizer(&self, name: &str) -> Option<&Normalizer> {
        self.normalizers.get(name)
    }

    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn normalizer_names(&self) -> impl Iterator<Item = &str> {
        self.normalizers.keys().map(String::as_str)
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedPipeline, ConfigError> {
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))?;
        Ok(ResolvedPipeline {
            name: pipeline.name.clone(),
            tokenizer: pipeline.tokenizer.clone(),
            filters: self.resolve_chain(&pipeline.name, &pipeline.filters)?,
        })
    }

    pub fn resolve_normalizer(&self, name: &str) -> Result<ResolvedNormalizer, ConfigError> {
        let normalizer = self
            .normalizers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))?;
        Ok(ResolvedNormalizer {
            name: normalizer.name.clone(),
            filters: self.resolve_chain(&normalizer.name, &normalizer.filters)?,
        })
    }

    /// Everything needed to create an index using the registered definitions.
    pub fn index_spec(
        &self,
        field_pipelines: &BTreeMap<String, String>,
    ) -> Result<IndexSpec, ConfigError> {
        if let Some(missing) = field_pipelines
            .values()
            .find(|p| !self.pipelines.contains_key(*p))
        {
            return Err(ConfigError::UnknownPipeline(missing.clone()));
        }
        Ok(IndexSpec {
            pipelines: self
                .pipelines
                .keys()
                .map(|name| self.resolve(name))
                .collect::<Result<_, _>>()?,
            normalizers: self
                .normalizers
                .keys()
                .map(|name| self.resolve_normalizer(name))
                .collect::<Result<_, _>>()?,
            field_pipelines: field_pipelines.clone(),
        })
    }

    /// Stop accepting registrations and share the registry read-only.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn resolve_chain(
        &self,
        owner: &str,
        chain: &[FilterRef],
    ) -> Result<Vec<NamedFilter>, ConfigError> {
        chain
            .iter()
            .enumerate()
            .map(|(idx, filter)| match filter {
                FilterRef::Named(name) => self
                    .filters
                    .get(name)
                    .cloned()
                    .or_else(|| FilterSpec::builtin(name))
                    .map(|spec| NamedFilter {
                        name: name.clone(),
                        spec,
                    })
                    .ok_or_else(|| ConfigError::UnknownFilter {
                        pipeline: owner.to_string(),
                        filter: name.clone(),
                    }),
                FilterRef::Inline(spec) => {
                    spec.validate()
                        .map_err(|reason| ConfigError::InvalidPipeline {
                            name: owner.to_string(),
                            reason,
                        })?;
                    Ok(NamedFilter {
                        name: format!("{INLINE_FILTER_PREFIX}{owner}_{}_{idx}", spec.kind()),
                        spec: spec.clone(),
                    })
                }
            })
            .collect()
    }
}
