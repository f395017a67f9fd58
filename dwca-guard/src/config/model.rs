//! YAML model of a validation run.

use super::registry::CriterionRegistry;
use crate::core::{EvaluationChain, EvaluationContext};
use crate::logging::LogConfig;
use crate::prelude::*;
use crate::uniqueness::UniquenessSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// One configured criterion: its registered type plus type-specific options.
///
/// ```yaml
/// type: numericRange
/// key: depthRange
/// options:
///   ranges:
///     - { field: minimumDepthInMeters, min: 0, max: 11000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    /// Overrides the criterion's default key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub options: serde_yaml::Value,
}

impl CriterionSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            options: serde_yaml::Value::Null,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_options(mut self, options: serde_yaml::Value) -> Self {
        self.options = options;
        self
    }

    /// Decodes the options into the typed form a factory expects. Missing
    /// options decode as an empty mapping, so all-default option types work.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.options {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
            other => other.clone(),
        };
        serde_yaml::from_value(value).map_err(|e| {
            ValidatorError::configuration(format!("invalid options for '{}': {e}", self.kind))
        })
    }
}

/// Criteria applied to one evaluation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    pub record_criteria: Vec<CriterionSpec>,
    pub dataset_criteria: Vec<CriterionSpec>,
}

impl ContextConfig {
    pub fn is_empty(&self) -> bool {
        self.record_criteria.is_empty() && self.dataset_criteria.is_empty()
    }

    fn specs(&self) -> impl Iterator<Item = &CriterionSpec> {
        self.record_criteria.iter().chain(&self.dataset_criteria)
    }
}

/// Top-level configuration: the core context, extensions keyed by row type,
/// and shared uniqueness tuning.
///
/// ```yaml
/// uniqueness:
///   buffer_threshold: 5000
/// core:
///   record_criteria:
///     - type: completeness
///       options:
///         fields:
///           - field: scientificName
///     - type: coordinates
///     - type: uniqueness
///       options: { field: occurrenceID }
///   dataset_criteria:
///     - type: recordCount
/// extensions:
///   http://rs.gbif.org/terms/1.0/Multimedia:
///     dataset_criteria:
///       - type: recordCount
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub uniqueness: UniquenessSettings,
    pub core: ContextConfig,
    pub extensions: BTreeMap<String, ContextConfig>,
}

impl ValidationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ValidationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Rejects empty criterion types, blank extension row types, duplicate
    /// explicit keys within a context and zero-sized uniqueness buffers.
    pub fn validate(&self) -> Result<()> {
        if self.uniqueness.buffer_threshold == 0 {
            return Err(ValidatorError::configuration(
                "uniqueness.buffer_threshold must be greater than 0",
            ));
        }
        if self.uniqueness.sort_chunk_size == 0 {
            return Err(ValidatorError::configuration(
                "uniqueness.sort_chunk_size must be greater than 0",
            ));
        }

        for (context, section) in self.contexts() {
            let mut keys = HashSet::new();
            for spec in section.specs() {
                if spec.kind.trim().is_empty() {
                    return Err(ValidatorError::configuration(format!(
                        "criterion without a type in context {context}"
                    )));
                }
                if let Some(key) = &spec.key {
                    if !keys.insert(key.as_str()) {
                        return Err(ValidatorError::configuration(format!(
                            "duplicate criterion key '{key}' in context {context}"
                        )));
                    }
                }
            }
        }

        if let Some(blank) = self.extensions.keys().find(|rt| rt.trim().is_empty()) {
            return Err(ValidatorError::configuration(format!(
                "extension row type must not be blank (found '{blank}')"
            )));
        }
        Ok(())
    }

    /// Every configured context, core first, extensions in row-type order.
    pub fn contexts(&self) -> impl Iterator<Item = (EvaluationContext, &ContextConfig)> {
        std::iter::once((EvaluationContext::Core, &self.core)).chain(
            self.extensions
                .iter()
                .map(|(row_type, section)| (EvaluationContext::extension(row_type), section)),
        )
    }

    /// Builds one chain per context that has at least one criterion, all
    /// sharing `accumulator` and the registry's log configuration.
    pub fn build_chains(
        &self,
        registry: &CriterionRegistry,
        accumulator: SharedAccumulator,
    ) -> Result<Vec<EvaluationChain>> {
        self.build_chains_with(registry, accumulator, registry.log_config().clone())
    }

    /// Like [`build_chains`](Self::build_chains), with `log_config` applied
    /// to the chains and to every criterion built for them.
    pub fn build_chains_with(
        &self,
        registry: &CriterionRegistry,
        accumulator: SharedAccumulator,
        log_config: LogConfig,
    ) -> Result<Vec<EvaluationChain>> {
        let registry = registry.clone().with_log_config(log_config.clone());
        let mut chains = Vec::new();
        for (context, section) in self.contexts().filter(|(_, s)| !s.is_empty()) {
            let record_criteria = section
                .record_criteria
                .iter()
                .map(|spec| registry.build_record(spec, &context, &self.uniqueness))
                .collect::<Result<Vec<_>>>()?;
            let dataset_criteria = section
                .dataset_criteria
                .iter()
                .map(|spec| registry.build_dataset(spec, &context))
                .collect::<Result<Vec<_>>>()?;

            let chain = EvaluationChain::builder(context, accumulator.clone())
                .record_criteria(record_criteria)
                .dataset_criteria(dataset_criteria)
                .log_config(log_config.clone())
                .build()?;
            info!(context = %chain.context(), criteria = ?chain.criterion_keys(), "Built evaluation chain");
            chains.push(chain);
        }
        Ok(chains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
uniqueness:
  buffer_threshold: 10
core:
  record_criteria:
    - type: completeness
      options:
        fields:
          - field: scientificName
    - type: coordinates
  dataset_criteria:
    - type: recordCount
extensions:
  http://rs.gbif.org/terms/1.0/Multimedia:
    dataset_criteria:
      - type: fieldCoverage
        options: { field: identifier }
"#;

    #[test]
    fn test_parse_sample() {
        let config = ValidationConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.uniqueness.buffer_threshold, 10);
        assert_eq!(config.uniqueness.sort_chunk_size, UniquenessSettings::default().sort_chunk_size);
        assert_eq!(config.core.record_criteria.len(), 2);
        assert_eq!(config.core.record_criteria[1].kind, "coordinates");
        assert!(config.core.record_criteria[1].options.is_null());

        let contexts: Vec<_> = config.contexts().map(|(c, _)| c).collect();
        assert_eq!(
            contexts,
            vec![
                EvaluationContext::Core,
                EvaluationContext::extension("http://rs.gbif.org/terms/1.0/Multimedia")
            ]
        );
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ValidationConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ValidationConfig::default());
        assert!(config.core.is_empty());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = ValidationConfig::from_yaml("core:\n  record_critera: []\n");
        assert!(matches!(result, Err(ValidatorError::Yaml(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_keys_and_blank_types() {
        let duplicate = r#"
core:
  record_criteria:
    - { type: completeness, key: same }
  dataset_criteria:
    - { type: recordCount, key: same }
"#;
        assert!(matches!(
            ValidationConfig::from_yaml(duplicate),
            Err(ValidatorError::Configuration(_))
        ));
        assert!(ValidationConfig::from_yaml("core:\n  record_criteria:\n    - type: ' '\n").is_err());
        assert!(ValidationConfig::from_yaml("uniqueness:\n  buffer_threshold: 0\n").is_err());
    }

    #[test]
    fn test_typed_options() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Opts {
            #[serde(default)]
            field: Option<String>,
        }
        let spec = CriterionSpec::new("uniqueness");
        assert_eq!(spec.options::<Opts>().unwrap(), Opts { field: None });

        let spec = spec.with_options(serde_yaml::from_str("field: occurrenceID").unwrap());
        assert_eq!(spec.options::<Opts>().unwrap().field.as_deref(), Some("occurrenceID"));

        let bad = CriterionSpec::new("x").with_options(serde_yaml::from_str("[1]").unwrap());
        assert!(matches!(bad.options::<Opts>(), Err(ValidatorError::Configuration(_))));
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let config = ValidationConfig::from_yaml(SAMPLE).unwrap();
        let again = ValidationConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_log_config_reaches_factories() {
        use crate::accumulator::InMemoryResultAccumulator;
        use crate::core::{BoxedRecordCriterion, Record, RecordCriterion, ValidationResult};
        use std::sync::{Arc, Mutex};

        #[derive(Debug)]
        struct Quiet;
        impl RecordCriterion for Quiet {
            fn key(&self) -> &str {
                "quiet"
            }
            fn validate(
                &mut self,
                _record: &Record,
                _context: &EvaluationContext,
            ) -> Result<Option<ValidationResult>> {
                Ok(None)
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CriterionRegistry::with_builtins();
        let captured = seen.clone();
        registry.register_record("quiet", move |input| {
            captured.lock().unwrap().push(input.log_config.log_spill_operations);
            Ok(Box::new(Quiet) as BoxedRecordCriterion)
        });
        let config = ValidationConfig::from_yaml(
            "core:\n  record_criteria:\n    - type: quiet\n    - type: uniqueness\n",
        )
        .unwrap();
        let acc = Arc::new(InMemoryResultAccumulator::new());

        config
            .build_chains_with(&registry, acc.clone(), LogConfig::production())
            .unwrap();
        config.build_chains(&registry, acc.clone()).unwrap();
        let quiet_registry = registry.clone().with_log_config(LogConfig::production());
        config.build_chains(&quiet_registry, acc).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ValidationConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("not/here.yaml"));
    }
}
