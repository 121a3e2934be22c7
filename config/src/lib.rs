//! Configuration for Vigil hosts.
//!
//! The file lives at `~/.vigil/config.toml` unless a path is given. Nothing
//! in it is required; a missing file yields a single reference carrying
//! every built-in analyzer for every known language.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use vigil_analyzers::builtin::{BuiltinCatalog, CatalogError};
use vigil_analyzers::{Analyzer, AnalyzerReference, ReferenceError, StaticAnalyzerReference};
use vigil_engine::{DEFAULT_MAX_CONCURRENT_ENTITIES, EngineSettings, SeverityOverrides};
use vigil_types::{LanguageTag, Severity};

/// Origin of the reference used when the file declares none.
pub const DEFAULT_REFERENCE_ORIGIN: &str = "builtin:default";

/// Language wildcard accepted in `[[references]].languages`.
const ALL_LANGUAGES: &str = "*";

/// Severity value that suppresses a diagnostic entirely.
const SUPPRESS: &str = "none";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// File extension (without the dot) to language name.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    /// Analyzer references in registration order.
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
    /// Per-analyzer options, keyed by built-in analyzer name.
    #[serde(default)]
    pub analyzers: BTreeMap<String, toml::Table>,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub max_concurrent_entities: Option<usize>,
    pub analyzer_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceConfig {
    pub origin: String,
    /// Language names, or `"*"` for every known language.
    #[serde(default = "all_languages")]
    pub languages: Vec<String>,
    pub analyzers: Vec<String>,
}

fn all_languages() -> Vec<String> {
    vec![ALL_LANGUAGES.to_string()]
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Diagnostic id to severity name, or `"none"` to suppress.
    #[serde(default)]
    pub severity: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("reference '{origin}' names unknown analyzer '{name}'")]
    UnknownAnalyzer { origin: String, name: String },
    #[error(transparent)]
    InvalidOption(#[from] CatalogError),
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// The file involved, for errors raised while loading it.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<ReferenceError> for ConfigError {
    fn from(err: ReferenceError) -> Self {
        Self::invalid(err.to_string())
    }
}

impl VigilConfig {
    /// Load from `explicit`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Ok(config)
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Build the analyzer references, in file order.
    pub fn build_references(&self) -> Result<Vec<Arc<dyn AnalyzerReference>>, ConfigError> {
        for name in self.analyzers.keys() {
            if !BuiltinCatalog::contains(name) {
                return Err(ConfigError::UnknownAnalyzer {
                    origin: "[analyzers]".to_string(),
                    name: name.clone(),
                });
            }
        }

        if self.references.is_empty() {
            let names: Vec<String> = BuiltinCatalog::NAMES.iter().map(ToString::to_string).collect();
            let languages = all_languages();
            return Ok(vec![self.build_reference(
                DEFAULT_REFERENCE_ORIGIN,
                &languages,
                &names,
            )?]);
        }

        let mut origins = HashSet::new();
        self.references
            .iter()
            .map(|reference| {
                if !origins.insert(reference.origin.as_str()) {
                    return Err(ConfigError::invalid(format!(
                        "reference origin '{}' is declared twice",
                        reference.origin
                    )));
                }
                self.build_reference(&reference.origin, &reference.languages, &reference.analyzers)
            })
            .collect()
    }

    fn build_reference(
        &self,
        origin: &str,
        languages: &[String],
        names: &[String],
    ) -> Result<Arc<dyn AnalyzerReference>, ConfigError> {
        let languages = expand_languages(languages);
        let mut builder = StaticAnalyzerReference::builder(origin);
        for name in names {
            let analyzer = self.create_analyzer(origin, name)?;
            for language in &languages {
                builder = builder.register(language.clone(), Arc::clone(&analyzer));
            }
        }
        let reference = builder.build()?;
        tracing::debug!(origin, registrations = reference.len(), "Built analyzer reference");
        Ok(Arc::new(reference))
    }

    fn create_analyzer(&self, origin: &str, name: &str) -> Result<Arc<dyn Analyzer>, ConfigError> {
        if !BuiltinCatalog::contains(name) {
            return Err(ConfigError::UnknownAnalyzer {
                origin: origin.to_string(),
                name: name.to_string(),
            });
        }
        let options = match self.analyzers.get(name) {
            Some(table) => serde_json::to_value(table).map_err(|err| {
                ConfigError::invalid(format!("options for '{name}' are not representable: {err}"))
            })?,
            None => serde_json::Value::Null,
        };
        Ok(BuiltinCatalog::create(name, &options)?)
    }

    /// Validated engine settings.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let max_concurrent_entities = self
            .engine
            .max_concurrent_entities
            .unwrap_or(DEFAULT_MAX_CONCURRENT_ENTITIES);
        if max_concurrent_entities == 0 {
            return Err(ConfigError::invalid(
                "engine.max_concurrent_entities must be at least 1",
            ));
        }

        let analyzer_timeout = match self.engine.analyzer_timeout_ms {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "engine.analyzer_timeout_ms must be greater than 0",
                ));
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        let mut severity_overrides = SeverityOverrides::new();
        for (id, raw) in &self.diagnostics.severity {
            if raw.trim().eq_ignore_ascii_case(SUPPRESS) {
                severity_overrides.suppress(id.clone());
                continue;
            }
            let severity = Severity::parse(raw).map_err(|err| {
                ConfigError::invalid(format!("diagnostics.severity.{id}: {err}"))
            })?;
            severity_overrides.set(id.clone(), severity);
        }

        Ok(EngineSettings {
            max_concurrent_entities,
            analyzer_timeout,
            severity_overrides,
        })
    }

    /// Language for a file path: the `[languages]` table first, then the
    /// built-in extension table, then `Other(ext)`.
    #[must_use]
    pub fn language_for(&self, path: &Path) -> LanguageTag {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return LanguageTag::Other("plaintext".to_string());
        };
        let ext = ext.to_ascii_lowercase();
        if let Some(name) = self.languages.get(&ext) {
            return LanguageTag::parse(name);
        }
        LanguageTag::from_extension(&ext).unwrap_or(LanguageTag::Other(ext))
    }
}

fn expand_languages(languages: &[String]) -> Vec<LanguageTag> {
    let mut expanded: Vec<LanguageTag> = Vec::new();
    for raw in languages {
        if raw.trim() == ALL_LANGUAGES {
            expanded.extend(LanguageTag::KNOWN);
        } else {
            expanded.push(LanguageTag::parse(raw));
        }
    }
    let mut seen = HashSet::new();
    expanded.retain(|language| seen.insert(language.clone()));
    expanded
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vigil").join("config.toml"))
}
