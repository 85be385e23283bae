//! Configuration management for the OTM compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (otm.toml, .otm.toml, config/otm.toml, XDG config dir)
//! - Environment variables (OTM__SECTION__KEY)
//!
//! ## Example config file (otm.toml):
//! ```toml
//! [loader]
//! fallback_severity = "warning"
//! parallel = true
//!
//! [resolver]
//! catalog = "catalog.toml"
//! repositories = [{ id = "local", root = "./repository" }]
//!
//! [generation]
//! output_dir = "./generated"
//! suppress_extensions = false
//! namespace_policy = "full"
//!
//! [generation.formats]
//! schemas = true
//! json_schemas = true
//!
//! [generation.filename_overrides]
//! xml_schema = "{library}_v{version}.xsd"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::codegen::{FormatSelection, GenerationOptions, NamespacePolicy, TargetFormat};
use crate::loader::FallbackSeverity;
use crate::resolver::FileSystemRepository;

/// Main configuration for the compiler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Module loader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Severity reported when a library loads only without validation
    #[serde(default)]
    pub fallback_severity: FallbackSeverity,

    /// Load independent libraries in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,
}

/// Namespace resolver settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Namespace catalog (TOML)
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Repositories probed by best-effort search, in order
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// A file-system repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub root: PathBuf,
}

/// Default generation request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_formats")]
    pub formats: FormatSelection,

    #[serde(default)]
    pub service_endpoint_url: Option<String>,

    #[serde(default)]
    pub resource_base_url: Option<String>,

    #[serde(default)]
    pub suppress_extensions: bool,

    #[serde(default)]
    pub namespace_policy: NamespacePolicy,

    /// Per-format file name templates (`{library}`, `{version}`)
    #[serde(default)]
    pub filename_overrides: BTreeMap<TargetFormat, String>,
}

fn default_true() -> bool {
    true
}

fn default_formats() -> FormatSelection {
    FormatSelection {
        schemas: true,
        ..FormatSelection::default()
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fallback_severity: FallbackSeverity::default(),
            parallel: true,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            formats: default_formats(),
            service_endpoint_url: None,
            resource_base_url: None,
            suppress_extensions: false,
            namespace_policy: NamespacePolicy::default(),
            filename_overrides: BTreeMap::new(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["otm.toml", ".otm.toml", "config/otm.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("org", "opentravel", "otm-compiler") {
            let xdg_config = dirs.config_dir().join("otm.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("OTM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Repositories declared in the resolver section
    pub fn repositories(&self) -> Vec<FileSystemRepository> {
        self.resolver
            .repositories
            .iter()
            .map(|r| FileSystemRepository::new(&r.id, &r.root))
            .collect()
    }

    /// Generation options seeded from the `[generation]` section
    pub fn generation_options(&self, output_dir: Option<PathBuf>) -> GenerationOptions {
        let generation = &self.generation;
        GenerationOptions {
            output_dir: output_dir
                .or_else(|| generation.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("generated")),
            formats: generation.formats.clone(),
            service_endpoint_url: generation.service_endpoint_url.clone(),
            resource_base_url: generation.resource_base_url.clone(),
            suppress_extensions: generation.suppress_extensions,
            filename_overrides: generation.filename_overrides.clone(),
            namespace_policy: generation.namespace_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.loader.fallback_severity, FallbackSeverity::Warning);
        assert!(config.loader.parallel);
        assert!(config.generation.formats.schemas);
        assert!(!config.generation.formats.openapi);
    }

    #[test]
    fn test_serialize_config() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[generation]"));
    }

    #[test]
    fn test_parse_sections() {
        let parsed: CompilerConfig = toml::from_str(
            r#"
            [loader]
            fallback_severity = "error"

            [resolver]
            repositories = [{ id = "local", root = "/tmp/repo" }]

            [generation.filename_overrides]
            xml_schema = "{library}.xsd"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.loader.fallback_severity, FallbackSeverity::Error);
        assert_eq!(parsed.repositories().len(), 1);
        assert_eq!(
            parsed.generation.filename_overrides.get(&TargetFormat::XmlSchema).map(String::as_str),
            Some("{library}.xsd")
        );
    }

    #[test]
    fn test_generation_options_override_output_dir() {
        let config = CompilerConfig::default();
        let options = config.generation_options(Some(PathBuf::from("/tmp/out")));
        assert_eq!(options.output_dir, PathBuf::from("/tmp/out"));
    }
}
