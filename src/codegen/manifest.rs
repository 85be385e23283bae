//! Generation manifest
//!
//! Every run writes `otm-manifest.json` (what was generated, with per-file
//! checksums) and a `sha256sum`-compatible `checksums.sha256` next to the
//! generated documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{OutputFile, TargetFormat};
use crate::checksum::{checksum_lines, Checksum};
use crate::error::{CompilerError, Result};

pub const MANIFEST_FILE: &str = "otm-manifest.json";
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

/// Record of one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub generator: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Formats the request selected
    pub formats: Vec<TargetFormat>,
    pub files: Vec<ManifestEntry>,
    /// Checksum over every file checksum, in file order
    pub manifest_checksum: Checksum,
    pub stats: ManifestStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative to the output directory, `/`-separated
    pub path: String,
    pub format: TargetFormat,
    pub checksum: Checksum,
}

/// Files written per format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub total_files: usize,
    pub xml_schemas: usize,
    pub service_schemas: usize,
    pub json_schemas: usize,
    pub openapi_documents: usize,
    pub swagger_documents: usize,
}

impl GenerationManifest {
    pub fn new(formats: &[TargetFormat], files: &[OutputFile]) -> Self {
        let files: Vec<ManifestEntry> = files
            .iter()
            .map(|f| ManifestEntry {
                path: f
                    .path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
                format: f.format,
                checksum: Checksum::from_bytes(&f.contents),
            })
            .collect();

        let count = |format: TargetFormat| files.iter().filter(|f| f.format == format).count();
        let stats = ManifestStats {
            total_files: files.len(),
            xml_schemas: count(TargetFormat::XmlSchema),
            service_schemas: count(TargetFormat::ServiceSchema),
            json_schemas: count(TargetFormat::JsonSchema),
            openapi_documents: count(TargetFormat::OpenApi),
            swagger_documents: count(TargetFormat::Swagger),
        };

        let combined: Vec<&str> = files.iter().map(|f| f.checksum.as_str()).collect();
        let manifest_checksum = Checksum::from_bytes(combined.join(",").as_bytes());

        Self {
            generator: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            formats: formats.to_vec(),
            files,
            manifest_checksum,
            stats,
        }
    }

    /// Write the manifest and checksum files, returning their paths
    pub fn write(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let manifest_path = output_dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&manifest_path, content).map_err(|e| CompilerError::output(&manifest_path, e))?;

        let checksums_path = output_dir.join(CHECKSUMS_FILE);
        let lines = checksum_lines(self.files.iter().map(|f| (f.path.as_str(), &f.checksum)));
        std::fs::write(&checksums_path, lines).map_err(|e| CompilerError::output(&checksums_path, e))?;

        Ok(vec![manifest_path, checksums_path])
    }

    /// Files whose contents on disk no longer match the recorded checksum
    pub fn verify(&self, output_dir: &Path) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| {
                Checksum::from_file(&output_dir.join(&f.path))
                    .map(|c| c != f.checksum)
                    .unwrap_or(true)
            })
            .map(|f| f.path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<OutputFile> {
        vec![
            OutputFile {
                path: "Orders_1_0_0.xsd".into(),
                format: TargetFormat::XmlSchema,
                contents: b"<xsd:schema/>".to_vec(),
            },
            OutputFile {
                path: PathBuf::from("built-ins").join("OTM_Common.xsd"),
                format: TargetFormat::XmlSchema,
                contents: b"<common/>".to_vec(),
            },
            OutputFile {
                path: "Orders_1_0_0.schema.json".into(),
                format: TargetFormat::JsonSchema,
                contents: b"{}".to_vec(),
            },
        ]
    }

    #[test]
    fn test_manifest_stats_and_paths() {
        let manifest = GenerationManifest::new(&[TargetFormat::XmlSchema, TargetFormat::JsonSchema], &files());
        assert_eq!(manifest.stats.total_files, 3);
        assert_eq!(manifest.stats.xml_schemas, 2);
        assert_eq!(manifest.stats.json_schemas, 1);
        assert_eq!(manifest.files[1].path, "built-ins/OTM_Common.xsd");
    }

    #[test]
    fn test_write_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let files = files();
        for file in &files {
            let path = dir.path().join(&file.path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, &file.contents).unwrap();
        }

        let manifest = GenerationManifest::new(&[TargetFormat::XmlSchema], &files);
        let written = manifest.write(dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let checksums = std::fs::read_to_string(dir.path().join(CHECKSUMS_FILE)).unwrap();
        assert_eq!(checksums.lines().count(), 3);
        assert!(checksums.contains("  built-ins/OTM_Common.xsd"));

        let parsed: GenerationManifest =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(parsed.files, manifest.files);
        assert!(manifest.verify(dir.path()).is_empty());

        std::fs::write(dir.path().join("Orders_1_0_0.xsd"), "changed").unwrap();
        assert_eq!(manifest.verify(dir.path()), vec!["Orders_1_0_0.xsd"]);
    }
}
