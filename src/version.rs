//! Namespace version schemes
//!
//! A version scheme decomposes a version-qualified namespace URI into its
//! base namespace and a version identifier, and composes them back. The
//! default [`OtmVersionScheme`] recognises namespaces ending in `/vMM`,
//! `/vMM_mm` or `/vMM_mm_pp` and uses semver identifiers (`1.2.0`).

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CompilerError, Result};

/// Identifier of the default scheme
pub const OTM_SCHEME_ID: &str = "OTA2";

/// A namespace split into its base and version parts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedNamespace {
    pub base: String,
    pub version: Version,
}

impl fmt::Display for VersionedNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.base, self.version)
    }
}

/// Pluggable rules relating namespaces, versions and file names
pub trait VersionScheme: Send + Sync + fmt::Debug {
    /// Scheme identifier
    fn id(&self) -> &str;

    /// Split a namespace into base namespace and version
    fn decompose(&self, namespace: &str) -> Result<VersionedNamespace>;

    /// Build the version-qualified namespace for a base and version
    fn compose(&self, base: &str, version: &Version) -> String;

    fn is_valid_namespace(&self, namespace: &str) -> bool {
        self.decompose(namespace).is_ok()
    }

    fn base_namespace(&self, namespace: &str) -> Result<String> {
        Ok(self.decompose(namespace)?.base)
    }

    /// Version identifier string for a namespace (e.g. `1.2.0`)
    fn version_identifier(&self, namespace: &str) -> Result<String> {
        Ok(self.decompose(namespace)?.version.to_string())
    }

    /// Namespace of the major version this namespace belongs to
    fn major_version_namespace(&self, namespace: &str) -> Result<String> {
        let parts = self.decompose(namespace)?;
        Ok(self.compose(&parts.base, &Version::new(parts.version.major, 0, 0)))
    }

    /// Default file name for a library at a version
    fn default_file_name(&self, library_name: &str, version: &Version) -> String;

    /// Order two version identifiers
    fn compare(&self, a: &str, b: &str) -> Result<Ordering>;
}

/// Default OTM version scheme
#[derive(Debug, Clone)]
pub struct OtmVersionScheme {
    pattern: Regex,
}

impl OtmVersionScheme {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^(?P<base>.+?)/v(?P<major>\d{2,})(?:_(?P<minor>\d{2,}))?(?:_(?P<patch>\d{2,}))?/?$")
                .expect("namespace version pattern"),
        }
    }

    /// Parse a version identifier, tolerating a leading `v` and missing parts
    pub fn parse_version(id: &str) -> Result<Version> {
        let id = id.trim().strip_prefix('v').unwrap_or(id.trim());
        let parts = id.split('.').count();
        let padded = match parts {
            1 => format!("{}.0.0", id),
            2 => format!("{}.0", id),
            _ => id.to_string(),
        };
        Ok(Version::parse(&padded)?)
    }
}

impl Default for OtmVersionScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionScheme for OtmVersionScheme {
    fn id(&self) -> &str {
        OTM_SCHEME_ID
    }

    fn decompose(&self, namespace: &str) -> Result<VersionedNamespace> {
        let invalid = |reason: &str| CompilerError::InvalidNamespace {
            namespace: namespace.to_string(),
            reason: reason.to_string(),
        };
        let caps = self
            .pattern
            .captures(namespace)
            .ok_or_else(|| invalid("missing version suffix /vMM[_mm[_pp]]"))?;

        let number = |name: &str| -> Result<u64> {
            match caps.name(name) {
                Some(m) => m.as_str().parse::<u64>().map_err(|_| invalid("version part out of range")),
                None => Ok(0),
            }
        };

        Ok(VersionedNamespace {
            base: caps["base"].to_string(),
            version: Version::new(number("major")?, number("minor")?, number("patch")?),
        })
    }

    fn compose(&self, base: &str, version: &Version) -> String {
        let base = base.trim_end_matches('/');
        match (version.minor, version.patch) {
            (0, 0) => format!("{}/v{:02}", base, version.major),
            (minor, 0) => format!("{}/v{:02}_{:02}", base, version.major, minor),
            (minor, patch) => format!("{}/v{:02}_{:02}_{:02}", base, version.major, minor, patch),
        }
    }

    fn default_file_name(&self, library_name: &str, version: &Version) -> String {
        format!(
            "{}_{}_{}_{}.otm",
            library_name, version.major, version.minor, version.patch
        )
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(Self::parse_version(a)?.cmp(&Self::parse_version(b)?))
    }
}
