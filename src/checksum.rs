//! Checksums for generated artifacts

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// SHA256 checksum of a generated file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute the checksum of a file on disk
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_bytes(&std::fs::read(path)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        Self::from_bytes(data) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render `sha256sum`-compatible lines for a set of files
pub fn checksum_lines<'a>(entries: impl IntoIterator<Item = (&'a str, &'a Checksum)>) -> String {
    let mut out = String::new();
    for (name, checksum) in entries {
        out.push_str(&format!("{}  {}\n", checksum, name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_verification() {
        let checksum = Checksum::from_bytes(b"<xsd:schema/>");
        assert!(checksum.verify(b"<xsd:schema/>"));
        assert!(!checksum.verify(b"<xsd:schema></xsd:schema>"));
        assert_eq!(checksum.as_str().len(), 64);
    }

    #[test]
    fn test_checksum_lines() {
        let a = Checksum::from_bytes(b"a");
        let lines = checksum_lines([("Orders_1_0_0.xsd", &a)]);
        assert!(lines.ends_with("  Orders_1_0_0.xsd\n"));
        assert!(lines.starts_with(a.as_str()));
    }
}
