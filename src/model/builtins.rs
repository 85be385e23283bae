//! Built-in libraries
//!
//! Embedded at compile time and assembled ahead of every user library:
//! - `XMLSchema`: the XSD primitive types (`xsd:string`, `xsd:decimal`, ...)
//! - `OTM_Common`: shared simple types plus the extension point elements
//!   every generated facet may end with
//!
//! The common library also ships a hand-written schema that generators copy
//! into `built-ins/` instead of generating one.

use include_dir::{include_dir, Dir};
use url::Url;

use crate::error::{CompilerError, Result};
use crate::loader::{self, LibraryModule};

static BUILTINS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/builtins");

/// Namespace of the XSD primitive library
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace of the OTM common library
pub const OTM_COMMON_NAMESPACE: &str = "http://www.opentravel.org/OTM/Common/v0";

/// Directory (relative to the output root) built-in schemas are copied to
pub const BUILT_INS_DIR: &str = "built-ins";

/// Hand-written schema published for a built-in namespace
#[derive(Debug, Clone, Copy)]
pub struct BuiltInSchema {
    pub namespace: &'static str,
    pub file_name: &'static str,
    pub contents: &'static [u8],
}

/// Parse every embedded built-in library, in file name order
pub fn standard_modules() -> Result<Vec<LibraryModule>> {
    let mut files: Vec<_> = BUILTINS
        .files()
        .filter(|f| f.path().to_string_lossy().ends_with(".otm.json"))
        .collect();
    files.sort_by_key(|f| f.path().to_path_buf());

    files
        .into_iter()
        .map(|file| {
            let name = file.path().to_string_lossy().to_string();
            let url = Url::parse(&format!("otm-builtin:///{}", name))?;
            let value: serde_json::Value = serde_json::from_slice(file.contents())
                .map_err(|_| CompilerError::BuiltIn(name.clone()))?;
            loader::parse_current(url, value).map_err(|_| CompilerError::BuiltIn(name))
        })
        .collect()
}

/// Hand-written schema for a built-in namespace, if one ships
pub fn schema_for(namespace: &str) -> Option<BuiltInSchema> {
    match namespace {
        OTM_COMMON_NAMESPACE => BUILTINS.get_file("OTM_Common.xsd").map(|f| BuiltInSchema {
            namespace: OTM_COMMON_NAMESPACE,
            file_name: "OTM_Common.xsd",
            contents: f.contents(),
        }),
        _ => None,
    }
}

/// Whether a namespace needs no import at all (XSD primitives)
pub fn is_intrinsic(namespace: &str) -> bool {
    namespace == XSD_NAMESPACE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_modules_parse() {
        let modules = standard_modules().unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.header.name.as_str()).collect();
        assert_eq!(names, vec!["OTM_Common", "XMLSchema"]);

        let xsd = &modules[1];
        assert_eq!(xsd.header.namespace.as_deref(), Some(XSD_NAMESPACE));
        assert!(xsd.members.iter().any(|m| m.name == "decimal"));
    }

    #[test]
    fn test_common_schema_embedded() {
        let schema = schema_for(OTM_COMMON_NAMESPACE).unwrap();
        let text = std::str::from_utf8(schema.contents).unwrap();
        assert!(text.contains("ExtensionPoint_Summary"));
        assert!(schema_for(XSD_NAMESPACE).is_none());
    }
}
