//! End-to-end tests over library fixtures
//!
//! Loads the fixture libraries from disk, assembles them and generates
//! documents into temporary directories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use rstest::rstest;
use url::Url;

use otm_compiler::codegen::manifest::{CHECKSUMS_FILE, MANIFEST_FILE};
use otm_compiler::codegen::{CancellationToken, GenerationState};
use otm_compiler::model::Symbol;
use otm_compiler::resolver::NamespaceResolver;
use otm_compiler::{
    CodeGenerator, CompilerConfig, CompilerError, FindingCode, GenerationOptions, OtmVersionScheme,
    Project, ProjectLoader, Severity,
};

const ORDERS_NS: &str = "http://example.com/ns/Orders/v01";
const BASE_NS: &str = "http://example.com/ns/Base/v01";
const HOST_NS: &str = "http://example.com/ns/Host/v01";
const COMMON_NS: &str = "http://example.com/ns/Common/v01";

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn fixture(name: &str) -> PathBuf {
    fixtures_path().join(name)
}

fn load(roots: &[&str]) -> Project {
    let paths: Vec<PathBuf> = roots.iter().map(|r| fixture(r)).collect();
    ProjectLoader::from_config(&CompilerConfig::default())
        .unwrap()
        .load_files(&paths)
        .unwrap()
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("{} not readable: {}", name, e))
}

/// Namespaces each `xmlns:` prefix is bound to across the written schemas
fn declared_prefixes(dir: &Path) -> BTreeMap<String, BTreeSet<String>> {
    let pattern = Regex::new(r#"xmlns:([A-Za-z0-9_.-]+)="([^"]+)""#).unwrap();
    let mut prefixes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.path().extension().and_then(|e| e.to_str()) != Some("xsd") {
            continue;
        }
        let content = std::fs::read_to_string(entry.path()).unwrap();
        for captures in pattern.captures_iter(&content) {
            prefixes
                .entry(captures[1].to_string())
                .or_default()
                .insert(captures[2].to_string());
        }
    }
    prefixes
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_resolution_is_repeatable() {
    let mut resolver = NamespaceResolver::new(Arc::new(OtmVersionScheme::new()));
    let base = Url::from_file_path(fixture("orders/Orders.otm.json")).unwrap();
    let hints = vec!["Base.otm.json".to_string()];

    let first = resolver.resolve(Some(BASE_NS), &hints, Some(&base));
    let second = resolver.resolve(Some(BASE_NS), &hints, Some(&base));

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert!(first[0].path().ends_with("orders/Base.otm.json"));
}

#[test]
fn test_imports_are_followed_transitively() {
    let project = load(&["orders/Orders.otm.json"]);

    assert_eq!(project.urls.len(), 2);
    let names: Vec<&str> = project.model.user_libraries().map(|l| l.name.as_str()).collect();
    assert!(names.contains(&"Orders"));
    assert!(names.contains(&"Base"));
    assert!(!project.findings.has_errors(), "{}", project.findings);
}

#[test]
fn test_loading_a_library_twice_keeps_one_copy() {
    let project = load(&["orders/Orders.otm.json", "orders/Base.otm.json"]);

    assert_eq!(project.model.user_libraries().count(), 2);
    assert_eq!(project.findings.count_of(FindingCode::DuplicateLibrary), 0);
}

// =============================================================================
// Loader Tests
// =============================================================================

#[test]
fn test_invalid_library_loads_leniently() {
    let project = load(&["legacy/Legacy.otm.json"]);

    let corrupt: Vec<_> = project.findings.with_code(FindingCode::CorruptLibraryContent).collect();
    assert_eq!(corrupt.len(), 1);
    assert_eq!(corrupt[0].severity, Severity::Warning);
    assert!(project.model.find_entity("Legacy:Code").is_some());
}

#[test]
fn test_missing_root_is_reported() {
    let project = load(&["orders/Nowhere.otm.json"]);

    assert_eq!(project.findings.count_of(FindingCode::LibraryNotFound), 1);
    assert_eq!(project.model.user_libraries().count(), 0);
}

// =============================================================================
// Symbol Tests
// =============================================================================

#[test]
fn test_chameleon_collision() {
    let project = load(&["chameleon/Host.otm.json"]);
    let symbols = project.model.symbols();

    assert_eq!(project.findings.count_of(FindingCode::DuplicateChameleonSymbols), 1);
    assert!(symbols.is_ambiguous(HOST_NS, "Code"));
    assert!(symbols.lookup(HOST_NS, "Code").is_none());
    assert!(symbols.lookup(HOST_NS, "Unique").is_some());
    assert_eq!(project.findings.count_of(FindingCode::UnresolvedReference), 0);
}

#[test]
fn test_inherited_contextual_facet_becomes_ghost() {
    let project = load(&["orders/Orders.otm.json"]);
    let symbols = project.model.symbols();

    assert!(matches!(
        symbols.lookup(ORDERS_NS, "Order_Custom_Web"),
        Some(Symbol::Ghost { .. })
    ));
    assert!(matches!(
        symbols.lookup(BASE_NS, "BaseOrder_Custom_Web"),
        Some(Symbol::Entity(_))
    ));
}

// =============================================================================
// Generation Tests
// =============================================================================

#[test]
fn test_generates_extended_business_object() {
    let project = load(&["orders/Orders.otm.json"]);
    assert_eq!(project.findings.error_count(), 0, "{}", project.findings);

    let dir = tempfile::tempdir().unwrap();
    let options = GenerationOptions::new(dir.path());
    let mut generator = CodeGenerator::new(&project.model);
    generator.generate(&[], &options).unwrap();
    assert_eq!(generator.state(), GenerationState::Done);

    let orders = read(dir.path(), "Orders_1_0_0.xsd");
    for name in ["Order_ID", "Order_Summary", "Order_Detail", "Order_Custom_Web"] {
        assert!(orders.contains(&format!("name=\"{}\"", name)), "missing type {}", name);
    }
    for element in ["OrderID", "Order", "OrderDetail", "OrderCustomWeb"] {
        assert!(orders.contains(&format!("name=\"{}\"", element)), "missing element {}", element);
    }
    assert!(orders.contains(&format!(
        "<xsd:import namespace=\"{}\" schemaLocation=\"Base_1_0_0.xsd\"/>",
        BASE_NS
    )));

    let base = read(dir.path(), "Base_1_0_0.xsd");
    assert!(base.contains(&format!("targetNamespace=\"{}\"", BASE_NS)));
    assert!(dir.path().join("built-ins").join("OTM_Common.xsd").exists());
}

#[test]
fn test_multi_file_namespace_is_consolidated() {
    let project = load(&["common/Booking.otm.json"]);
    assert!(!project.findings.has_errors(), "{}", project.findings);
    assert_eq!(project.model.user_libraries().count(), 4);

    let dir = tempfile::tempdir().unwrap();
    CodeGenerator::new(&project.model)
        .generate(&[], &GenerationOptions::new(dir.path()))
        .unwrap();

    let consolidation = read(dir.path(), "c_ImportConsolidation.xsd");
    for file in ["Common_A_1_0_0.xsd", "Common_B_1_0_0.xsd", "Common_C_1_0_0.xsd"] {
        assert!(consolidation.contains(file), "{} not included", file);
    }

    let booking = read(dir.path(), "Booking_1_0_0.xsd");
    assert!(booking.contains("schemaLocation=\"c_ImportConsolidation.xsd\""));
    assert!(!booking.contains("schemaLocation=\"Common_A_1_0_0.xsd\""));

    let prefixes = declared_prefixes(dir.path());
    assert_eq!(prefixes.get("c").map(BTreeSet::len), Some(1));
    assert!(prefixes["c"].contains(COMMON_NS));
    for (prefix, namespaces) in &prefixes {
        assert_eq!(namespaces.len(), 1, "prefix {} bound to {:?}", prefix, namespaces);
    }
}

#[test]
fn test_loaded_but_unimported_namespace_is_not_consolidated() {
    let project = load(&[
        "common/Common_A.otm.json",
        "common/Common_B.otm.json",
        "common/Common_C.otm.json",
    ]);
    assert_eq!(project.model.user_libraries().count(), 3);

    let dir = tempfile::tempdir().unwrap();
    CodeGenerator::new(&project.model)
        .generate(&[], &GenerationOptions::new(dir.path()))
        .unwrap();

    assert!(dir.path().join("Common_A_1_0_0.xsd").exists());
    let consolidated: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with("_ImportConsolidation.xsd"))
        .collect();
    assert!(consolidated.is_empty());
}

#[test]
fn test_root_limits_output() {
    let project = load(&["orders/Orders.otm.json", "common/Booking.otm.json"]);
    let root = project.model.find_entity("Booking:Booking").unwrap();

    let dir = tempfile::tempdir().unwrap();
    CodeGenerator::new(&project.model)
        .generate(&[root], &GenerationOptions::new(dir.path()))
        .unwrap();

    assert!(dir.path().join("Booking_1_0_0.xsd").exists());
    assert!(!dir.path().join("Orders_1_0_0.xsd").exists());
    assert!(!dir.path().join("Base_1_0_0.xsd").exists());
}

#[rstest]
#[case::xsd(true, false, "Orders_1_0_0.xsd")]
#[case::json(false, true, "Orders_1_0_0.schema.json")]
fn test_selected_format_is_written(#[case] schemas: bool, #[case] json_schemas: bool, #[case] expected: &str) {
    let project = load(&["orders/Orders.otm.json"]);
    let dir = tempfile::tempdir().unwrap();

    let mut options = GenerationOptions::new(dir.path());
    options.formats.schemas = schemas;
    options.formats.json_schemas = json_schemas;
    CodeGenerator::new(&project.model).generate(&[], &options).unwrap();

    assert!(dir.path().join(expected).exists());
}

#[test]
fn test_json_schema_definitions() {
    let project = load(&["orders/Orders.otm.json"]);
    let dir = tempfile::tempdir().unwrap();

    let mut options = GenerationOptions::new(dir.path());
    options.formats.schemas = false;
    options.formats.json_schemas = true;
    CodeGenerator::new(&project.model).generate(&[], &options).unwrap();

    let schema: serde_json::Value =
        serde_json::from_str(&read(dir.path(), "Orders_1_0_0.schema.json")).unwrap();
    assert_eq!(schema["$id"], ORDERS_NS);
    let definitions = schema["definitions"].as_object().unwrap();
    assert!(definitions.contains_key("Order_ID"));
    assert!(definitions.contains_key("Order_Summary"));
}

#[test]
fn test_manifest_records_every_document() {
    let project = load(&["orders/Orders.otm.json"]);
    let dir = tempfile::tempdir().unwrap();

    let report = CodeGenerator::new(&project.model)
        .generate(&[], &GenerationOptions::new(dir.path()))
        .unwrap();

    assert!(report.files.contains(&dir.path().join(MANIFEST_FILE)));
    assert!(report.files.contains(&dir.path().join(CHECKSUMS_FILE)));
    assert_eq!(report.manifest.stats.total_files, report.files.len() - 2);
    assert!(report.manifest.verify(dir.path()).is_empty());

    let checksums = read(dir.path(), CHECKSUMS_FILE);
    assert!(checksums.contains("  Orders_1_0_0.xsd"));
    assert!(checksums.contains("  built-ins/OTM_Common.xsd"));
}

#[test]
fn test_cancelled_generation_fails() {
    let project = load(&["orders/Orders.otm.json"]);
    let dir = tempfile::tempdir().unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let mut generator = CodeGenerator::new(&project.model).with_cancellation(token);
    let result = generator.generate(&[], &GenerationOptions::new(dir.path()));

    assert!(matches!(result, Err(CompilerError::Cancelled)));
    assert_eq!(generator.state(), GenerationState::Failed);
    assert!(!dir.path().join(MANIFEST_FILE).exists());
}

#[test]
fn test_no_format_selected_is_rejected() {
    let project = load(&["orders/Orders.otm.json"]);
    let dir = tempfile::tempdir().unwrap();

    let mut options = GenerationOptions::new(dir.path());
    options.formats.schemas = false;
    let result = CodeGenerator::new(&project.model).generate(&[], &options);

    assert!(matches!(result, Err(CompilerError::InvalidOptions(_))));
}
