//! Naming rules for generated documents
//!
//! Every name a generator writes comes from here, so that a type referenced
//! from one document is spelled the same way where it is declared:
//! - facet types: `{Owner}_{Facet}` (`Order_Summary`, `Order_Custom_Web`)
//! - object elements: `{Owner}ID`, `{Owner}`, `{Owner}Detail`
//! - extension point facets: `ExtensionPoint_{Facet}_{Owner}`
//! - library documents: `{Library}_{major}_{minor}_{patch}` plus extension

use crate::model::{FacetKind, Library};
use crate::version::OtmVersionScheme;

/// Complex type of an object facet
pub fn facet_type_name(owner: &str, facet: FacetKind) -> String {
    format!("{}_{}", owner, facet.as_str())
}

/// Global element published for a fixed object facet
///
/// Simple facets have no element; contextual facets are named by
/// [`contextual_element_name`].
pub fn facet_element_name(owner: &str, facet: FacetKind) -> Option<String> {
    match facet {
        FacetKind::Id => Some(format!("{}ID", owner)),
        FacetKind::Summary | FacetKind::Shared => Some(owner.to_string()),
        FacetKind::Detail => Some(format!("{}Detail", owner)),
        FacetKind::Simple
        | FacetKind::Custom
        | FacetKind::Query
        | FacetKind::Update
        | FacetKind::Choice => None,
    }
}

/// Global element of a contextual or ghost facet (`OrderCustomWeb`)
pub fn contextual_element_name(owner: &str, facet: FacetKind, facet_name: &str) -> String {
    format!("{}{}{}", owner, facet.as_str(), facet_name)
}

/// Type produced for an extension point facet
pub fn extension_point_name(owner: &str, facet: FacetKind) -> String {
    format!("ExtensionPoint_{}_{}", facet.as_str(), owner)
}

/// Built-in element every facet sequence may end with
pub fn extension_point_element(facet: FacetKind) -> Option<String> {
    match facet {
        FacetKind::Simple => None,
        _ => Some(format!("ExtensionPoint_{}", facet.as_str())),
    }
}

/// Base type of an open enumeration
pub fn open_enum_base_name(name: &str) -> String {
    format!("{}_Base", name)
}

/// Literal admitted by every open enumeration
pub const OPEN_ENUM_OTHER: &str = "Other_";

/// `{Library}_{major}_{minor}_{patch}`
pub fn library_stem(library: &Library) -> String {
    match OtmVersionScheme::parse_version(&library.version) {
        Ok(v) => format!("{}_{}_{}_{}", library.name, v.major, v.minor, v.patch),
        Err(_) => library.name.clone(),
    }
}

/// Expand a file name template
pub fn apply_template(template: &str, library: &Library) -> String {
    template
        .replace("{library}", &library.name)
        .replace("{version}", &library.version)
}

/// Combining document for a namespace imported from several files
pub fn consolidation_file_name(prefix: &str) -> String {
    format!("{}_ImportConsolidation.xsd", prefix)
}

/// Message schema of a service
pub fn service_file_name(service: &str) -> String {
    format!("{}_Messages.xsd", service)
}

/// Request/response schema of a business object
pub fn ras_file_name(business_object: &str) -> String {
    format!("{}_RAS.xsd", business_object)
}

/// Facet selector enumeration of a business object
pub fn facet_selector_name(business_object: &str) -> String {
    format!("{}_FacetType", business_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::library;

    #[test]
    fn test_facet_names() {
        assert_eq!(facet_type_name("Order", FacetKind::Id), "Order_ID");
        assert_eq!(facet_element_name("Order", FacetKind::Id).as_deref(), Some("OrderID"));
        assert_eq!(facet_element_name("Order", FacetKind::Summary).as_deref(), Some("Order"));
        assert_eq!(facet_element_name("Order", FacetKind::Detail).as_deref(), Some("OrderDetail"));
        assert_eq!(facet_element_name("Order", FacetKind::Simple), None);
        assert_eq!(contextual_element_name("Order", FacetKind::Custom, "Web"), "OrderCustomWeb");
        assert_eq!(extension_point_name("Order", FacetKind::Summary), "ExtensionPoint_Summary_Order");
    }

    #[test]
    fn test_library_file_names() {
        let mut lib = library("Orders", Some("http://example.com/ns/Orders/v01_02"));
        lib.version = "1.2.0".into();
        assert_eq!(library_stem(&lib), "Orders_1_2_0");
        assert_eq!(apply_template("{library}-v{version}.xsd", &lib), "Orders-v1.2.0.xsd");
    }
}
