//! OTM Model Compiler
//!
//! Loads OpenTravel Model (OTM) library files, resolves them into one
//! consistent model, and generates XML Schema, JSON Schema, OpenAPI/Swagger
//! and service schema documents from it.
//!
//! ## Pipeline
//!
//! - **Loading**: library modules are read and validated against the grammar
//!   they declare, newest grammar first, with a lenient fallback
//! - **Resolution**: imports and includes are located through a namespace
//!   catalog, repositories and file hints
//! - **Assembly**: libraries and entities are placed in one model and every
//!   type reference is bound to a symbol
//! - **Generation**: the reachable part of the model is transformed per
//!   target format and written with a checksummed manifest
//!
//! ## Output layout
//!
//! ```text
//! generated/
//! ├── Orders_1_0_0.xsd
//! ├── Orders_1_0_0.schema.json
//! ├── ord_ImportConsolidation.xsd
//! ├── OrderService_Messages.xsd
//! ├── OrderResource.openapi.json
//! ├── built-ins/
//! │   └── OTM_Common.xsd
//! ├── otm-manifest.json
//! └── checksums.sha256
//! ```

pub mod checksum;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod project;
pub mod resolver;
pub mod version;

pub use checksum::Checksum;
pub use codegen::{CodeGenerator, GenerationOptions, GenerationReport, TargetFormat};
pub use config::CompilerConfig;
pub use diagnostics::{Finding, FindingCode, Findings, Severity};
pub use error::{CompilerError, Result};
pub use filter::{CodeGenerationFilter, FilterBuilder};
pub use loader::{LibraryModule, ModuleLoader};
pub use model::{Assembly, EntityId, LibraryId, Model};
pub use project::{Project, ProjectLoader};
pub use version::{OtmVersionScheme, VersionScheme};
