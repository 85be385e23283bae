//! OTM Compiler CLI
//!
//! Loads OTM libraries, reports findings, lists symbols and generates
//! schema documents.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use otm_compiler::codegen::NamespacePolicy;
use otm_compiler::model::SymbolTable;
use otm_compiler::{CodeGenerator, CompilerConfig, Project, ProjectLoader, Severity};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "otm-compile")]
#[command(about = "Compile OTM libraries into XML Schema, JSON Schema and API documents")]
struct Cli {
    /// Configuration file layered over otm.toml and the environment
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Library files, or directories to search for *.otm files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Load libraries one at a time
    #[arg(long)]
    sequential: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load libraries and report findings
    Check {
        #[command(flatten)]
        inputs: Inputs,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// List every resolvable symbol
    Symbols {
        #[command(flatten)]
        inputs: Inputs,

        /// Only symbols in this namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Generate documents
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// XML Schema
        #[arg(long)]
        xsd: bool,

        /// JSON Schema
        #[arg(long)]
        json_schema: bool,

        /// OpenAPI 3 documents for resources
        #[arg(long)]
        openapi: bool,

        /// Swagger 2 documents for resources
        #[arg(long)]
        swagger: bool,

        /// Service message and request/response schemas
        #[arg(long)]
        services: bool,

        /// Generate only what these entities reach (`Library:Name` or `Name`)
        #[arg(short, long = "root")]
        roots: Vec<String>,

        /// Leave extension points out of facet sequences
        #[arg(long)]
        suppress_extensions: bool,

        /// Write major-version namespaces
        #[arg(long)]
        major_namespaces: bool,

        /// Generate even when loading reported errors
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = CompilerConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Check { inputs, strict } => {
            let project = load(&config, &inputs)?;
            print_findings(&project);

            let libraries = project.model.user_libraries().count();
            let failed = project.findings.has_errors() || (strict && project.findings.warning_count() > 0);
            if failed {
                println!("❌ {} libraries checked", libraries);
            } else {
                println!("✅ {} libraries checked", libraries);
            }
            Ok(!failed)
        }

        Commands::Symbols { inputs, namespace } => {
            let project = load(&config, &inputs)?;
            let model = &project.model;
            for (ns, name, symbol) in model.symbols().entries() {
                if namespace.as_deref().is_some_and(|wanted| wanted != ns) {
                    continue;
                }
                let kind = model
                    .entity(symbol.entity())
                    .map(|e| e.kind().as_str())
                    .unwrap_or("?");
                let local = SymbolTable::local_name(model, symbol).unwrap_or_default();
                if local == name {
                    println!("{{{}}}{}  {}", ns, name, kind);
                } else {
                    println!("{{{}}}{}  {} -> {}", ns, name, kind, local);
                }
            }
            Ok(true)
        }

        Commands::Generate {
            inputs,
            output,
            xsd,
            json_schema,
            openapi,
            swagger,
            services,
            roots,
            suppress_extensions,
            major_namespaces,
            force,
        } => {
            let project = load(&config, &inputs)?;
            print_findings(&project);
            if project.findings.has_errors() && !force {
                println!("❌ Not generating: loading reported errors (use --force to override)");
                return Ok(false);
            }

            let mut options = config.generation_options(output);
            if xsd || json_schema || openapi || swagger || services {
                options.formats.schemas = xsd;
                options.formats.json_schemas = json_schema;
                options.formats.openapi = openapi;
                options.formats.swagger = swagger;
                options.formats.services = services;
            }
            options.suppress_extensions |= suppress_extensions;
            if major_namespaces {
                options.namespace_policy = NamespacePolicy::Major;
            }

            let model = &project.model;
            let mut root_ids = Vec::with_capacity(roots.len());
            for root in &roots {
                match model.find_entity(root) {
                    Some(id) => root_ids.push(id),
                    None => bail!("unknown root entity '{}'", root),
                }
            }

            let report = CodeGenerator::new(model).generate(&root_ids, &options)?;
            for file in &report.files {
                println!("  {}", file.display());
            }
            println!(
                "✅ {} files written to {}",
                report.files.len(),
                options.output_dir.display()
            );
            Ok(true)
        }
    }
}

fn load(config: &CompilerConfig, inputs: &Inputs) -> anyhow::Result<Project> {
    let files = expand_paths(&inputs.paths)?;
    if files.is_empty() {
        bail!("no library files found");
    }
    let mut loader = ProjectLoader::from_config(config)?;
    if inputs.sequential {
        loader = loader.parallel(false);
    }
    Ok(loader.load_files(&files)?)
}

/// Files as given; directories searched recursively for library files
fn expand_paths(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_library_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_library_file(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".otm") || name.ends_with(".otm.json")
}

fn print_findings(project: &Project) {
    for finding in project.findings.all() {
        let marker = match finding.severity {
            Severity::Error => "❌",
            Severity::Warning => "⚠️ ",
        };
        println!("{} {}", marker, finding);
    }
    if !project.findings.is_empty() {
        println!(
            "{} errors, {} warnings",
            project.findings.error_count(),
            project.findings.warning_count()
        );
    }
}
