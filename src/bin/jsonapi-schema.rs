//! JSON:API Schema CLI
//!
//! Command-line interface for validating, transforming and untransforming
//! JSON:API documents with identity schemas.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jsonapi_schema::{
    load_json, validate_document, DocumentError, Options, Registry, Schema, UntransformError,
};
use serde_json::{Map, Value};
use tracing::Level;

#[derive(Parser)]
#[command(name = "jsonapi-schema")]
#[command(about = "Map raw JSON data to and from JSON:API documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a document against the JSON:API structural rules
    Validate {
        /// Document file to validate
        document: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Convert a document into raw objects grouped by type
    Untransform {
        /// Document file to untransform
        document: PathBuf,

        /// Also map included resources
        #[arg(long)]
        included: bool,

        /// Nest related objects in place of {id} stubs
        #[arg(long)]
        nest: bool,

        /// Cut circular references to {id} stubs (only with nesting)
        #[arg(long)]
        remove_cycles: bool,

        /// Options file (JSON); flags override its values
        #[arg(long)]
        options: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Convert raw objects into a document
    Transform {
        /// Source file: one raw object or an array of them
        source: PathBuf,

        /// Resource type of the source objects
        #[arg(long = "type", short = 't')]
        type_name: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate { document, json } => run_validate(&document, json),

        Commands::Untransform {
            document,
            included,
            nest,
            remove_cycles,
            options,
            output,
            pretty,
        } => run_untransform(UntransformArgs {
            document,
            included,
            nest,
            remove_cycles,
            options,
            output,
            pretty,
        }),

        Commands::Transform {
            source,
            type_name,
            output,
            pretty,
        } => run_transform(&source, &type_name, output, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_validate(path: &Path, json_output: bool) -> Result<(), u8> {
    let document = load_json(path).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })?;

    match validate_document(&document) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(DocumentError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Invalid document:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

struct UntransformArgs {
    document: PathBuf,
    included: bool,
    nest: bool,
    remove_cycles: bool,
    options: Option<PathBuf>,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_untransform(args: UntransformArgs) -> Result<(), u8> {
    let UntransformArgs {
        document: document_path,
        included,
        nest,
        remove_cycles,
        options: options_path,
        output,
        pretty,
    } = args;

    let document = load_json(&document_path).map_err(|e| {
        eprintln!("Error: loading document: {}", e);
        e.exit_code() as u8
    })?;

    let mut options = match options_path {
        Some(path) => {
            let value = load_json(&path).map_err(|e| {
                eprintln!("Error: loading options: {}", e);
                e.exit_code() as u8
            })?;
            serde_json::from_value::<Options>(value).map_err(|e| {
                eprintln!("Error: invalid options: {}", e);
                2u8
            })?
        }
        None => Options::new(),
    };
    if included {
        options = options.untransform_included(true);
    }
    if nest {
        options = options.nest_included(true);
    }
    if remove_cycles {
        options = options.remove_circular_dependencies(true);
    }

    let mut registry = Registry::new();
    for type_name in document_types(&document) {
        registry
            .register(type_name, Schema::new(), Options::new())
            .map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
    }

    let raw = registry.untransform(&document, &options).map_err(|e| {
        match &e {
            UntransformError::Document(DocumentError::Invalid { errors }) => {
                eprintln!("Invalid document:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            other => eprintln!("Error: {}", other),
        }
        e.exit_code() as u8
    })?;

    write_output(&Value::Object(raw), pretty, output)
}

fn run_transform(
    source_path: &Path,
    type_name: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let source = load_json(source_path).map_err(|e| {
        eprintln!("Error: loading source: {}", e);
        e.exit_code() as u8
    })?;

    let mut registry = Registry::new();
    registry
        .register(type_name, passthrough_schema(), Options::new())
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let document = registry
        .transform(type_name, &source, &Options::new())
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let value = serde_json::to_value(&document).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    write_output(&value, pretty, output)
}

/// Schema exposing every field except `id` as an attribute.
fn passthrough_schema() -> Schema {
    Schema::new().attributes(|ctx| match ctx.data {
        Value::Object(map) => {
            let attributes: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "id")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(attributes)
        }
        _ => Value::Null,
    })
}

/// Every resource type named anywhere in a document.
fn document_types(document: &Value) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    let mut resources: Vec<&Value> = Vec::new();
    match document.get("data") {
        Some(Value::Array(items)) => resources.extend(items),
        Some(item @ Value::Object(_)) => resources.push(item),
        _ => {}
    }
    if let Some(Value::Array(items)) = document.get("included") {
        resources.extend(items);
    }

    for resource in resources {
        if let Some(type_name) = resource.get("type").and_then(Value::as_str) {
            types.insert(type_name.to_string());
        }
        let Some(Value::Object(relationships)) = resource.get("relationships") else {
            continue;
        };
        for relationship in relationships.values() {
            let identifiers: Vec<&Value> = match relationship.get("data") {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(item @ Value::Object(_)) => vec![item],
                _ => Vec::new(),
            };
            for identifier in identifiers {
                if let Some(type_name) = identifier.get("type").and_then(Value::as_str) {
                    types.insert(type_name.to_string());
                }
            }
        }
    }
    types.retain(|t| !t.is_empty());
    types
}

fn write_output(value: &Value, pretty: bool, output: Option<PathBuf>) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        let output = serde_json::json!({ "valid": false, "error": msg });
        println!("{}", output);
    } else {
        eprintln!("Error: {}", msg);
    }
}
