//! schemagraph CLI - Explore a database schema as a knowledge graph
//!
//! Every command takes an INPUT: either the name of a source configured in
//! schemagraph.toml or the path to a JSON schema snapshot.
//!
//! Usage:
//!   schemagraph build <input>
//!   schemagraph tables <input>
//!   schemagraph context <input> <table> [--depth <n>]
//!   schemagraph path <input> <from> <to>
//!   schemagraph stats <input>
//!   schemagraph export <input> [--format json|graphml] [--output <file>]
//!
//! Examples:
//!   schemagraph context warehouse.json orders --depth 3
//!   schemagraph export warehouse --format graphml --output warehouse.graphml

use clap::{Parser, Subcommand};
use schemagraph::config::Settings;
use schemagraph::graph::ExportError;
use schemagraph::metadata::SnapshotSource;
use schemagraph::{ExportFormat, GraphRegistry};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "schemagraph")]
#[command(about = "schemagraph - A knowledge graph of relational schema metadata")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (overrides the default search)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph and print a summary
    Build {
        /// Configured source name or snapshot path
        input: String,
    },

    /// List tables with their categories
    Tables {
        /// Configured source name or snapshot path
        input: String,
    },

    /// Print the documentation context of a table (JSON)
    Context {
        /// Configured source name or snapshot path
        input: String,

        /// Table name
        table: String,

        /// Traversal depth for the semantic cluster
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Find the shortest relationship path between two tables
    Path {
        /// Configured source name or snapshot path
        input: String,

        from: String,

        to: String,
    },

    /// Print graph statistics
    Stats {
        /// Configured source name or snapshot path
        input: String,
    },

    /// Export the graph
    Export {
        /// Configured source name or snapshot path
        input: String,

        /// Output format (json or graphml)
        #[arg(short, long, default_value = "json", value_parser = parse_format)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_format(s: &str) -> Result<ExportFormat, ExportError> {
    s.parse()
}

/// Logs to stderr so stdout stays clean for results.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let input = match &cli.command {
        Commands::Build { input }
        | Commands::Tables { input }
        | Commands::Context { input, .. }
        | Commands::Path { input, .. }
        | Commands::Stats { input }
        | Commands::Export { input, .. } => input.clone(),
    };

    let registry = GraphRegistry::new(&settings);
    let summary = match build(&registry, &settings, &input).await {
        Ok(summary) => summary,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Build { .. } => {
            if cli.json {
                return print_json(&summary);
            }
            println!("Database: {}", summary.database_id);
            println!("  Tables: {}", summary.total_tables);
            println!("  Nodes:  {}", summary.total_nodes);
            println!("  Edges:  {}", summary.total_edges);
            if !summary.skipped.is_empty() {
                println!();
                println!("Skipped ({}):", summary.skipped.len());
                for skipped in &summary.skipped {
                    println!("  {}", skipped);
                }
            }
            ExitCode::SUCCESS
        }
        Commands::Tables { .. } => cmd_tables(&registry, &input, cli.json),
        Commands::Context { table, depth, .. } => {
            match registry.table_context(&input, &table, depth) {
                Ok(ctx) => print_json(&ctx),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Path { from, to, .. } => cmd_path(&registry, &input, &from, &to, cli.json),
        Commands::Stats { .. } => cmd_stats(&registry, &input, cli.json),
        Commands::Export { format, output, .. } => cmd_export(&registry, &input, format, output),
    }
}

/// Resolve the input to a snapshot, build it and publish it under `input`.
async fn build(
    registry: &GraphRegistry,
    settings: &Settings,
    input: &str,
) -> Result<schemagraph::registry::BuildSummary, String> {
    let path = match settings.get_source(input) {
        Ok(source) => source
            .resolved_snapshot_path()
            .map_err(|e| format!("Configuration error: {}", e))?,
        Err(_) => PathBuf::from(input),
    };

    let source = SnapshotSource::from_file(&path)
        .map_err(|e| format!("Error reading snapshot '{}': {}", path.display(), e))?;

    registry
        .build_graph(input, &source)
        .await
        .map_err(|e| format!("Build error: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_tables(registry: &GraphRegistry, input: &str, json: bool) -> ExitCode {
    let tables = match registry.list_tables(input) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        return print_json(&tables);
    }

    println!("Tables ({}):", tables.len());
    for table in &tables {
        let categories: Vec<&str> = table.categories.iter().map(|c| c.as_str()).collect();
        if categories.is_empty() {
            println!("  {} ({} rows, {} columns)", table.name, table.row_count, table.column_count);
        } else {
            println!(
                "  {} ({} rows, {} columns) [{}]",
                table.name,
                table.row_count,
                table.column_count,
                categories.join(", ")
            );
        }
    }
    ExitCode::SUCCESS
}

fn cmd_path(registry: &GraphRegistry, input: &str, from: &str, to: &str, json: bool) -> ExitCode {
    let result = match registry.find_path(input, from, to) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        return print_json(&result);
    }

    if result.path_found {
        println!("{}", result.path.join(" -> "));
        ExitCode::SUCCESS
    } else {
        eprintln!("No path found between {} and {}", from, to);
        ExitCode::FAILURE
    }
}

fn cmd_stats(registry: &GraphRegistry, input: &str, json: bool) -> ExitCode {
    let stats = match registry.statistics(input) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        return print_json(&stats);
    }

    println!("Nodes: {}", stats.total_nodes);
    for (kind, count) in &stats.node_types {
        println!("  {}: {}", kind, count);
    }
    println!("Edges: {}", stats.total_edges);
    for (kind, count) in &stats.edge_types {
        println!("  {}: {}", kind, count);
    }
    println!("Tables: {}", stats.total_tables);
    for (category, count) in &stats.category_distribution {
        println!("  {}: {}", category, count);
    }
    ExitCode::SUCCESS
}

fn cmd_export(
    registry: &GraphRegistry,
    input: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let document = match registry.export_graph(input, format) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(path) => match fs::write(&path, document) {
            Ok(()) => {
                eprintln!("Wrote {} export to {}", format, path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error writing '{}': {}", path.display(), e);
                ExitCode::FAILURE
            }
        },
        None => {
            print!("{}", document);
            ExitCode::SUCCESS
        }
    }
}
