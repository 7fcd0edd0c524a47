use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tsjest_core::cache::DependencyGraphCache;
use tsjest_core::config::tsconfig::{find_config_file, read_config_file};
use tsjest_core::config::{CompilerOptions, ProjectReference};
use tsjest_core::fs::{resolve_path, RealFileSystem};

#[derive(Parser, Debug)]
#[command(name = "tsjest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tsconfig a project resolves to, with `extends` folded in
    Tsconfig {
        /// Directory the upward tsconfig search starts from
        #[arg(long, value_name = "DIR", default_value = ".")]
        root_dir: PathBuf,

        /// Explicit tsconfig file, relative to the root dir
        #[arg(short, long, value_name = "FILE")]
        project: Option<PathBuf>,
    },

    /// Inspect the persisted dependency graph
    Deps {
        #[command(subcommand)]
        action: DepsAction,
    },
}

#[derive(Subcommand, Debug)]
enum DepsAction {
    /// List recorded test files and the modules they import
    Show {
        #[arg(long, value_name = "DIR")]
        cache_dir: PathBuf,

        /// Print the raw graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recorded test files that import FILE
    Dependents {
        #[arg(long, value_name = "DIR")]
        cache_dir: PathBuf,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Delete the graph file
    Clear {
        #[arg(long, value_name = "DIR")]
        cache_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so that stdout stays machine-readable
    // Set RUST_LOG=debug for detailed logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;

    match cli.command {
        Command::Tsconfig { root_dir, project } => {
            let root_dir = resolve_path(&cwd, &root_dir);
            show_tsconfig(&root_dir, project.as_deref())
        }
        Command::Deps { action } => match action {
            DepsAction::Show { cache_dir, json } => show_graph(&resolve_path(&cwd, &cache_dir), json),
            DepsAction::Dependents { cache_dir, file } => show_dependents(
                &resolve_path(&cwd, &cache_dir),
                &resolve_path(&cwd, &file),
            ),
            DepsAction::Clear { cache_dir } => clear_graph(&resolve_path(&cwd, &cache_dir)),
        },
    }
}

fn show_tsconfig(root_dir: &Path, project: Option<&Path>) -> anyhow::Result<()> {
    let fs = RealFileSystem::new();
    let path = match project {
        Some(project) => resolve_path(root_dir, project),
        None => find_config_file(&fs, root_dir)
            .with_context(|| format!("No tsconfig.json found from {}", root_dir.display()))?,
    };
    debug!("Reading {:?}", path);

    let file = read_config_file(&fs, &path)?;
    // Validate the options the transformer types
    let _: CompilerOptions =
        serde_json::from_value(Value::Object(file.compiler_options.clone()))
            .with_context(|| format!("Invalid compilerOptions in {}", path.display()))?;

    let references = file
        .references
        .iter()
        .map(|reference| -> anyhow::Result<Value> {
            let loaded = ProjectReference::load(&fs, reference)?;
            Ok(json!({
                "path": loaded.config_path,
                "rootDir": loaded.root_dir,
                "outDir": loaded.out_dir,
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let output = json!({
        "path": file.path,
        "compilerOptions": file.compiler_options,
        "include": file.include,
        "files": file.files,
        "references": references,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn open_graph(cache_dir: &Path) -> DependencyGraphCache {
    DependencyGraphCache::open(Arc::new(RealFileSystem::new()), Some(cache_dir))
}

fn show_graph(cache_dir: &Path, as_json: bool) -> anyhow::Result<()> {
    let graph = open_graph(cache_dir);

    if as_json {
        let entries: serde_json::Map<String, Value> = graph
            .entries()
            .map(|(path, entry)| -> anyhow::Result<(String, Value)> {
                Ok((path.to_string_lossy().into_owned(), serde_json::to_value(entry)?))
            })
            .collect::<anyhow::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if graph.is_empty() {
        println!("No recorded test files in {}", cache_dir.display());
        return Ok(());
    }
    for (path, entry) in graph.entries() {
        println!("{}", path.display());
        for module in &entry.resolved_module_names {
            println!("  -> {}", module.display());
        }
    }
    info!("{} test file(s) recorded", graph.len());
    Ok(())
}

fn show_dependents(cache_dir: &Path, file: &Path) -> anyhow::Result<()> {
    let graph = open_graph(cache_dir);
    let dependents = graph.dependents_of(file);
    if dependents.is_empty() {
        println!("No recorded test file imports {}", file.display());
    }
    for dependent in dependents {
        println!("{}", dependent.display());
    }
    Ok(())
}

fn clear_graph(cache_dir: &Path) -> anyhow::Result<()> {
    let mut graph = open_graph(cache_dir);
    let count = graph.len();
    graph
        .clear()
        .with_context(|| format!("Failed to clear the dependency graph in {}", cache_dir.display()))?;
    println!("Cleared {count} recorded test file(s)");
    Ok(())
}
