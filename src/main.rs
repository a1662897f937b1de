use anyhow::{Context, Result};
use clap::Parser;
use classpath_loader::cli::{Cli, Commands};
use classpath_loader::config::{LOG_ENV, resolve_config, resolve_roots};
use classpath_loader::{Classpath, LoaderContext, MetricsSnapshot, PackageAttributes, Resource};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(&cli)?;
    let roots = resolve_roots(&cli)?;
    let ctx = LoaderContext::new(config);

    let start = Instant::now();
    let classpath = Classpath::open(&roots, ctx).context("Failed to open classpath")?;
    let open_ms = start.elapsed().as_millis() as u64;

    match cli.command.clone() {
        Commands::Resolve { name, all, output } => {
            let result = resolve(&classpath, &name, all)?;
            if let Some(path) = output.as_deref() {
                write_output(&classpath, &name, path)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Index => {
            let result = IndexResult {
                roots: classpath.len(),
                names: classpath.cache().name_count(),
                duration_ms: open_ms,
                status: classpath.index_status().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Roots => {
            let roots: Vec<RootEntry> = classpath
                .loaders()
                .iter()
                .zip(roots.iter())
                .map(|(loader, spec)| RootEntry {
                    index: loader.index(),
                    path: loader.root().to_string_lossy().to_string(),
                    base_url: loader.base_url().to_string(),
                    can_lock_file: spec.can_lock_file,
                    preload: spec.preload,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&roots)?);
        }
        Commands::Metrics => {
            let result = resolve_stdin(&classpath)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Serialize)]
struct ResolvedResource {
    loader_index: usize,
    url: String,
    size: usize,
    sha256: String,
    attributes: PackageAttributes,
}

#[derive(Debug, Serialize)]
struct ResolveResult {
    name: String,
    resources: Vec<ResolvedResource>,
}

#[derive(Debug, Serialize)]
struct IndexResult {
    roots: usize,
    names: usize,
    duration_ms: u64,
    status: Vec<classpath_loader::IndexStatus>,
}

#[derive(Debug, Serialize)]
struct RootEntry {
    index: usize,
    path: String,
    base_url: String,
    can_lock_file: bool,
    preload: bool,
}

#[derive(Debug, Serialize)]
struct MetricsResult {
    requested: usize,
    resolved: usize,
    missing: Vec<String>,
    metrics: MetricsSnapshot,
}

fn resolve(classpath: &Classpath, name: &str, all: bool) -> Result<ResolveResult> {
    let hits = if all {
        classpath.find_resources(name)
    } else {
        classpath.find_resource_with_index(name).into_iter().collect()
    };

    if hits.is_empty() {
        anyhow::bail!("Resource not found on classpath: {name}");
    }

    let mut resources = Vec::with_capacity(hits.len());
    for (loader_index, res) in hits {
        resources.push(describe(loader_index, &*res)?);
    }

    Ok(ResolveResult {
        name: name.to_string(),
        resources,
    })
}

fn describe(loader_index: usize, res: &dyn Resource) -> Result<ResolvedResource> {
    let bytes = res
        .bytes()
        .with_context(|| format!("Failed to read resource: {}", res.url()))?;
    Ok(ResolvedResource {
        loader_index,
        url: res.url().to_string(),
        size: bytes.len(),
        sha256: hash_bytes(&bytes),
        attributes: res.attributes().clone(),
    })
}

fn write_output(classpath: &Classpath, name: &str, path: &Path) -> Result<()> {
    let res = classpath
        .find_resource(name)
        .with_context(|| format!("Resource not found on classpath: {name}"))?;
    let bytes = res
        .bytes()
        .with_context(|| format!("Failed to read resource: {}", res.url()))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}

fn resolve_stdin(classpath: &Classpath) -> Result<MetricsResult> {
    let mut requested = 0usize;
    let mut resolved = 0usize;
    let mut missing = Vec::new();

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read names from stdin")?;
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        requested += 1;
        match classpath.find_resource(name) {
            Some(_) => resolved += 1,
            None => missing.push(name.to_string()),
        }
    }

    Ok(MetricsResult {
        requested,
        resolved,
        missing,
        metrics: classpath.context().metrics().snapshot(),
    })
}

fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
