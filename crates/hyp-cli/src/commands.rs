use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use hyp_drive::{DirOpener, DriveStore, LocalFs, LogNetwork};
use hyp_loader::{ClientModuleLoader, HandlerSource, LoaderConfig, SourceCompiler};
use hyp_manifest::{MainOptions, ManifestResolver};
use hyp_protocol::ModuleResolutionHandler;
use hyp_server::{HyperspaceServer, ServerConfig};
use hyp_types::ContentKey;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    tracing::debug!(drives = %cli.drives.display(), "opening drive store");
    let store = drive_store(&cli.drives);
    let format = cli.format;
    match cli.command {
        Command::Entry(args) => block_on(cmd_entry(&store, args, format)),
        Command::Preload(args) => block_on(cmd_preload(&store, args, format)),
        Command::Download(args) => block_on(cmd_download(&store, args, format)),
        // The loader drives its own runtime and must stay off ours.
        Command::Require(args) => cmd_require(store, args, format),
        Command::Serve(args) => block_on(cmd_serve(&cli.drives, store, args)),
    }
}

fn drive_store(drives: &Path) -> Arc<DriveStore> {
    Arc::new(DriveStore::new(Arc::new(DirOpener::new(drives)), Arc::new(LogNetwork)))
}

fn block_on<F: std::future::Future<Output = anyhow::Result<()>>>(fut: F) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    rt.block_on(fut)
}

async fn cmd_entry(store: &Arc<DriveStore>, args: EntryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = ManifestResolver::open(store, &args.url)?;
    let entry = resolver.main(MainOptions { preload: args.preload }).await;
    resolver.close();
    let entry = entry?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entry)?),
        OutputFormat::Text => {
            let kind = serde_json::to_value(entry.kind)?;
            println!("{} {}", kind.as_str().unwrap_or_default().cyan().bold(), entry.url);
        }
    }
    Ok(())
}

async fn cmd_preload(store: &Arc<DriveStore>, args: UrlArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = ManifestResolver::open(store, &args.url)?;
    let result = resolver.preload().await;
    resolver.close();
    let result = result?;
    match format {
        OutputFormat::Json => {
            let files: Vec<&String> = result.trace.keys().collect();
            println!("{}", json!({ "preloaded": result.preloaded, "files": files }));
        }
        OutputFormat::Text => {
            println!("{} Preloaded {} modules", "✓".green().bold(), result.preloaded.to_string().bold());
            for key in result.trace.keys() {
                println!("  {}", key.dimmed());
            }
        }
    }
    Ok(())
}

async fn cmd_download(store: &Arc<DriveStore>, args: UrlArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = ManifestResolver::open(store, &args.url)?;
    let stats = resolver.download().await;
    resolver.close();
    let stats = stats?;
    match (format, stats) {
        (OutputFormat::Json, Some(s)) => println!("{}", json!({ "files": s.files, "bytes": s.bytes })),
        (OutputFormat::Json, None) => println!("null"),
        (OutputFormat::Text, Some(s)) => println!(
            "{} Downloaded {} files ({} bytes)",
            "✓".green().bold(),
            s.files.to_string().bold(),
            s.bytes
        ),
        (OutputFormat::Text, None) => println!("{} is on local disk; nothing to download", args.url.yellow()),
    }
    Ok(())
}

fn cmd_require(store: Arc<DriveStore>, args: RequireArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.key {
        Some(hex) => LoaderConfig::for_host(ContentKey::from_hex(hex).context("invalid drive key")?),
        None => LoaderConfig::default(),
    }
    .with_root_filename(args.from.as_str());

    // In-process, so key-less requests may read the host disk.
    let handler = Arc::new(ModuleResolutionHandler::new(store).with_local(Some(LocalFs::new())));
    let source = Arc::new(HandlerSource::new(handler)?);
    let loader = ClientModuleLoader::new(config, source, Arc::new(SourceCompiler));
    let exports = loader.require(&args.name)?;

    if args.trace {
        let trace = loader.trace_paths();
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trace)?),
            OutputFormat::Text => {
                for (key, path) in &trace {
                    println!("{} {} {}", key.yellow(), "->".dimmed(), path);
                }
            }
        }
        return Ok(());
    }

    let value = exports.read().expect("lock poisoned").clone();
    match (format, value) {
        (OutputFormat::Text, serde_json::Value::String(source)) => print!("{source}"),
        (_, value) => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}

async fn cmd_serve(drives: &Path, store: Arc<DriveStore>, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_toml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig { drives_root: drives.to_path_buf(), ..ServerConfig::default() },
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    if args.local_root.is_some() {
        config.local_root = args.local_root;
        config.allow_local_modules = true;
    }

    println!("Hyperspace server on {} (drives: {})", config.bind_addr.to_string().bold(), config.drives_root.display());
    let server = if args.config.is_some() {
        HyperspaceServer::new(config)
    } else {
        HyperspaceServer::with_store(config, store)
    };
    server.serve().await?;
    Ok(())
}
