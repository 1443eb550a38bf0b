use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cameo_contracts::models::POPULAR_CHECKPOINTS;
use cameo_contracts::{
    normalize_base_url, AspectRatio, CloudModel, EngineKind, GenerationRequest, ImageAsset,
    Resolution,
};
use cameo_engine::{
    ConnectivityProber, EndpointDiscoverer, EngineConfig, EventWriter, Orchestrator,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cameo", version, about = "Video generation across cloud and local engines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one video and print the result as JSON.
    Run(RunArgs),
    /// Probe well-known local addresses for a live engine.
    Discover,
    /// List checkpoints installed on a local engine.
    Models(ModelsArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "cloud")]
    engine: EngineKind,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long, default_value = "fast")]
    cloud_model: CloudModel,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "720p")]
    resolution: Resolution,
    #[arg(long = "reference")]
    references: Vec<PathBuf>,
    #[arg(long)]
    style: Option<PathBuf>,
    #[arg(long)]
    start_frame: Option<PathBuf>,
    #[arg(long)]
    end_frame: Option<PathBuf>,
    #[arg(long = "loop")]
    looping: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    no_gpu: bool,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    no_simulation: bool,
}

#[derive(Debug, Parser)]
struct ModelsArgs {
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("cameo error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    match cli.command {
        Command::Run(args) => run_generate(args, config).await,
        Command::Discover => run_discover(config).await,
        Command::Models(args) => run_models(args, config).await,
    }
}

async fn run_generate(args: RunArgs, mut config: EngineConfig) -> Result<i32> {
    if args.no_simulation {
        config.allow_simulation = false;
    }
    let request = build_request(&args)?;
    let mut orchestrator = Orchestrator::new(&config);
    if let Some(path) = args.events.as_ref() {
        let session_id = format!("cli-{}-{}", std::process::id(), request.fingerprint());
        orchestrator = orchestrator.with_events(EventWriter::new(path, session_id));
    }

    let result = orchestrator.run(&request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(0)
}

fn build_request(args: &RunArgs) -> Result<GenerationRequest> {
    if args.prompt.trim().is_empty() {
        bail!("--prompt must not be empty");
    }
    let mut request = GenerationRequest::new(args.prompt.clone(), args.engine).with_gpu(!args.no_gpu);
    request.cloud_model = args.cloud_model;
    request.aspect_ratio = args.aspect_ratio;
    request.resolution = args.resolution;
    if let Some(model) = args.model.as_ref() {
        request = request.with_model_hint(model.clone());
    }
    if let Some(template) = args.template.as_ref() {
        request = request.with_template(template.clone());
    }
    if let Some(endpoint) = args.endpoint.as_ref() {
        request = request.with_local_endpoint(endpoint.clone());
    }
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }

    let has_frames = args.start_frame.is_some() || args.end_frame.is_some();
    let has_references = !args.references.is_empty() || args.style.is_some();
    if has_frames && has_references {
        bail!("frame images and reference images cannot be combined");
    }
    if has_frames {
        request = request.with_frames(
            args.start_frame.as_deref().map(read_image).transpose()?,
            args.end_frame.as_deref().map(read_image).transpose()?,
            args.looping,
        );
    } else if has_references {
        let references = args
            .references
            .iter()
            .map(|path| read_image(path))
            .collect::<Result<Vec<_>>>()?;
        request = request.with_reference_images(references);
        request.style_image = args.style.as_deref().map(read_image).transpose()?;
    }
    Ok(request)
}

fn read_image(path: &Path) -> Result<ImageAsset> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a recognized image", path.display()))?;
    Ok(ImageAsset::new(bytes, format.to_mime_type()))
}

async fn run_discover(config: EngineConfig) -> Result<i32> {
    let discoverer = EndpointDiscoverer::from_config(&config, Arc::new(ConnectivityProber::new()));
    match discoverer.discover().await {
        Some(endpoint) => {
            println!("{}", endpoint.base_url);
            Ok(0)
        }
        None => {
            eprintln!(
                "no live local engine found (tried {})",
                discoverer.candidates().join(", ")
            );
            Ok(1)
        }
    }
}

async fn run_models(args: ModelsArgs, config: EngineConfig) -> Result<i32> {
    let endpoint = args
        .endpoint
        .as_deref()
        .map(normalize_base_url)
        .unwrap_or_else(|| config.default_local_endpoint.clone());
    let checked = ConnectivityProber::new()
        .check(&endpoint, config.check_timeout)
        .await;
    if !checked.live {
        eprintln!("local engine not reachable at {}", checked.base_url);
        return Ok(1);
    }

    let orchestrator = Orchestrator::new(&config);
    let inventory = orchestrator
        .local()
        .fetch_inventory_with_timeout(&checked.base_url, config.check_timeout)
        .await?;
    if inventory.is_empty() {
        eprintln!("no checkpoints installed at {}; popular choices:", checked.base_url);
        for name in POPULAR_CHECKPOINTS {
            eprintln!("  {name}");
        }
        return Ok(1);
    }
    for name in inventory.iter() {
        println!("{name}");
    }
    Ok(0)
}
