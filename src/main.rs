//! imgkit CLI - apply an operation stack to an image from the command line.
//!
//! ```bash
//! # List registered operations
//! imgkit list
//!
//! # Show the options of an operation
//! imgkit info crop
//!
//! # Crop, rotate and tint an image
//! imgkit render in.png out.jpg --op crop:width=100,height=100 --op rotation:angle=90 \
//!     --op filters:filter=sepia,intensity=0.5
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use imgkit::prelude::*;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// imgkit - composable image editing.
#[derive(Parser, Debug)]
#[command(name = "imgkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List all registered operations
    List,

    /// Show detailed info about an operation
    Info {
        /// Operation identifier
        operation: String,
    },

    /// Apply operations to an image and write the result
    Render(RenderArgs),
}

/// Arguments for `render`.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Input image
    input: PathBuf,

    /// Output file
    output: PathBuf,

    /// Operation to append, as `id` or `id:key=value,key=value` (repeatable)
    #[arg(long = "op", value_name = "OP")]
    ops: Vec<String>,

    /// JSON stack preset applied before any --op
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Output format (png, jpeg); defaults to the output extension
    #[arg(long)]
    format: Option<String>,

    /// Target size as WxH, Wx or xH
    #[arg(long)]
    size: Option<String>,

    /// Write a data URL text file instead of an image
    #[arg(long)]
    data_url: bool,

    /// Write the final stack as a JSON preset to this path
    #[arg(long)]
    save_preset: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KitConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => KitConfig::default(),
    };
    init_logging(&config, cli.verbose);
    debug!("imgkit v{}", imgkit::VERSION);

    match cli.command {
        Commands::List => list_operations(),
        Commands::Info { operation } => operation_info(&operation),
        Commands::Render(args) => render(args, config).await,
    }
}

/// `RUST_LOG` overrides the configured level; `-v` forces debug.
fn init_logging(config: &KitConfig, verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        config.logging.level_filter().unwrap_or(log::LevelFilter::Info)
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn list_operations() -> anyhow::Result<()> {
    let registry = OperationRegistry::with_builtins();
    println!("Available operations ({} total):", registry.len());
    println!();

    for descriptor in registry.descriptors() {
        let metadata = descriptor.metadata();
        println!(
            "  • {:<10} [{}] {}",
            metadata.identifier,
            metadata.category.display_name(),
            metadata.description
        );
    }
    Ok(())
}

fn operation_info(identifier: &str) -> anyhow::Result<()> {
    let registry = OperationRegistry::with_builtins();
    let descriptor = registry.resolve(identifier)?;
    let metadata = descriptor.metadata();

    println!("{} ({})", metadata.name, metadata.identifier);
    println!("  {}", metadata.description);
    println!();
    println!("Options:");
    for option in metadata.schema.definitions() {
        let default = match &option.default_value {
            Some(value) => format!("default {}", value),
            None => "required".to_string(),
        };
        println!("  {:<10} {:<8} {}", option.name, option.option_type, default);
        if !option.description.is_empty() {
            println!("             {}", option.description);
        }
        for constraint in &option.constraints {
            println!("             {}", constraint.description());
        }
    }
    Ok(())
}

/// Parse `id` or `id:key=value,key=value`.
fn parse_op(raw: &str) -> anyhow::Result<(String, Options)> {
    let (identifier, rest) = match raw.split_once(':') {
        Some((identifier, rest)) => (identifier.trim(), rest),
        None => (raw.trim(), ""),
    };
    if identifier.is_empty() {
        bail!("Operation '{}' has no identifier", raw);
    }

    let mut options = Options::new();
    for pair in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected key=value in '{}', got '{}'", raw, pair);
        };
        options.set(key.trim(), Value::parse_literal(value));
    }
    Ok((identifier.to_string(), options))
}

async fn render(args: RenderArgs, config: KitConfig) -> anyhow::Result<()> {
    let source = RasterImage::from_path(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let encoder = config.render.encoder();
    let kit = Kit::builder().source(source).config(config).build()?;

    if let Some(preset) = &args.preset {
        let json = std::fs::read_to_string(preset)
            .with_context(|| format!("Failed to read preset {}", preset.display()))?;
        kit.import_stack(&json)?;
    }
    for raw in &args.ops {
        let (identifier, options) = parse_op(raw)?;
        kit.push(&identifier, options)?;
    }

    let report = kit.validate();
    for warning in &report.warnings {
        warn!("{}. [{}] {}", warning.index, warning.operation, warning.message);
    }
    if !report.can_render() {
        for error in report.detailed_errors() {
            eprintln!("{}", error);
        }
        bail!("{}", report.summary());
    }

    let format = match &args.format {
        Some(raw) => Some(raw.clone()),
        None if args.data_url => None,
        None => ImageFormat::from_path(&args.output).map(|f| f.mime_type().to_string()),
    };
    let render_type = if args.data_url { "data-url" } else { "image" };
    let result = kit
        .render_with(Some(render_type), format.as_deref(), args.size.as_deref())
        .await?;

    match &result.output {
        RenderOutput::DataUrl(url) => write_output(&args.output, url.as_bytes())?,
        RenderOutput::Image(image) => {
            let bytes = encoder.encode(image, result.format)?;
            write_output(&args.output, &bytes)?;
        }
    }

    if let Some(path) = &args.save_preset {
        write_output(path, kit.export_stack()?.as_bytes())?;
    }

    let (width, height) = result.stats.output_dimensions;
    println!(
        "✓ {} stage(s) → {}x{} {} in {}ms: {}",
        result.stats.stages_applied,
        width,
        height,
        result.format,
        result.stats.total_ms,
        args.output.display()
    );
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
