use clap::{Parser, Subcommand};
use imgset::config::{self, Mode, PipelineConfig};
use imgset::imaging::{FitMode, Position, RustBackend};
use imgset::options::TransformOptions;
use imgset::output;
use imgset::plan;
use imgset::process::{self, WorkerPool};
use imgset::queue::DerivativeQueue;
use imgset::types::PlanResult;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Transform options shared by `plan` and `build`.
#[derive(clap::Args, Clone, Default)]
struct OptionArgs {
    /// Requested display width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Requested display height in pixels
    #[arg(long)]
    height: Option<u32>,
    /// cover, fill, contain, inside or outside
    #[arg(long)]
    fit: Option<FitMode>,
    /// Crop anchor, e.g. "center" or "right top"
    #[arg(long)]
    position: Option<Position>,
    /// Letterbox color (CSS color string)
    #[arg(long)]
    background: Option<String>,
    /// Placeholder blur radius, 0 for none
    #[arg(long)]
    blur: Option<u32>,
    /// Encoder quality, 1-100
    #[arg(long)]
    quality: Option<u32>,
    /// Explicit comma-separated width ladder
    #[arg(long, value_delimiter = ',')]
    widths: Option<Vec<u32>>,
    /// Override the generated `sizes` attribute
    #[arg(long)]
    sizes: Option<String>,
    /// Extra class names for the <img> element
    #[arg(long = "class")]
    class_names: Vec<String>,
    /// Alt text
    #[arg(long)]
    alt: Option<String>,
    /// Plan a single src: no srcset, sizes or placeholder
    #[arg(long)]
    no_srcset: bool,
    /// Do not add lazy-loading classes
    #[arg(long)]
    no_lazy: bool,
}

impl From<OptionArgs> for TransformOptions {
    fn from(args: OptionArgs) -> Self {
        TransformOptions {
            width: args.width,
            height: args.height,
            fit: args.fit,
            position: args.position,
            background: args.background,
            blur: args.blur,
            quality: args.quality,
            widths: args.widths,
            sizes: args.sizes,
            class_names: args.class_names,
            alt: args.alt,
            srcset: !args.no_srcset,
            lazy: !args.no_lazy,
        }
    }
}

#[derive(Parser)]
#[command(name = "imgset")]
#[command(about = "Responsive image derivatives for static sites")]
#[command(long_about = "\
Responsive image derivatives for static sites

Plans every width a browser may need for a source image, names each
derivative by its content and options, and encodes each one once. Repeat
builds copy from the derivative cache instead of re-encoding.

Project layout (all paths configurable in imgset.toml):

  imgset.toml              # Optional config, overrides stock defaults
  photos/dawn.jpg          # Sources, anywhere under the project root
  .imgset-cache/           # Derivative cache, survives clean builds
  dist/assets/static/      # Derivatives: dawn.<options>.<content>.jpg

Logging goes to stderr; set RUST_LOG=imgset=debug for per-item detail.

Run 'imgset gen-config' to generate a documented imgset.toml.")]
#[command(version)]
struct Cli {
    /// Project root (config file, sources and relative paths)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Plan on-demand URLs instead of files (dev server mode)
    #[arg(long, global = true)]
    serve: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the derivatives of one source and print them
    Plan {
        /// Source image, relative to the root
        source: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan and encode every source under the given paths
    Build {
        /// Files or directories to scan (default: the root)
        paths: Vec<PathBuf>,
        #[command(flatten)]
        options: OptionArgs,
        /// Ignore the derivative cache, force re-encoding
        #[arg(long)]
        no_cache: bool,
        /// Worker threads (default: processing.max_processes or all cores)
        #[arg(long)]
        threads: Option<usize>,
        /// Write every plan as JSON to this file
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Render one on-demand derivative from its URL query string
    Render {
        /// Source image, relative to the root
        source: PathBuf,
        /// Query string, e.g. "width=480&quality=75&key=3f9a2c1"
        #[arg(long, default_value = "")]
        query: String,
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a stock imgset.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(&cli.root)?;
    if cli.serve {
        config.mode = Mode::Serve;
    }
    let backend = RustBackend::new();

    match cli.command {
        Command::Plan {
            source,
            options,
            json,
        } => {
            let plan = plan::plan(&backend, &config, &source, &options.into())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_plan(&plan);
            }
        }
        Command::Build {
            paths,
            options,
            no_cache,
            threads,
            manifest,
        } => {
            if no_cache {
                config.paths.cache_dir = None;
            }
            let options: TransformOptions = options.into();
            let roots = if paths.is_empty() {
                vec![config.root.clone()]
            } else {
                paths.iter().map(|p| config.root.join(p)).collect()
            };
            let sources = collect_sources(&config, &roots);
            info!(count = sources.len(), "planning sources");

            let mut queue = DerivativeQueue::new(config.cache_dir());
            let mut plans: Vec<PlanResult> = Vec::new();
            let mut plan_failures = 0;
            for source in &sources {
                match plan::plan(&backend, &config, source, &options) {
                    Ok(plan) => {
                        queue.enqueue_plan(&plan);
                        plans.push(plan);
                    }
                    Err(e) => {
                        plan_failures += 1;
                        eprintln!("{}", e);
                    }
                }
            }

            if let Some(path) = manifest {
                std::fs::write(&path, serde_json::to_string_pretty(&plans)?)?;
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = WorkerPool::new(&backend, &config)
                .with_events(tx)
                .run(queue.drain(), threads)?;
            if printer.join().is_err() {
                warn!("progress printer panicked");
            }
            output::print_report(&report);

            let failed = report.failures.len() + plan_failures;
            if failed > 0 {
                return Err(format!("{} image(s) failed", failed).into());
            }
        }
        Command::Render { source, query, out } => {
            let (bytes, _format) = process::render_on_demand(&backend, &config, &source, &query)?;
            match out {
                Some(path) => std::fs::write(path, bytes)?,
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
        // Printed before loading the config
        Command::GenConfig => {}
    }

    Ok(())
}

/// Every allowed source under `roots`, sorted, skipping the output and cache
/// directories.
fn collect_sources(config: &PipelineConfig, roots: &[PathBuf]) -> Vec<PathBuf> {
    let excluded: Vec<PathBuf> = std::iter::once(config.output_dir())
        .chain(config.cache_dir())
        .collect();
    let is_source = |path: &Path| {
        path.extension()
            .is_some_and(|e| config.is_allowed_extension(&e.to_string_lossy()))
    };

    let mut sources = Vec::new();
    for root in roots {
        if root.is_file() {
            sources.push(root.clone());
            continue;
        }
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !excluded.iter().any(|x| e.path() == x));
        for entry in walker {
            match entry {
                Ok(e) if e.file_type().is_file() && is_source(e.path()) => {
                    sources.push(e.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable entry: {}", e),
            }
        }
    }
    sources.sort();
    sources.dedup();
    sources
}
