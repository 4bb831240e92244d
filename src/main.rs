use clap::{Parser, Subcommand};
use diary_media::imaging::{Quality, RustBackend, TransformRequest, transform};
use diary_media::{config, output, serve};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Overrides for values normally read from the config file.
#[derive(clap::Args, Clone)]
struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Directory of uploaded originals (overrides storage.originals_dir)
    #[arg(long)]
    originals: Option<PathBuf>,

    /// Directory for cached derivatives (overrides storage.cache_dir)
    #[arg(long)]
    cache: Option<PathBuf>,
}

/// Transform parameters, mirroring the `w`, `q` and `maxSize` query parameters.
#[derive(clap::Args, Clone)]
struct TransformArgs {
    /// Target width in pixels; height follows the aspect ratio
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    /// Encode quality, 1-100 (default: images.default_quality)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,

    /// Size ceiling in KB; quality is lowered until the output fits
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_size: Option<u32>,
}

#[derive(Parser)]
#[command(name = "diary-media")]
#[command(about = "On-demand derivative image cache for diary media")]
#[command(long_about = "\
On-demand derivative image cache for diary media

Serves uploaded originals under a URL prefix. Image requests carrying
transform parameters get a resized / re-encoded derivative instead, which is
cached on disk and reused for every identical request:

  GET /uploads/1712345678901-123456789.jpg?w=400&q=70&maxSize=50

  w        target width in pixels (height follows the aspect ratio)
  q        encode quality 1-100 (default 85)
  maxSize  size ceiling in KB; quality steps down until it fits

Requests without parameters, videos, and anything that fails to transform
are answered with the original file, byte for byte.

Run 'diary-media gen-config' to generate a documented config file.")]
#[command(version = env!("DIARY_MEDIA_VERSION"))]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "diary-media.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the media server
    Serve(ServeArgs),
    /// Run the transform pipeline once on a local file
    Transform {
        /// Original image
        file: PathBuf,

        #[command(flatten)]
        params: TransformArgs,

        /// Write the derivative here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the cache key a request would use
    Key {
        /// Original filename, e.g. photo.jpg
        filename: String,

        #[command(flatten)]
        params: TransformArgs,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Serve(args) => {
            let mut server_config = config::load_config(&cli.config)?;
            if let Some(bind) = args.bind {
                server_config.server.bind = bind;
            }
            if let Some(originals) = args.originals {
                server_config.storage.originals_dir = originals;
            }
            if let Some(cache) = args.cache {
                server_config.storage.cache_dir = cache;
            }
            server_config.validate()?;

            let workers = config::effective_workers(&server_config.processing);
            output::print_serve_banner(&server_config, workers);
            let runtime = tokio::runtime::Runtime::new()?;
            let stats = runtime.block_on(serve::run(&server_config))?;
            println!("Cache: {}", stats);
        }
        Command::Transform {
            file,
            params,
            out,
            json,
        } => {
            let server_config = config::load_config(&cli.config)?;
            let source = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or("transform needs a file path")?;
            let request = build_request(source, &params, &server_config.images);

            let original = std::fs::read(&file)?;
            let derivative = transform(&RustBackend::new(), &original, &request)?;
            if let Some(out) = out {
                std::fs::write(&out, &derivative.bytes)?;
            }

            if json {
                let report = output::TransformReport::new(&request, &derivative);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_transform_output(&request, &derivative);
            }
        }
        Command::Key { filename, params } => {
            let server_config = config::load_config(&cli.config)?;
            let request = build_request(filename, &params, &server_config.images);
            println!("{}", request.key());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Same defaults and clamps the server applies to query parameters.
fn build_request(
    source: String,
    params: &TransformArgs,
    images: &config::ImagesConfig,
) -> TransformRequest {
    let limits = images.limits();
    TransformRequest {
        source,
        width: params.width.map(|w| w.min(limits.max_width)),
        quality: params
            .quality
            .map(Quality::new)
            .unwrap_or(limits.default_quality),
        max_size_kb: params.max_size,
        max_pixels: limits.max_pixels,
    }
}

/// Log to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("diary_media=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
