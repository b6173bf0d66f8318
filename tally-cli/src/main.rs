use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally::aggregations::{AggregationExecutor, SearchRequest};
use tally::config::{default_config_path, Config};
use tally::script::{FieldValueScriptEngine, ScriptEngines};
use tally::segment::{MemorySegment, Segment, Shard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Tally CLI - run aggregations over JSONL shards")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an aggregation request and print the JSON response
    Aggregate {
        /// JSONL file holding one shard (repeatable)
        #[arg(short, long, required = true)]
        shard: Vec<PathBuf>,

        /// JSON file with the search request
        #[arg(short, long)]
        request: PathBuf,

        /// Config file (defaults to ~/.tally/config.toml)
        #[arg(short, long, env = "TALLY_CONFIG")]
        config: Option<PathBuf>,

        /// Collect shards one after another
        #[arg(long)]
        sequential: bool,
    },

    /// Write the default configuration
    Config {
        /// Output path (defaults to ~/.tally/config.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.logging.format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_or_default(path),
        None => Config::load(),
    }
}

/// Read one JSONL file into a single-segment shard. Blank lines are skipped.
fn load_shard(path: &Path) -> Result<Shard> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut builder = MemorySegment::builder(0);
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", path))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("{:?} line {}: invalid JSON", path, line_no + 1))?;
        builder
            .add_document(&doc)
            .with_context(|| format!("{:?} line {}", path, line_no + 1))?;
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let segment: Arc<dyn Segment> = Arc::new(builder.build());
    Ok(Shard::new(name, vec![segment]))
}

fn aggregate(
    shard_paths: &[PathBuf],
    request_path: &Path,
    mut config: Config,
    sequential: bool,
) -> Result<()> {
    if sequential {
        config.engine.parallel_shards = false;
    }

    let request: SearchRequest = serde_json::from_str(
        &std::fs::read_to_string(request_path)
            .with_context(|| format!("Failed to read request {:?}", request_path))?,
    )
    .with_context(|| format!("Invalid request {:?}", request_path))?;

    let shards = shard_paths
        .iter()
        .map(|p| load_shard(p))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(
        shards = shards.len(),
        docs = shards.iter().map(Shard::num_docs).sum::<u64>(),
        "loaded shards"
    );

    let scripts = ScriptEngines::new().with_engine(Arc::new(FieldValueScriptEngine));
    let executor = AggregationExecutor::new(scripts, config.engine);
    let response = executor.execute(&request, &shards)?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            shard,
            request,
            config,
            sequential,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config);
            aggregate(&shard, &request, config, sequential)?;
        }
        Commands::Config { output } => {
            let config = Config::default();
            init_logging(&config);
            let path = match output {
                Some(path) => path,
                None => default_config_path()?,
            };
            config.save(&path)?;
            tracing::info!("Wrote default config to {:?}", path);
        }
    }

    Ok(())
}
