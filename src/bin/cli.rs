//! chunkcache CLI
//!
//! Shows how a file would be laid out across cache entries, and round-trips
//! it through an in-process transport.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use chunkcache::chunk::chunk_key;
use chunkcache::codec::PayloadHeader;
use chunkcache::pipeline::{Pipeline, WritePlan};
use chunkcache::{
    CacheValue, CompressionKind, Config, Expiration, MemoryTransport, StoreCoordinator, StoreMode,
    TypeRegistry,
};
use tracing_subscriber::{fmt, EnvFilter};

/// chunkcache CLI
#[derive(Parser, Debug)]
#[command(name = "chunkcache-cli")]
#[command(about = "Inspect and test the chunkcache value pipeline")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header and chunk layout for a file
    Inspect(PipelineArgs),

    /// Store a file in memory, read it back and compare
    Roundtrip(PipelineArgs),
}

#[derive(ClapArgs, Debug)]
struct PipelineArgs {
    /// File to encode as a raw byte value
    file: PathBuf,

    /// Cache key
    #[arg(short, long, default_value = "file")]
    key: String,

    /// Largest single entry in bytes
    #[arg(long, default_value = "252400")]
    chunk_threshold: usize,

    /// Compress payloads larger than this many bytes
    #[arg(long, default_value = "100000")]
    compression_threshold: usize,

    /// Compression algorithm
    #[arg(long, value_enum, default_value = "zstd")]
    compression: Algorithm,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Algorithm {
    #[value(name = "none")]
    Disabled,
    Zstd,
    Lz4,
}

impl PipelineArgs {
    fn config(&self) -> Config {
        let compression = match self.compression {
            Algorithm::Disabled => CompressionKind::None,
            Algorithm::Zstd => CompressionKind::Zstd { level: 3 },
            Algorithm::Lz4 => CompressionKind::Lz4,
        };
        Config::builder()
            .chunk_threshold(self.chunk_threshold)
            .compression_threshold(self.compression_threshold)
            .compression(compression)
            .build()
    }

    fn read(&self) -> chunkcache::Result<Bytes> {
        Ok(Bytes::from(std::fs::read(&self.file)?))
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,chunkcache=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match &args.command {
        Commands::Inspect(pipeline_args) => inspect(pipeline_args),
        Commands::Roundtrip(pipeline_args) => roundtrip(pipeline_args),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn inspect(args: &PipelineArgs) -> chunkcache::Result<()> {
    let data = args.read()?;
    let pipeline = Pipeline::new(args.config(), Arc::new(TypeRegistry::new()))?;
    let original_len = data.len();

    let chunks = match pipeline.prepare(CacheValue::Bytes(data))? {
        WritePlan::Chunks(chunks) => chunks,
        WritePlan::Native(scalar) => {
            println!("native value: {:?}", scalar);
            return Ok(());
        }
    };

    let header = PayloadHeader::from_bytes(&chunks[0])?;
    let stored: usize = chunks.iter().map(Bytes::len).sum();
    println!("input bytes:    {}", original_len);
    println!("stored bytes:   {}", stored);
    println!("compressed:     {}", header.compressed);
    println!("type name len:  {}", header.type_name_len);
    println!("chunk count:    {}", header.chunk_count);
    for (index, chunk) in chunks.iter().enumerate() {
        println!("  {:<32} {:>10}", chunk_key(&args.key, index), chunk.len());
    }
    Ok(())
}

fn roundtrip(args: &PipelineArgs) -> chunkcache::Result<()> {
    let data = args.read()?;
    let transport = MemoryTransport::new();
    let coordinator =
        StoreCoordinator::new(transport.clone(), args.config(), Arc::new(TypeRegistry::new()))?;

    let stored = coordinator.store(
        StoreMode::Set,
        &args.key,
        CacheValue::Bytes(data.clone()),
        Expiration::Never,
    )?;
    tracing::info!("Stored '{}' across {} entries", args.key, transport.len());

    let fetched = coordinator.fetch(&args.key)?;
    let matches = stored && fetched.as_ref().and_then(CacheValue::as_bytes) == Some(&data);
    println!("entries: {}", transport.len());
    println!("match:   {}", matches);

    if !matches {
        std::process::exit(2);
    }
    Ok(())
}
