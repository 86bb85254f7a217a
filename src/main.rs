use std::fs::{create_dir_all, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::MultiProgress;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use openalex_flattener::discovery::{check_input_root, find_entity_files};
use openalex_flattener::orchestrator::ChunkStats;
use openalex_flattener::sqlgen::detect_chunks;
use openalex_flattener::{
    load_script, run_entity, Catalog, ConvertOptions, Dialect, EntityType, OutputFormat,
    ScriptOptions, SinkOptions,
};

const MAX_DEFAULT_CHUNKS: usize = 8;

#[derive(Parser)]
#[command(name = "openalex_flattener")]
#[command(about = "Flattens an OpenAlex snapshot into compressed per-table files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert snapshot files into per-table, per-chunk output files
    Convert(ConvertArgs),
    /// Print the load script for an existing conversion
    Sql(SqlArgs),
    /// Print every entity type, table and column as JSON
    Schema,
}

#[derive(Args)]
struct LayoutArgs {
    /// Output directory; one sub-directory per entity type
    #[arg(short, long, default_value = "./openalex-tables")]
    output_dir: PathBuf,

    /// Number of chunks per entity type, one worker thread each (convert default:
    /// CPUs, at most 8; sql default: read from the existing files)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    chunks: Option<u32>,

    /// Entity types to process (comma-separated, default: all)
    #[arg(short, long, value_delimiter = ',')]
    entities: Vec<String>,

    /// Output file format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

impl LayoutArgs {
    fn chunks(&self) -> usize {
        self.chunks
            .map(|c| c as usize)
            .unwrap_or_else(|| num_cpus::get().clamp(1, MAX_DEFAULT_CHUNKS))
    }
}

#[derive(Args)]
struct ScriptArgs {
    /// Database the load script targets
    #[arg(long, value_enum, default_value_t = Dialect::Duckdb)]
    dialect: Dialect,

    /// Emit CREATE SCHEMA / CREATE TABLE statements before the loads
    #[arg(long)]
    create_tables: bool,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input directory containing the OpenAlex snapshot
    #[arg(short, long)]
    input_dir: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Rows per Parquet record batch
    #[arg(short, long, default_value = "100000")]
    batch_size: usize,

    /// Limit files per entity for testing (0 = no limit)
    #[arg(short, long, default_value = "0")]
    files_per_entity: usize,

    /// Also write the load script to this file
    #[arg(long)]
    sql_script: Option<PathBuf>,

    #[command(flatten)]
    script: ScriptArgs,
}

#[derive(Args)]
struct SqlArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    script: ScriptArgs,

    /// Write the script here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn script_options(layout: &LayoutArgs, script: &ScriptArgs, chunks: usize) -> ScriptOptions {
    ScriptOptions {
        dialect: script.dialect,
        format: layout.format,
        chunks,
        create_tables: script.create_tables,
    }
}

fn write_script(path: &Path, script: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(script.as_bytes())?;
    info!("Load script written to {}", path.display());
    Ok(())
}

fn convert(catalog: &Catalog, args: ConvertArgs) -> Result<()> {
    check_input_root(&args.input_dir)?;
    let entities: Vec<EntityType> = catalog.select(&args.layout.entities);
    let options = ConvertOptions {
        output_dir: args.layout.output_dir.clone(),
        chunks: args.layout.chunks(),
        sink: SinkOptions {
            format: args.layout.format,
            batch_size: args.batch_size,
        },
    };
    let limit = (args.files_per_entity > 0).then_some(args.files_per_entity);

    info!("Using {} chunks per entity type", options.chunks);
    info!("Processing entities: {:?}", entities.iter().map(|e| e.name).collect::<Vec<_>>());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.chunks)
        .thread_name(|i| format!("openalex-worker-{}", i))
        .build()
        .context("Failed to start worker pool")?;

    create_dir_all(&options.output_dir).with_context(|| {
        format!("Failed to create output directory {}", options.output_dir.display())
    })?;
    info!("Output directory: {}", options.output_dir.display());

    let progress = MultiProgress::new();
    let mut totals = ChunkStats::default();
    let mut converted = Vec::with_capacity(entities.len());
    for entity in entities {
        let Some(files) = find_entity_files(&args.input_dir, entity.name, limit)? else {
            continue;
        };
        if files.is_empty() {
            warn!("No input files for {}", entity.name);
        }
        let report = run_entity(&entity, &files, &options, &pool, &progress)?;
        totals.merge(&report.stats);
        converted.push(entity);
    }

    info!("Final Processing Statistics:");
    info!("  Files processed: {}", totals.files);
    info!("  Records read: {}", totals.records);
    info!("  Records skipped (no id): {}", totals.skipped_records);
    info!("  Rows written: {}", totals.rows_written);
    info!("  Read errors: {}", totals.read_errors);
    info!("  Encode errors: {}", totals.encode_errors);
    info!("  Finalize errors: {}", totals.finish_errors);

    if let Some(path) = &args.sql_script {
        let script = load_script(
            &converted,
            &options.output_dir,
            &script_options(&args.layout, &args.script, options.chunks),
        )?;
        write_script(path, &script)?;
    }

    info!("Tables written to: {}", options.output_dir.display());
    Ok(())
}

fn sql(catalog: &Catalog, args: SqlArgs) -> Result<()> {
    let entities = catalog.select(&args.layout.entities);
    let chunks = match args.layout.chunks {
        Some(chunks) => chunks as usize,
        None => detect_chunks(&entities, &args.layout.output_dir, args.layout.format)?,
    };
    let script = load_script(
        &entities,
        &args.layout.output_dir,
        &script_options(&args.layout, &args.script, chunks),
    )?;
    match &args.out {
        Some(path) => write_script(path, &script),
        None => {
            io::stdout().lock().write_all(script.as_bytes())?;
            Ok(())
        }
    }
}

fn schema(catalog: &Catalog) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, catalog)?;
    writeln!(stdout)?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = Catalog::standard();

    match cli.command {
        Command::Convert(args) => convert(&catalog, args),
        Command::Sql(args) => sql(&catalog, args),
        Command::Schema => schema(&catalog),
    }
}
