//! Splits one entity type's input files into chunks and converts every chunk
//! on its own worker thread.

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::entity::EntityType;
use crate::reader::RecordStream;
use crate::sink::{ChunkSink, SinkOptions};

const CHUNK_BAR_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7} {prefix} files | {msg}";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output_dir: PathBuf,
    /// Number of chunks, and of worker threads.
    pub chunks: usize,
    pub sink: SinkOptions,
}

/// Contiguous slice of the input file list handled by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub files: &'a [PathBuf],
}

/// Splits `files` into `n` contiguous chunks of `len / n` files each; the
/// last chunk also takes the remainder. With more chunks than files the
/// leading chunks are empty.
pub fn partition(files: &[PathBuf], n: usize) -> Vec<Chunk<'_>> {
    let n = n.max(1);
    let size = files.len() / n;
    (0..n)
        .map(|index| {
            let start = index * size;
            let end = if index + 1 == n { files.len() } else { start + size };
            Chunk {
                index,
                files: &files[start..end],
            }
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    pub files: u64,
    pub records: u64,
    /// Records without a usable `id`.
    pub skipped_records: u64,
    pub rows_written: u64,
    pub read_errors: u64,
    pub encode_errors: u64,
    pub finish_errors: u64,
}

impl ChunkStats {
    pub fn merge(&mut self, other: &ChunkStats) {
        self.files += other.files;
        self.records += other.records;
        self.skipped_records += other.skipped_records;
        self.rows_written += other.rows_written;
        self.read_errors += other.read_errors;
        self.encode_errors += other.encode_errors;
        self.finish_errors += other.finish_errors;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    pub entity: &'static str,
    pub chunks: usize,
    pub stats: ChunkStats,
}

/// Converts every file of one entity type and waits for all chunks.
pub fn run_entity(
    entity: &EntityType,
    files: &[PathBuf],
    options: &ConvertOptions,
    pool: &ThreadPool,
    progress: &MultiProgress,
) -> Result<EntityReport> {
    let entity_dir = options.output_dir.join(entity.name);
    create_dir_all(&entity_dir)
        .with_context(|| format!("Failed to create output directory {}", entity_dir.display()))?;

    let chunks = partition(files, options.chunks);
    info!(
        "Processing {} {} files in {} chunks",
        files.len(),
        entity.name,
        chunks.len()
    );

    let style = ProgressStyle::with_template(CHUNK_BAR_TEMPLATE)?;
    let bars: Vec<ProgressBar> = chunks
        .iter()
        .map(|chunk| {
            let bar = progress.add(ProgressBar::new(chunk.files.len() as u64));
            bar.set_style(style.clone());
            bar.set_prefix(format!("{} #{}", entity.name, chunk.index));
            bar
        })
        .collect();

    let results: Result<Vec<ChunkStats>> = pool.install(|| {
        chunks
            .par_iter()
            .with_max_len(1)
            .zip(bars.par_iter())
            .map(|(chunk, bar)| run_chunk(entity, chunk, &options.output_dir, &options.sink, bar))
            .collect()
    });
    let per_chunk = results?;

    let mut stats = ChunkStats::default();
    for chunk_stats in &per_chunk {
        stats.merge(chunk_stats);
    }

    info!(
        "Finished {}: {} records, {} rows, {} skipped, {} read errors, {} encode errors",
        entity.name,
        stats.records,
        stats.rows_written,
        stats.skipped_records,
        stats.read_errors,
        stats.encode_errors + stats.finish_errors,
    );

    Ok(EntityReport {
        entity: entity.name,
        chunks: chunks.len(),
        stats,
    })
}

fn run_chunk(
    entity: &EntityType,
    chunk: &Chunk<'_>,
    output_dir: &Path,
    sink_options: &SinkOptions,
    bar: &ProgressBar,
) -> Result<ChunkStats> {
    debug!("{} chunk {}: {} files", entity.name, chunk.index, chunk.files.len());
    let mut sink = ChunkSink::open(output_dir, entity, chunk.index, sink_options)?;
    let mut stats = ChunkStats {
        files: chunk.files.len() as u64,
        ..ChunkStats::default()
    };

    let file_bar = bar.clone();
    let records = RecordStream::new(chunk.files.iter()).on_file_done(move |_| file_bar.inc(1));
    for item in records {
        match item {
            Ok(record) => {
                stats.records += 1;
                let rows = entity.flatten(&record);
                if rows.is_empty() {
                    stats.skipped_records += 1;
                }
                sink.write_all(rows);
            }
            Err(e) => {
                warn!("{}", e);
                stats.read_errors += 1;
            }
        }
    }

    let sink_stats = sink.close();
    stats.rows_written = sink_stats.rows_written;
    stats.encode_errors = sink_stats.encode_errors;
    stats.finish_errors = sink_stats.finish_errors;

    bar.finish_with_message(format!("{} records", stats.records));
    Ok(stats)
}
