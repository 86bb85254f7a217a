//! Per-chunk output files: one writer per table of an entity type.

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{debug, warn};

use crate::entity::EntityType;
use crate::row::Row;
use crate::schema::RowSchema;

pub mod csv;
pub mod parquet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// gzip-compressed CSV with a header row
    #[default]
    Csv,
    /// Snappy-compressed Parquet
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv.gz",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SinkOptions {
    pub format: OutputFormat,
    /// Rows buffered per parquet record batch.
    pub batch_size: usize,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            batch_size: 100_000,
        }
    }
}

/// Serializes rows of a single table into one file.
pub trait TableWriter: Send {
    /// Appends one row. A failed row leaves the writer usable for the next.
    fn encode(&mut self, row: &Row<'_>) -> Result<()>;

    /// Flushes buffered data and writes the format trailer.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// `<output>/<entity>/<table><chunk>.<ext>`
pub fn table_path(
    output_dir: &Path,
    entity: &str,
    table: &str,
    chunk: usize,
    format: OutputFormat,
) -> PathBuf {
    output_dir
        .join(entity)
        .join(format!("{}{}.{}", table, chunk, format.extension()))
}

pub fn open_table_writer(
    path: &Path,
    schema: &'static RowSchema,
    options: &SinkOptions,
) -> Result<Box<dyn TableWriter>> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let writer: Box<dyn TableWriter> = match options.format {
        OutputFormat::Csv => Box::new(csv::CsvTableWriter::create(path, schema)?),
        OutputFormat::Parquet => Box::new(parquet::ParquetTableWriter::create(
            path,
            schema,
            options.batch_size,
        )?),
    };
    Ok(writer)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkStats {
    pub rows_written: u64,
    pub encode_errors: u64,
    pub finish_errors: u64,
}

struct TableSlot {
    table: &'static str,
    path: PathBuf,
    writer: Box<dyn TableWriter>,
}

/// Every table file of one (entity, chunk) pair. Owned by a single worker.
pub struct ChunkSink {
    chunk: usize,
    slots: Vec<TableSlot>,
    stats: SinkStats,
}

impl ChunkSink {
    /// Opens one file per table of `entity`. Failing to create any of them is
    /// a setup error.
    pub fn open(
        output_dir: &Path,
        entity: &EntityType,
        chunk: usize,
        options: &SinkOptions,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(entity.tables.len());
        for schema in entity.tables {
            let path = table_path(output_dir, entity.name, schema.table, chunk, options.format);
            let writer = open_table_writer(&path, schema, options)
                .with_context(|| format!("Failed to open output file {}", path.display()))?;
            slots.push(TableSlot {
                table: schema.table,
                path,
                writer,
            });
        }
        Ok(Self {
            chunk,
            slots,
            stats: SinkStats::default(),
        })
    }

    /// Routes `row` to its table's writer. Failures are logged and counted.
    pub fn write(&mut self, row: &Row<'_>) {
        let table = row.table();
        let Some(slot) = self.slots.iter_mut().find(|s| s.table == table) else {
            warn!("Chunk {}: no output file for table {}", self.chunk, table);
            self.stats.encode_errors += 1;
            return;
        };
        match slot.writer.encode(row) {
            Ok(()) => self.stats.rows_written += 1,
            Err(e) => {
                warn!("Failed to encode row for {}: {:#}", slot.path.display(), e);
                self.stats.encode_errors += 1;
            }
        }
    }

    pub fn write_all<'a>(&mut self, rows: impl IntoIterator<Item = Row<'a>>) {
        for row in rows {
            self.write(&row);
        }
    }

    /// Finalizes every file, even after earlier encode failures.
    pub fn close(self) -> SinkStats {
        let mut stats = self.stats;
        for slot in self.slots {
            match slot.writer.finish() {
                Ok(()) => debug!("Closed {}", slot.path.display()),
                Err(e) => {
                    warn!("Failed to finalize {}: {:#}", slot.path.display(), e);
                    stats.finish_errors += 1;
                }
            }
        }
        stats
    }
}
