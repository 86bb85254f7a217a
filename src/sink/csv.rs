use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::TableWriter;
use crate::row::{Field, Row};
use crate::schema::RowSchema;

type GzCsvWriter = ::csv::Writer<GzEncoder<BufWriter<File>>>;

/// Gzip-compressed CSV. Nulls are empty fields; JSON columns hold the value's
/// compact JSON text.
pub struct CsvTableWriter {
    schema: &'static RowSchema,
    writer: GzCsvWriter,
    scratch: String,
}

impl CsvTableWriter {
    pub fn create(path: &Path, schema: &'static RowSchema) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(encoder);
        writer.write_record(schema.column_names())?;
        Ok(Self {
            schema,
            writer,
            scratch: String::new(),
        })
    }

    fn write_field(&mut self, field: &Field<'_>) -> Result<()> {
        match field {
            Field::Null => self.writer.write_field("")?,
            Field::Text(s) => self.writer.write_field(s.as_bytes())?,
            Field::Bool(b) => self.writer.write_field(if *b { "true" } else { "false" })?,
            Field::Number(n) => {
                use std::fmt::Write as _;
                self.scratch.clear();
                write!(self.scratch, "{}", n)?;
                self.writer.write_field(&self.scratch)?;
            }
            Field::Json(value) => {
                let text = serde_json::to_string(value)?;
                self.writer.write_field(text)?;
            }
        }
        Ok(())
    }
}

impl TableWriter for CsvTableWriter {
    fn encode(&mut self, row: &Row<'_>) -> Result<()> {
        if row.fields.len() != self.schema.arity() {
            bail!(
                "{} expects {} fields, got {}",
                self.schema.table,
                self.schema.arity(),
                row.fields.len()
            );
        }
        for field in &row.fields {
            self.write_field(field)?;
        }
        // An empty record terminates the one built field by field.
        self.writer.write_record(None::<&[u8]>)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        let encoder = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush CSV writer")?;
        let mut buffered = encoder.finish().context("Failed to write gzip trailer")?;
        buffered.flush()?;
        Ok(())
    }
}
