use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    ArrayBuilder, ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use ::parquet::arrow::ArrowWriter;
use ::parquet::basic::Compression;
use ::parquet::file::properties::WriterProperties;
use serde_json::Number;

use super::TableWriter;
use crate::row::{Field, Row};
use crate::schema::RowSchema;

enum ColumnBuilder {
    Utf8(StringBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Boolean(BooleanBuilder),
}

impl ColumnBuilder {
    fn for_type(data_type: &DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Int64 => ColumnBuilder::Int64(Int64Builder::with_capacity(capacity)),
            DataType::Float64 => ColumnBuilder::Float64(Float64Builder::with_capacity(capacity)),
            DataType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::with_capacity(capacity)),
            _ => ColumnBuilder::Utf8(StringBuilder::with_capacity(capacity, capacity * 16)),
        }
    }

    /// Values that do not fit the column type are stored as null.
    fn append(&mut self, field: &Field<'_>) {
        match self {
            ColumnBuilder::Utf8(b) => match field {
                Field::Null => b.append_null(),
                Field::Text(s) => b.append_value(s),
                Field::Number(n) => b.append_value(n.to_string()),
                Field::Bool(v) => b.append_value(if *v { "true" } else { "false" }),
                Field::Json(v) => b.append_value(v.to_string()),
            },
            ColumnBuilder::Int64(b) => b.append_option(match field {
                Field::Number(n) => integer(n),
                _ => None,
            }),
            ColumnBuilder::Float64(b) => b.append_option(match field {
                Field::Number(n) => n.as_f64(),
                _ => None,
            }),
            ColumnBuilder::Boolean(b) => b.append_option(match field {
                Field::Bool(v) => Some(*v),
                _ => None,
            }),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnBuilder::Utf8(b) => b.len(),
            ColumnBuilder::Int64(b) => b.len(),
            ColumnBuilder::Float64(b) => b.len(),
            ColumnBuilder::Boolean(b) => b.len(),
        }
    }
}

/// Integral JSON numbers, including floats like `2020.0` that some dumps emit.
/// `i64::MAX as f64` rounds up to 2^63, which is already out of range.
fn integer(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Arrow-typed table file, written in record batches of `batch_size` rows.
pub struct ParquetTableWriter {
    schema: &'static RowSchema,
    arrow_schema: Arc<Schema>,
    writer: ArrowWriter<File>,
    columns: Vec<ColumnBuilder>,
    batch_size: usize,
}

impl ParquetTableWriter {
    pub fn create(path: &Path, schema: &'static RowSchema, batch_size: usize) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let arrow_schema = Arc::new(schema.to_arrow());
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props))?;
        let columns = Self::builders(&arrow_schema, batch_size);

        Ok(Self {
            schema,
            arrow_schema,
            writer,
            columns,
            batch_size,
        })
    }

    fn builders(schema: &Schema, batch_size: usize) -> Vec<ColumnBuilder> {
        let capacity = batch_size.min(8192);
        schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::for_type(f.data_type(), capacity))
            .collect()
    }

    fn buffered(&self) -> usize {
        self.columns.first().map_or(0, ColumnBuilder::len)
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.buffered() == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(self.arrow_schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        Ok(())
    }
}

impl TableWriter for ParquetTableWriter {
    fn encode(&mut self, row: &Row<'_>) -> Result<()> {
        if row.fields.len() != self.schema.arity() {
            bail!(
                "{} expects {} fields, got {}",
                self.schema.table,
                self.schema.arity(),
                row.fields.len()
            );
        }
        for (column, field) in self.columns.iter_mut().zip(&row.fields) {
            column.append(field);
        }
        if self.buffered() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.flush_batch()?;
        self.writer.close().context("Failed to write parquet footer")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::row_schema;
    use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray};
    use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;
    use tempfile::tempdir;

    row_schema!(MIXED = "mixed" {
        "id" => Text;
        "count" => Integer;
        "mag" => Bigint;
        "score" => Real;
        "flag" => Boolean;
        "extra" => Json;
    });

    fn read_batches(path: &Path) -> Vec<RecordBatch> {
        let file = File::open(path).unwrap();
        ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn typed_columns_round_trip_across_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed0.parquet");
        let extra = json!({"k": [1, 2]});
        let count = Number::from(3);
        let year_float = Number::from_f64(2020.0);
        let score = Number::from_f64(0.75);

        let mut writer = ParquetTableWriter::create(&path, &MIXED, 2).unwrap();
        writer
            .encode(&row!(MIXED; "W1", Some(&count), Some(Number::from(2741809807u64)),
                score.as_ref(), Some(true), Field::Json(&extra)))
            .unwrap();
        writer
            .encode(&row!(MIXED; "W2", year_float.as_ref(), None::<Number>,
                None::<&Number>, None::<bool>, Field::Null))
            .unwrap();
        writer
            .encode(&row!(MIXED; "W3", score.as_ref(), None::<Number>,
                Some(&count), Some(false), Field::Null))
            .unwrap();
        Box::new(writer).finish().unwrap();

        let batches = read_batches(&path);
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 3);
        let batch = arrow::compute::concat_batches(&batches[0].schema(), &batches).unwrap();

        let ids = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(ids.value(2), "W3");

        let counts = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(counts.value(0), 3);
        assert_eq!(counts.value(1), 2020);
        assert!(counts.is_null(2), "fractional value in an integer column");

        let mags = batch.column(2).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(mags.value(0), 2_741_809_807);
        assert!(mags.is_null(1));

        let scores = batch.column(3).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(scores.value(0), 0.75);
        assert_eq!(scores.value(2), 3.0);

        let flags = batch.column(4).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(flags.value(0));
        assert!(flags.is_null(1));

        let extras = batch.column(5).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(extras.value(0), r#"{"k":[1,2]}"#);
        assert!(extras.is_null(1));
    }

    #[test]
    fn integral_floats_within_i64_range() {
        let float = |f: f64| Number::from_f64(f).unwrap();
        assert_eq!(integer(&float(2020.0)), Some(2020));
        assert_eq!(integer(&float(-9_223_372_036_854_775_808.0)), Some(i64::MIN));
        assert_eq!(integer(&float(9_223_372_036_854_775_808.0)), None);
        assert_eq!(integer(&float(1e300)), None);
        assert_eq!(integer(&float(2.5)), None);
        assert_eq!(integer(&Number::from(i64::MAX)), Some(i64::MAX));
    }

    #[test]
    fn empty_table_still_has_a_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed1.parquet");
        Box::new(ParquetTableWriter::create(&path, &MIXED, 10).unwrap())
            .finish()
            .unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let names: Vec<_> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["id", "count", "mag", "score", "flag", "extra"]);
        assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
    }
}
