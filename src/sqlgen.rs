//! Load statements for the files written by a conversion run.
//!
//! Column lists and types come from the same `RowSchema`s the sinks use, so a
//! script always matches the files it points at.

use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::entity::EntityType;
use crate::schema::RowSchema;
use crate::sink::{table_path, OutputFormat};

pub const SCHEMA_NAME: &str = "openalex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Dialect {
    /// `INSERT ... SELECT` from `read_csv` / `read_parquet`
    #[default]
    Duckdb,
    /// psql `\copy` through `gzip -dc`
    Postgres,
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    pub dialect: Dialect,
    pub format: OutputFormat,
    pub chunks: usize,
    /// Prepend `CREATE SCHEMA` / `CREATE TABLE IF NOT EXISTS` statements.
    pub create_tables: bool,
}

/// Builds the load script for `entities` whose files live under `output_dir`.
pub fn load_script(
    entities: &[EntityType],
    output_dir: &Path,
    options: &ScriptOptions,
) -> Result<String> {
    if options.dialect == Dialect::Postgres && options.format == OutputFormat::Parquet {
        bail!("PostgreSQL load scripts only support CSV output");
    }

    let mut script = String::new();
    if options.create_tables {
        writeln!(script, "CREATE SCHEMA IF NOT EXISTS {};", SCHEMA_NAME)?;
        for entity in entities {
            for table in entity.tables {
                create_table(&mut script, table)?;
            }
        }
        script.push('\n');
    }

    for entity in entities {
        for table in entity.tables {
            for chunk in 0..options.chunks.max(1) {
                let path = table_path(output_dir, entity.name, table.table, chunk, options.format)
                    .display()
                    .to_string();
                match (options.dialect, options.format) {
                    (Dialect::Duckdb, OutputFormat::Csv) => duckdb_csv(&mut script, table, &path)?,
                    (Dialect::Duckdb, OutputFormat::Parquet) => {
                        duckdb_parquet(&mut script, table, &path)?
                    }
                    (Dialect::Postgres, _) => postgres_copy(&mut script, table, &path)?,
                }
            }
        }
    }
    Ok(script)
}

/// Chunk count of an earlier conversion, read back from the primary table
/// files (`<table>0`, `<table>1`, ...) of every entity that has any.
pub fn detect_chunks(
    entities: &[EntityType],
    output_dir: &Path,
    format: OutputFormat,
) -> Result<usize> {
    let mut detected: Option<(usize, &str)> = None;
    for entity in entities {
        let Some(primary) = entity.tables.first() else {
            continue;
        };
        let count = (0..)
            .take_while(|&chunk| {
                table_path(output_dir, entity.name, primary.table, chunk, format).is_file()
            })
            .count();
        if count == 0 {
            warn!(
                "No {} files for {} under {}",
                format.extension(),
                entity.name,
                output_dir.display()
            );
            continue;
        }
        match detected {
            Some((seen, other)) if seen != count => bail!(
                "{} has {} chunks but {} has {}; pass --chunks explicitly",
                other,
                seen,
                entity.name,
                count
            ),
            Some(_) => {}
            None => detected = Some((count, entity.name)),
        }
    }
    match detected {
        Some((count, _)) => {
            info!("Detected {} chunks under {}", count, output_dir.display());
            Ok(count)
        }
        None => bail!("No converted files found under {}", output_dir.display()),
    }
}

fn create_table(script: &mut String, table: &RowSchema) -> Result<()> {
    let columns = table
        .columns
        .iter()
        .map(|c| format!("    {} {}", c.name, c.semantic_type.sql_name()))
        .collect::<Vec<_>>()
        .join(",\n");
    writeln!(
        script,
        "CREATE TABLE IF NOT EXISTS {}.{} (\n{}\n);",
        SCHEMA_NAME, table.table, columns
    )?;
    Ok(())
}

fn column_list(table: &RowSchema) -> String {
    table.column_names().collect::<Vec<_>>().join(", ")
}

fn duckdb_csv(script: &mut String, table: &RowSchema, path: &str) -> Result<()> {
    let types = table
        .columns
        .iter()
        .map(|c| format!("'{}': '{}'", c.name, c.semantic_type.sql_name()))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        script,
        "INSERT INTO {}.{}({})\nSELECT * FROM read_csv({}, header = true, columns = {{{}}});",
        SCHEMA_NAME,
        table.table,
        column_list(table),
        quote_literal(path),
        types
    )?;
    Ok(())
}

fn duckdb_parquet(script: &mut String, table: &RowSchema, path: &str) -> Result<()> {
    let columns = column_list(table);
    writeln!(
        script,
        "INSERT INTO {}.{}({})\nSELECT {} FROM read_parquet({});",
        SCHEMA_NAME,
        table.table,
        columns,
        columns,
        quote_literal(path)
    )?;
    Ok(())
}

fn postgres_copy(script: &mut String, table: &RowSchema, path: &str) -> Result<()> {
    writeln!(
        script,
        "\\copy {}.{}({}) FROM PROGRAM {} WITH (FORMAT csv, HEADER true);",
        SCHEMA_NAME,
        table.table,
        column_list(table),
        quote_literal(&format!("gzip -dc {}", path))
    )?;
    Ok(())
}

/// `'...'` with embedded quotes doubled.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{authors, topics, Catalog};

    fn options(dialect: Dialect, format: OutputFormat, chunks: usize) -> ScriptOptions {
        ScriptOptions {
            dialect,
            format,
            chunks,
            create_tables: false,
        }
    }

    #[test]
    fn duckdb_csv_statement_carries_the_type_map() {
        let script = load_script(
            &[topics::ENTITY],
            Path::new("/data/out"),
            &options(Dialect::Duckdb, OutputFormat::Csv, 1),
        )
        .unwrap();
        let mut lines = script.lines();
        assert_eq!(
            lines.next().unwrap(),
            "INSERT INTO openalex.topics(id, display_name, subfield_id, subfield_display_name, \
             field_id, field_display_name, domain_id, domain_display_name, description, keywords, \
             works_api_url, wikipedia_id, works_count, cited_by_count, updated_date, siblings)"
        );
        let select = lines.next().unwrap();
        assert!(select.starts_with(
            "SELECT * FROM read_csv('/data/out/topics/topics0.csv.gz', header = true, columns = {'id': 'TEXT', "
        ));
        assert!(select.ends_with("'updated_date': 'TIMESTAMP', 'siblings': 'JSON'});"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn one_statement_per_table_and_chunk() {
        let script = load_script(
            &[authors::ENTITY],
            Path::new("out"),
            &options(Dialect::Duckdb, OutputFormat::Csv, 3),
        )
        .unwrap();
        assert_eq!(script.matches("INSERT INTO").count(), 3 * 3);
        for chunk in 0..3 {
            assert!(script.contains(&format!("'out/authors/authors_ids{chunk}.csv.gz'")));
        }
    }

    #[test]
    fn parquet_and_postgres_variants() {
        let script = load_script(
            &[authors::ENTITY],
            Path::new("out"),
            &options(Dialect::Duckdb, OutputFormat::Parquet, 1),
        )
        .unwrap();
        assert!(script.contains(
            "INSERT INTO openalex.authors_ids(author_id, openalex, orcid, scopus, twitter, wikipedia, mag)\n\
             SELECT author_id, openalex, orcid, scopus, twitter, wikipedia, mag \
             FROM read_parquet('out/authors/authors_ids0.parquet');"
        ));

        let script = load_script(
            &[authors::ENTITY],
            Path::new("it's"),
            &options(Dialect::Postgres, OutputFormat::Csv, 1),
        )
        .unwrap();
        assert!(script.contains(
            "\\copy openalex.authors_counts_by_year(author_id, year, works_count, cited_by_count, oa_works_count) \
             FROM PROGRAM 'gzip -dc it''s/authors/authors_counts_by_year0.csv.gz' WITH (FORMAT csv, HEADER true);"
        ));

        assert!(load_script(
            &[authors::ENTITY],
            Path::new("out"),
            &options(Dialect::Postgres, OutputFormat::Parquet, 1),
        )
        .is_err());
    }

    #[test]
    fn chunk_count_is_read_back_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |entity: &str, table: &str, chunk: usize| {
            let path = table_path(dir.path(), entity, table, chunk, OutputFormat::Csv);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"").unwrap();
        };
        let entities = [authors::ENTITY, topics::ENTITY];
        assert!(detect_chunks(&entities, dir.path(), OutputFormat::Csv).is_err());

        for chunk in 0..3 {
            touch("authors", "authors", chunk);
        }
        touch("authors", "authors", 7);
        assert_eq!(detect_chunks(&entities, dir.path(), OutputFormat::Csv).unwrap(), 3);
        assert!(detect_chunks(&entities, dir.path(), OutputFormat::Parquet).is_err());

        touch("topics", "topics", 0);
        assert!(detect_chunks(&entities, dir.path(), OutputFormat::Csv).is_err());
    }

    #[test]
    fn create_tables_preamble_covers_every_table() {
        let catalog = Catalog::standard();
        let mut opts = options(Dialect::Duckdb, OutputFormat::Csv, 1);
        opts.create_tables = true;
        let script = load_script(catalog.entities(), Path::new("out"), &opts).unwrap();

        assert!(script.starts_with("CREATE SCHEMA IF NOT EXISTS openalex;\n"));
        let tables: usize = catalog.entities().iter().map(|e| e.tables.len()).sum();
        assert_eq!(script.matches("CREATE TABLE IF NOT EXISTS").count(), tables);
        assert!(script.contains(
            "CREATE TABLE IF NOT EXISTS openalex.works_ids (\n    work_id TEXT,\n    openalex TEXT,\n    \
             doi TEXT,\n    mag BIGINT,\n    pmid TEXT,\n    pmcid TEXT\n);"
        ));
    }
}
