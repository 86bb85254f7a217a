//! Flattens an OpenAlex snapshot (gzip NDJSON, one directory per entity type)
//! into per-table, per-chunk compressed CSV or Parquet files plus a load
//! script for an analytic database.

pub mod discovery;
pub mod entity;
pub mod orchestrator;
pub mod reader;
pub mod record;
pub mod row;
pub mod schema;
pub mod sink;
pub mod sqlgen;

pub use entity::{Catalog, EntityType};
pub use orchestrator::{run_entity, ConvertOptions, EntityReport};
pub use sink::{OutputFormat, SinkOptions};
pub use sqlgen::{load_script, Dialect, ScriptOptions};
