//! Per-entity flatteners and the catalog of known entity types.
//!
//! Each entity module declares the `RowSchema`s of its tables and a pure
//! `flatten` function turning one record into rows for those tables.

use serde::Serialize;
use tracing::warn;

use crate::record::{objects, Record, RecordExt};
use crate::row::Row;
use crate::schema::RowSchema;

pub mod authors;
pub mod concepts;
pub mod institutions;
pub mod publishers;
pub mod sources;
pub mod topics;
pub mod works;

pub type FlattenFn = for<'a> fn(&'a Record) -> Vec<Row<'a>>;

/// One category of snapshot record and the tables it flattens into.
#[derive(Clone, Copy, Serialize)]
pub struct EntityType {
    /// Input and output sub-directory name.
    pub name: &'static str,
    pub tables: &'static [&'static RowSchema],
    #[serde(skip)]
    flatten: FlattenFn,
}

impl EntityType {
    pub const fn new(
        name: &'static str,
        tables: &'static [&'static RowSchema],
        flatten: FlattenFn,
    ) -> Self {
        Self {
            name,
            tables,
            flatten,
        }
    }

    /// Rows for every table of this entity. Records without a string `id`
    /// produce nothing.
    pub fn flatten<'a>(&self, record: &'a Record) -> Vec<Row<'a>> {
        (self.flatten)(record)
    }

    pub fn table(&self, name: &str) -> Option<&'static RowSchema> {
        self.tables.iter().copied().find(|t| t.table == name)
    }
}

impl std::fmt::Debug for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("tables", &self.tables.iter().map(|t| t.table).collect::<Vec<_>>())
            .finish()
    }
}

/// The ordered, immutable set of entity types known to this build.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    entities: Vec<EntityType>,
}

impl Catalog {
    pub fn standard() -> Self {
        Self {
            entities: vec![
                authors::ENTITY,
                topics::ENTITY,
                concepts::ENTITY,
                institutions::ENTITY,
                publishers::ENTITY,
                sources::ENTITY,
                works::ENTITY,
            ],
        }
    }

    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.iter().map(|e| e.name)
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Entities named in `requested`, in catalog order. An empty request
    /// selects everything; unknown names are logged and ignored.
    pub fn select(&self, requested: &[String]) -> Vec<EntityType> {
        if requested.is_empty() {
            return self.entities.clone();
        }
        for name in requested {
            if self.get(name).is_none() {
                warn!("Unknown entity type: {}", name);
            }
        }
        self.entities
            .iter()
            .filter(|e| requested.iter().any(|r| r == e.name))
            .copied()
            .collect()
    }
}

/// Shared shape of every `*_counts_by_year` table: parent key, year and the
/// three yearly counters. Elements without a numeric `year` are skipped, since
/// `year` is half of the child row's key.
pub(crate) fn push_counts_by_year<'a>(
    rows: &mut Vec<Row<'a>>,
    schema: &'static RowSchema,
    parent_id: &'a str,
    record: &'a Record,
) {
    let Some(counts) = record.array_at("counts_by_year") else {
        return;
    };
    for count in objects(counts) {
        let Some(year) = count.number_at("year") else {
            continue;
        };
        rows.push(crate::row!(*schema;
            parent_id,
            Some(year),
            count.number_at("works_count"),
            count.number_at("cited_by_count"),
            count.number_at("oa_works_count"),
        ));
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::*;
    use super::*;

    #[test]
    fn catalog_order_is_fixed() {
        let catalog = Catalog::standard();
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec![
                "authors",
                "topics",
                "concepts",
                "institutions",
                "publishers",
                "sources",
                "works"
            ]
        );
    }

    #[test]
    fn select_keeps_catalog_order_and_drops_unknown() {
        let catalog = Catalog::standard();
        let picked = catalog.select(&["works".into(), "nope".into(), "authors".into()]);
        assert_eq!(picked.iter().map(|e| e.name).collect::<Vec<_>>(), vec!["authors", "works"]);
        assert_eq!(catalog.select(&[]).len(), 7);
    }

    #[test]
    fn table_names_are_unique_across_catalog() {
        let catalog = Catalog::standard();
        let mut names: Vec<_> = catalog
            .entities()
            .iter()
            .flat_map(|e| e.tables.iter().map(|t| t.table))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn column_names_are_unique_within_each_table() {
        for entity in Catalog::standard().entities() {
            for table in entity.tables {
                let mut names: Vec<_> = table.column_names().collect();
                names.sort_unstable();
                names.dedup();
                assert_eq!(names.len(), table.arity(), "duplicate column in {}", table.table);
            }
        }
    }

    #[test]
    fn every_entity_skips_records_without_string_id() {
        let rich = json!({
            "id": 17,
            "ids": {"openalex": "x"},
            "counts_by_year": [{"year": 2020}],
            "authorships": [{"author": {"id": "A"}}],
        });
        for entity in Catalog::standard().entities() {
            assert!(entity.flatten(&record(rich.clone())).is_empty(), "{}", entity.name);
            assert!(entity.flatten(&record(json!({}))).is_empty(), "{}", entity.name);
        }
    }

    #[test]
    fn every_row_matches_its_schema_and_leads_with_parent_id() {
        let record_value = json!({
            "id": "https://openalex.org/X1",
            "ids": {"openalex": "x", "mag": "123"},
            "counts_by_year": [{"year": 2021, "works_count": 1}],
            "ancestors": [{"id": "C1"}],
            "related_concepts": [{"id": "C2", "score": 0.5}],
            "associated_institutions": [{"id": "I2", "relationship": "parent"}],
            "geo": {"city": "Paris"},
            "primary_location": {"source": {"id": "S1"}},
            "locations": [{"source": {"id": "S1"}}],
            "best_oa_location": {"source": {"id": "S1"}},
            "authorships": [{"author": {"id": "A1"}, "institutions": [{"id": "I1"}]}],
            "biblio": {"volume": "1"},
            "topics": [{"id": "T1", "score": 0.9}],
            "concepts": [{"id": "C1", "score": 0.3}],
            "mesh": [{"descriptor_ui": "D1"}],
            "open_access": {"is_oa": true},
            "referenced_works": ["W2"],
            "related_works": ["W3"],
        });
        let record = record(record_value);
        for entity in Catalog::standard().entities() {
            let rows = entity.flatten(&record);
            assert!(!rows.is_empty(), "{}", entity.name);
            for row in &rows {
                assert_eq!(row.fields.len(), row.schema.arity(), "{}", row.table());
                assert!(entity.table(row.table()).is_some(), "{} not declared", row.table());
                assert_eq!(
                    cell(row, row.schema.columns[0].name).as_deref(),
                    Some("https://openalex.org/X1")
                );
            }
        }
    }
}
