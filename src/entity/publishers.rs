use super::{push_counts_by_year, EntityType};
use crate::record::{Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(PUBLISHERS = "publishers" {
    "id" => Text;
    "display_name" => Text;
    "alternate_titles" => Json;
    "country_codes" => Json;
    "hierarchy_level" => Integer;
    "parent_publisher" => Text;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "sources_api_url" => Text;
    "updated_date" => Timestamp;
});

row_schema!(PUBLISHERS_COUNTS_BY_YEAR = "publishers_counts_by_year" {
    "publisher_id" => Text;
    "year" => Integer;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "oa_works_count" => Integer;
});

row_schema!(PUBLISHERS_IDS = "publishers_ids" {
    "publisher_id" => Text;
    "openalex" => Text;
    "ror" => Text;
    "wikidata" => Text;
});

pub static TABLES: [&RowSchema; 3] = [&PUBLISHERS, &PUBLISHERS_COUNTS_BY_YEAR, &PUBLISHERS_IDS];

pub static ENTITY: EntityType = EntityType::new("publishers", &TABLES, flatten);

pub fn flatten(publisher: &Record) -> Vec<Row<'_>> {
    let Some(publisher_id) = publisher.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(16);

    // `parent_publisher` is a plain id in older snapshots and an object later.
    let parent_publisher = publisher
        .str_at("parent_publisher")
        .or_else(|| publisher.str_path(&["parent_publisher", "id"]));

    rows.push(row!(PUBLISHERS;
        publisher_id,
        publisher.str_at("display_name"),
        Field::json(publisher.json_at("alternate_titles")),
        Field::json(publisher.json_at("country_codes")),
        publisher.number_at("hierarchy_level"),
        parent_publisher,
        publisher.number_at("works_count"),
        publisher.number_at("cited_by_count"),
        publisher.str_at("sources_api_url"),
        publisher.str_at("updated_date"),
    ));

    if let Some(ids) = publisher.object_at("ids") {
        rows.push(row!(PUBLISHERS_IDS;
            publisher_id,
            ids.str_at("openalex"),
            ids.str_at("ror"),
            ids.str_at("wikidata"),
        ));
    }

    push_counts_by_year(&mut rows, &PUBLISHERS_COUNTS_BY_YEAR, publisher_id, publisher);

    rows
}
