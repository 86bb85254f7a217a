use super::{push_counts_by_year, EntityType};
use crate::record::{Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(SOURCES = "sources" {
    "id" => Text;
    "issn_l" => Text;
    "issn" => Json;
    "display_name" => Text;
    "publisher" => Text;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "is_oa" => Boolean;
    "is_in_doaj" => Boolean;
    "homepage_url" => Text;
    "works_api_url" => Text;
    "updated_date" => Timestamp;
});

row_schema!(SOURCES_COUNTS_BY_YEAR = "sources_counts_by_year" {
    "source_id" => Text;
    "year" => Integer;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "oa_works_count" => Integer;
});

row_schema!(SOURCES_IDS = "sources_ids" {
    "source_id" => Text;
    "openalex" => Text;
    "issn_l" => Text;
    "issn" => Json;
    "mag" => Bigint;
    "wikidata" => Text;
    "fatcat" => Text;
});

pub static TABLES: [&RowSchema; 3] = [&SOURCES, &SOURCES_COUNTS_BY_YEAR, &SOURCES_IDS];

pub static ENTITY: EntityType = EntityType::new("sources", &TABLES, flatten);

pub fn flatten(source: &Record) -> Vec<Row<'_>> {
    let Some(source_id) = source.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(16);

    rows.push(row!(SOURCES;
        source_id,
        source.str_at("issn_l"),
        Field::json(source.json_at("issn")),
        source.str_at("display_name"),
        source.str_at("publisher"),
        source.number_at("works_count"),
        source.number_at("cited_by_count"),
        source.bool_at("is_oa"),
        source.bool_at("is_in_doaj"),
        source.str_at("homepage_url"),
        source.str_at("works_api_url"),
        source.str_at("updated_date"),
    ));

    if let Some(ids) = source.object_at("ids") {
        rows.push(row!(SOURCES_IDS;
            source_id,
            ids.str_at("openalex"),
            ids.str_at("issn_l"),
            Field::json(ids.json_at("issn")),
            ids.bigint_at("mag"),
            ids.str_at("wikidata"),
            ids.str_at("fatcat"),
        ));
    }

    push_counts_by_year(&mut rows, &SOURCES_COUNTS_BY_YEAR, source_id, source);

    rows
}
