use super::EntityType;
use crate::record::{strings, Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

const KEYWORD_SEPARATOR: &str = "; ";

row_schema!(TOPICS = "topics" {
    "id" => Text;
    "display_name" => Text;
    "subfield_id" => Text;
    "subfield_display_name" => Text;
    "field_id" => Text;
    "field_display_name" => Text;
    "domain_id" => Text;
    "domain_display_name" => Text;
    "description" => Text;
    "keywords" => Text;
    "works_api_url" => Text;
    "wikipedia_id" => Text;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "updated_date" => Timestamp;
    "siblings" => Json;
});

pub static TABLES: [&RowSchema; 1] = [&TOPICS];

pub static ENTITY: EntityType = EntityType::new("topics", &TABLES, flatten);

pub fn flatten(topic: &Record) -> Vec<Row<'_>> {
    let Some(topic_id) = topic.str_at("id") else {
        return Vec::new();
    };

    let keywords = topic
        .array_at("keywords")
        .map(|items| strings(items).collect::<Vec<_>>().join(KEYWORD_SEPARATOR));

    // Newer snapshots carry `updated: {date}`; older ones a flat `updated_date`.
    // Any `updated` without a string `date` defers to the flat field.
    let updated_date = topic
        .str_path(&["updated", "date"])
        .or_else(|| topic.str_at("updated_date"));

    vec![row!(TOPICS;
        topic_id,
        topic.str_at("display_name"),
        topic.str_path(&["subfield", "id"]),
        topic.str_path(&["subfield", "display_name"]),
        topic.str_path(&["field", "id"]),
        topic.str_path(&["field", "display_name"]),
        topic.str_path(&["domain", "id"]),
        topic.str_path(&["domain", "display_name"]),
        topic.str_at("description"),
        keywords,
        topic.str_at("works_api_url"),
        topic.str_path(&["ids", "wikipedia"]),
        topic.number_at("works_count"),
        topic.number_at("cited_by_count"),
        updated_date,
        Field::json(topic.json_at("siblings")),
    )]
}
