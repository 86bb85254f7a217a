use super::{push_counts_by_year, EntityType};
use crate::record::{objects, Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(CONCEPTS = "concepts" {
    "id" => Text;
    "wikidata" => Text;
    "display_name" => Text;
    "level" => Integer;
    "description" => Text;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "image_url" => Text;
    "image_thumbnail_url" => Text;
    "works_api_url" => Text;
    "updated_date" => Timestamp;
});

row_schema!(CONCEPTS_ANCESTORS = "concepts_ancestors" {
    "concept_id" => Text;
    "ancestor_id" => Text;
});

row_schema!(CONCEPTS_COUNTS_BY_YEAR = "concepts_counts_by_year" {
    "concept_id" => Text;
    "year" => Integer;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "oa_works_count" => Integer;
});

row_schema!(CONCEPTS_IDS = "concepts_ids" {
    "concept_id" => Text;
    "openalex" => Text;
    "wikidata" => Text;
    "wikipedia" => Text;
    "umls_aui" => Json;
    "umls_cui" => Json;
    "mag" => Bigint;
});

row_schema!(CONCEPTS_RELATED_CONCEPTS = "concepts_related_concepts" {
    "concept_id" => Text;
    "related_concept_id" => Text;
    "score" => Real;
});

pub static TABLES: [&RowSchema; 5] = [
    &CONCEPTS,
    &CONCEPTS_ANCESTORS,
    &CONCEPTS_COUNTS_BY_YEAR,
    &CONCEPTS_IDS,
    &CONCEPTS_RELATED_CONCEPTS,
];

pub static ENTITY: EntityType = EntityType::new("concepts", &TABLES, flatten);

pub fn flatten(concept: &Record) -> Vec<Row<'_>> {
    let Some(concept_id) = concept.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(32);

    rows.push(row!(CONCEPTS;
        concept_id,
        concept.str_at("wikidata"),
        concept.str_at("display_name"),
        concept.number_at("level"),
        concept.str_at("description"),
        concept.number_at("works_count"),
        concept.number_at("cited_by_count"),
        concept.str_at("image_url"),
        concept.str_at("image_thumbnail_url"),
        concept.str_at("works_api_url"),
        concept.str_at("updated_date"),
    ));

    if let Some(ids) = concept.object_at("ids") {
        rows.push(row!(CONCEPTS_IDS;
            concept_id,
            ids.str_at("openalex"),
            ids.str_at("wikidata"),
            ids.str_at("wikipedia"),
            Field::json(ids.json_at("umls_aui")),
            Field::json(ids.json_at("umls_cui")),
            ids.bigint_at("mag"),
        ));
    }

    if let Some(ancestors) = concept.array_at("ancestors") {
        for ancestor_id in objects(ancestors).filter_map(|a| a.str_at("id")) {
            rows.push(row!(CONCEPTS_ANCESTORS; concept_id, ancestor_id));
        }
    }

    push_counts_by_year(&mut rows, &CONCEPTS_COUNTS_BY_YEAR, concept_id, concept);

    if let Some(related) = concept.array_at("related_concepts") {
        for related_concept in objects(related) {
            let Some(related_id) = related_concept.str_at("id") else {
                continue;
            };
            rows.push(row!(CONCEPTS_RELATED_CONCEPTS;
                concept_id,
                related_id,
                related_concept.number_at("score"),
            ));
        }
    }

    rows
}
