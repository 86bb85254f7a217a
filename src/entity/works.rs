use super::EntityType;
use crate::record::{objects, strings, Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(WORKS = "works" {
    "id" => Text;
    "doi" => Text;
    "title" => Text;
    "display_name" => Text;
    "publication_year" => Integer;
    "publication_date" => Text;
    "type" => Text;
    "cited_by_count" => Integer;
    "is_retracted" => Boolean;
    "is_paratext" => Boolean;
    "cited_by_api_url" => Text;
    "abstract_inverted_index" => Json;
    "language" => Text;
});

row_schema!(WORKS_PRIMARY_LOCATIONS = "works_primary_locations" {
    "work_id" => Text;
    "source_id" => Text;
    "landing_page_url" => Text;
    "pdf_url" => Text;
    "is_oa" => Boolean;
    "version" => Text;
    "license" => Text;
});

row_schema!(WORKS_LOCATIONS = "works_locations" {
    "work_id" => Text;
    "source_id" => Text;
    "landing_page_url" => Text;
    "pdf_url" => Text;
    "is_oa" => Boolean;
    "version" => Text;
    "license" => Text;
});

row_schema!(WORKS_BEST_OA_LOCATIONS = "works_best_oa_locations" {
    "work_id" => Text;
    "source_id" => Text;
    "landing_page_url" => Text;
    "pdf_url" => Text;
    "is_oa" => Boolean;
    "version" => Text;
    "license" => Text;
});

row_schema!(WORKS_AUTHORSHIPS = "works_authorships" {
    "work_id" => Text;
    "author_position" => Text;
    "author_id" => Text;
    "institution_id" => Text;
    "raw_affiliation_string" => Text;
});

row_schema!(WORKS_BIBLIO = "works_biblio" {
    "work_id" => Text;
    "volume" => Text;
    "issue" => Text;
    "first_page" => Text;
    "last_page" => Text;
});

row_schema!(WORKS_TOPICS = "works_topics" {
    "work_id" => Text;
    "topic_id" => Text;
    "score" => Real;
});

row_schema!(WORKS_CONCEPTS = "works_concepts" {
    "work_id" => Text;
    "concept_id" => Text;
    "score" => Real;
});

row_schema!(WORKS_IDS = "works_ids" {
    "work_id" => Text;
    "openalex" => Text;
    "doi" => Text;
    "mag" => Bigint;
    "pmid" => Text;
    "pmcid" => Text;
});

row_schema!(WORKS_MESH = "works_mesh" {
    "work_id" => Text;
    "descriptor_ui" => Text;
    "descriptor_name" => Text;
    "qualifier_ui" => Text;
    "qualifier_name" => Text;
    "is_major_topic" => Boolean;
});

row_schema!(WORKS_OPEN_ACCESS = "works_open_access" {
    "work_id" => Text;
    "is_oa" => Boolean;
    "oa_status" => Text;
    "oa_url" => Text;
    "any_repository_has_fulltext" => Boolean;
});

row_schema!(WORKS_REFERENCED_WORKS = "works_referenced_works" {
    "work_id" => Text;
    "referenced_work_id" => Text;
});

row_schema!(WORKS_RELATED_WORKS = "works_related_works" {
    "work_id" => Text;
    "related_work_id" => Text;
});

pub static TABLES: [&RowSchema; 13] = [
    &WORKS,
    &WORKS_PRIMARY_LOCATIONS,
    &WORKS_LOCATIONS,
    &WORKS_BEST_OA_LOCATIONS,
    &WORKS_AUTHORSHIPS,
    &WORKS_BIBLIO,
    &WORKS_TOPICS,
    &WORKS_CONCEPTS,
    &WORKS_IDS,
    &WORKS_MESH,
    &WORKS_OPEN_ACCESS,
    &WORKS_REFERENCED_WORKS,
    &WORKS_RELATED_WORKS,
];

pub static ENTITY: EntityType = EntityType::new("works", &TABLES, flatten);

pub fn flatten(work: &Record) -> Vec<Row<'_>> {
    let Some(work_id) = work.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(64);

    rows.push(row!(WORKS;
        work_id,
        work.str_at("doi"),
        work.str_at("title"),
        work.str_at("display_name"),
        work.number_at("publication_year"),
        work.str_at("publication_date"),
        work.str_at("type"),
        work.number_at("cited_by_count"),
        work.bool_at("is_retracted"),
        work.bool_at("is_paratext"),
        work.str_at("cited_by_api_url"),
        Field::json(work.json_at("abstract_inverted_index")),
        work.str_at("language"),
    ));

    if let Some(location) = work.object_at("primary_location") {
        rows.extend(location_row(&WORKS_PRIMARY_LOCATIONS, work_id, location));
    }
    if let Some(locations) = work.array_at("locations") {
        for location in objects(locations) {
            rows.extend(location_row(&WORKS_LOCATIONS, work_id, location));
        }
    }
    if let Some(location) = work.object_at("best_oa_location") {
        rows.extend(location_row(&WORKS_BEST_OA_LOCATIONS, work_id, location));
    }

    if let Some(authorships) = work.array_at("authorships") {
        for authorship in objects(authorships) {
            push_authorship(&mut rows, work_id, authorship);
        }
    }

    if let Some(biblio) = work.object_at("biblio") {
        rows.push(row!(WORKS_BIBLIO;
            work_id,
            biblio.str_at("volume"),
            biblio.str_at("issue"),
            biblio.str_at("first_page"),
            biblio.str_at("last_page"),
        ));
    }

    if let Some(topics) = work.array_at("topics") {
        for topic in objects(topics) {
            if let Some(topic_id) = topic.str_at("id") {
                rows.push(row!(WORKS_TOPICS; work_id, topic_id, topic.number_at("score")));
            }
        }
    }

    if let Some(concepts) = work.array_at("concepts") {
        for concept in objects(concepts) {
            rows.push(row!(WORKS_CONCEPTS;
                work_id,
                concept.str_at("id"),
                concept.number_at("score"),
            ));
        }
    }

    if let Some(ids) = work.object_at("ids") {
        rows.push(row!(WORKS_IDS;
            work_id,
            ids.str_at("openalex"),
            ids.str_at("doi"),
            ids.bigint_at("mag"),
            ids.str_at("pmid"),
            ids.str_at("pmcid"),
        ));
    }

    if let Some(mesh) = work.array_at("mesh") {
        for heading in objects(mesh) {
            rows.push(row!(WORKS_MESH;
                work_id,
                heading.str_at("descriptor_ui"),
                heading.str_at("descriptor_name"),
                heading.str_at("qualifier_ui"),
                heading.str_at("qualifier_name"),
                heading.bool_at("is_major_topic"),
            ));
        }
    }

    if let Some(open_access) = work.object_at("open_access") {
        rows.push(row!(WORKS_OPEN_ACCESS;
            work_id,
            open_access.bool_at("is_oa"),
            open_access.str_at("oa_status"),
            open_access.str_at("oa_url"),
            open_access.bool_at("any_repository_has_fulltext"),
        ));
    }

    if let Some(referenced) = work.array_at("referenced_works") {
        for referenced_id in strings(referenced) {
            rows.push(row!(WORKS_REFERENCED_WORKS; work_id, referenced_id));
        }
    }

    if let Some(related) = work.array_at("related_works") {
        for related_id in strings(related) {
            rows.push(row!(WORKS_RELATED_WORKS; work_id, related_id));
        }
    }

    rows
}

/// Location rows are keyed by the hosting source; locations without one are dropped.
fn location_row<'a>(
    schema: &'static RowSchema,
    work_id: &'a str,
    location: &'a Record,
) -> Option<Row<'a>> {
    let source_id = location.str_path(&["source", "id"])?;
    Some(row!(*schema;
        work_id,
        source_id,
        location.str_at("landing_page_url"),
        location.str_at("pdf_url"),
        location.bool_at("is_oa"),
        location.str_at("version"),
        location.str_at("license"),
    ))
}

/// One row per institution id of the authorship, or a single row with a null
/// institution when none is usable.
fn push_authorship<'a>(rows: &mut Vec<Row<'a>>, work_id: &'a str, authorship: &'a Record) {
    let Some(author_id) = authorship.str_path(&["author", "id"]) else {
        return;
    };

    let mut institution_ids: Vec<Option<&str>> = authorship
        .array_at("institutions")
        .map(|institutions| {
            objects(institutions)
                .filter_map(|i| i.str_at("id"))
                .map(Some)
                .collect()
        })
        .unwrap_or_default();
    if institution_ids.is_empty() {
        institution_ids.push(None);
    }

    let position = authorship.str_at("author_position");
    let raw_affiliation = authorship.str_at("raw_affiliation_string");
    for institution_id in institution_ids {
        rows.push(row!(WORKS_AUTHORSHIPS;
            work_id,
            position,
            author_id,
            institution_id,
            raw_affiliation,
        ));
    }
}
