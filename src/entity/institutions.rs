use super::{push_counts_by_year, EntityType};
use crate::record::{objects, Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(INSTITUTIONS = "institutions" {
    "id" => Text;
    "ror" => Text;
    "display_name" => Text;
    "country_code" => Text;
    "type" => Text;
    "homepage_url" => Text;
    "image_url" => Text;
    "image_thumbnail_url" => Text;
    "display_name_acronyms" => Json;
    "display_name_alternatives" => Json;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "works_api_url" => Text;
    "updated_date" => Timestamp;
});

row_schema!(INSTITUTIONS_ASSOCIATED_INSTITUTIONS = "institutions_associated_institutions" {
    "institution_id" => Text;
    "associated_institution_id" => Text;
    "relationship" => Text;
});

row_schema!(INSTITUTIONS_COUNTS_BY_YEAR = "institutions_counts_by_year" {
    "institution_id" => Text;
    "year" => Integer;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "oa_works_count" => Integer;
});

row_schema!(INSTITUTIONS_GEO = "institutions_geo" {
    "institution_id" => Text;
    "city" => Text;
    "geonames_city_id" => Text;
    "region" => Text;
    "country_code" => Text;
    "country" => Text;
    "latitude" => Real;
    "longitude" => Real;
});

row_schema!(INSTITUTIONS_IDS = "institutions_ids" {
    "institution_id" => Text;
    "openalex" => Text;
    "ror" => Text;
    "grid" => Text;
    "wikipedia" => Text;
    "wikidata" => Text;
    "mag" => Bigint;
});

pub static TABLES: [&RowSchema; 5] = [
    &INSTITUTIONS,
    &INSTITUTIONS_ASSOCIATED_INSTITUTIONS,
    &INSTITUTIONS_COUNTS_BY_YEAR,
    &INSTITUTIONS_GEO,
    &INSTITUTIONS_IDS,
];

pub static ENTITY: EntityType = EntityType::new("institutions", &TABLES, flatten);

pub fn flatten(institution: &Record) -> Vec<Row<'_>> {
    let Some(institution_id) = institution.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(24);

    rows.push(row!(INSTITUTIONS;
        institution_id,
        institution.str_at("ror"),
        institution.str_at("display_name"),
        institution.str_at("country_code"),
        institution.str_at("type"),
        institution.str_at("homepage_url"),
        institution.str_at("image_url"),
        institution.str_at("image_thumbnail_url"),
        Field::json(institution.json_at("display_name_acronyms")),
        Field::json(institution.json_at("display_name_alternatives")),
        institution.number_at("works_count"),
        institution.number_at("cited_by_count"),
        institution.str_at("works_api_url"),
        institution.str_at("updated_date"),
    ));

    if let Some(ids) = institution.object_at("ids") {
        rows.push(row!(INSTITUTIONS_IDS;
            institution_id,
            ids.str_at("openalex"),
            ids.str_at("ror"),
            ids.str_at("grid"),
            ids.str_at("wikipedia"),
            ids.str_at("wikidata"),
            ids.bigint_at("mag"),
        ));
    }

    if let Some(geo) = institution.object_at("geo") {
        rows.push(row!(INSTITUTIONS_GEO;
            institution_id,
            geo.str_at("city"),
            geo.str_at("geonames_city_id"),
            geo.str_at("region"),
            geo.str_at("country_code"),
            geo.str_at("country"),
            geo.number_at("latitude"),
            geo.number_at("longitude"),
        ));
    }

    if let Some(associated) = institution.array_at("associated_institutions") {
        for other in objects(associated) {
            let Some(other_id) = other.str_at("id") else {
                continue;
            };
            rows.push(row!(INSTITUTIONS_ASSOCIATED_INSTITUTIONS;
                institution_id,
                other_id,
                other.str_at("relationship"),
            ));
        }
    }

    push_counts_by_year(&mut rows, &INSTITUTIONS_COUNTS_BY_YEAR, institution_id, institution);

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_support::{cell, record, rows_for};
    use serde_json::json;

    #[test]
    fn geo_and_associations() {
        let institution = record(json!({
            "id": "I1",
            "type": "education",
            "display_name_acronyms": ["MIT"],
            "geo": {
                "city": "Cambridge",
                "geonames_city_id": "4931972",
                "latitude": 42.36,
                "longitude": "-71.09",
            },
            "associated_institutions": [
                {"id": "I2", "relationship": "child"},
                {"relationship": "parent"},
                {"id": "I3"},
            ],
        }));
        let rows = flatten(&institution);

        let main = rows_for(&rows, "institutions");
        assert_eq!(cell(main[0], "type").as_deref(), Some("education"));
        assert_eq!(cell(main[0], "display_name_acronyms").as_deref(), Some(r#"["MIT"]"#));
        assert_eq!(cell(main[0], "display_name_alternatives"), None);

        let geo = rows_for(&rows, "institutions_geo");
        assert_eq!(geo.len(), 1);
        assert_eq!(cell(geo[0], "latitude").as_deref(), Some("42.36"));
        // Coordinates given as strings are not coerced.
        assert_eq!(cell(geo[0], "longitude"), None);

        let associated = rows_for(&rows, "institutions_associated_institutions");
        assert_eq!(associated.len(), 2);
        assert_eq!(cell(associated[0], "relationship").as_deref(), Some("child"));
        assert_eq!(cell(associated[1], "associated_institution_id").as_deref(), Some("I3"));
        assert_eq!(cell(associated[1], "relationship"), None);
    }

    #[test]
    fn geo_must_be_an_object() {
        let institution = record(json!({"id": "I1", "geo": null, "ids": []}));
        let rows = flatten(&institution);
        assert!(rows_for(&rows, "institutions_geo").is_empty());
        assert!(rows_for(&rows, "institutions_ids").is_empty());
        assert_eq!(rows.len(), 1);
    }
}
