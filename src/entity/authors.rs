use super::{push_counts_by_year, EntityType};
use crate::record::{Record, RecordExt};
use crate::row::{Field, Row};
use crate::schema::RowSchema;
use crate::{row, row_schema};

row_schema!(AUTHORS = "authors" {
    "id" => Text;
    "orcid" => Text;
    "display_name" => Text;
    "display_name_alternatives" => Json;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "last_known_institution" => Text;
    "works_api_url" => Text;
    "updated_date" => Timestamp;
});

row_schema!(AUTHORS_COUNTS_BY_YEAR = "authors_counts_by_year" {
    "author_id" => Text;
    "year" => Integer;
    "works_count" => Integer;
    "cited_by_count" => Integer;
    "oa_works_count" => Integer;
});

row_schema!(AUTHORS_IDS = "authors_ids" {
    "author_id" => Text;
    "openalex" => Text;
    "orcid" => Text;
    "scopus" => Text;
    "twitter" => Text;
    "wikipedia" => Text;
    "mag" => Bigint;
});

pub static TABLES: [&RowSchema; 3] = [&AUTHORS, &AUTHORS_COUNTS_BY_YEAR, &AUTHORS_IDS];

pub static ENTITY: EntityType = EntityType::new("authors", &TABLES, flatten);

pub fn flatten(author: &Record) -> Vec<Row<'_>> {
    let Some(author_id) = author.str_at("id") else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(16);

    rows.push(row!(AUTHORS;
        author_id,
        author.str_at("orcid"),
        author.str_at("display_name"),
        Field::json(author.json_at("display_name_alternatives")),
        author.number_at("works_count"),
        author.number_at("cited_by_count"),
        author.str_path(&["last_known_institution", "id"]),
        author.str_at("works_api_url"),
        author.str_at("updated_date"),
    ));

    if let Some(ids) = author.object_at("ids") {
        rows.push(row!(AUTHORS_IDS;
            author_id,
            ids.str_at("openalex"),
            ids.str_at("orcid"),
            ids.str_at("scopus"),
            ids.str_at("twitter"),
            ids.str_at("wikipedia"),
            ids.bigint_at("mag"),
        ));
    }

    push_counts_by_year(&mut rows, &AUTHORS_COUNTS_BY_YEAR, author_id, author);

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_support::{cell, record, rows_for};
    use serde_json::json;

    #[test]
    fn minimal_author_with_counts() {
        let author = record(json!({
            "id": "A1",
            "orcid": "0000-1",
            "counts_by_year": [{"year": 2020, "works_count": 5}],
        }));
        let rows = flatten(&author);

        let main = rows_for(&rows, "authors");
        assert_eq!(main.len(), 1);
        assert_eq!(cell(main[0], "id").as_deref(), Some("A1"));
        assert_eq!(cell(main[0], "orcid").as_deref(), Some("0000-1"));
        for column in ["display_name", "display_name_alternatives", "works_count", "updated_date"] {
            assert_eq!(cell(main[0], column), None, "{column}");
        }

        let counts = rows_for(&rows, "authors_counts_by_year");
        assert_eq!(counts.len(), 1);
        let values: Vec<_> = AUTHORS_COUNTS_BY_YEAR
            .column_names()
            .map(|c| cell(counts[0], c))
            .collect();
        assert_eq!(
            values,
            vec![Some("A1".into()), Some("2020".into()), Some("5".into()), None, None]
        );

        assert!(rows_for(&rows, "authors_ids").is_empty());
    }

    #[test]
    fn nested_objects_and_passthrough() {
        let author = record(json!({
            "id": "A2",
            "display_name": "Ada",
            "display_name_alternatives": ["A. L.", "Ada L."],
            "works_count": 12,
            "last_known_institution": {"id": "I9", "display_name": "X"},
            "ids": {"openalex": "A2", "orcid": "o", "mag": "2208157607", "scopus": 5},
        }));
        let rows = flatten(&author);

        let main = rows_for(&rows, "authors");
        assert_eq!(
            cell(main[0], "display_name_alternatives").as_deref(),
            Some(r#"["A. L.","Ada L."]"#)
        );
        assert_eq!(cell(main[0], "last_known_institution").as_deref(), Some("I9"));
        assert_eq!(cell(main[0], "works_count").as_deref(), Some("12"));

        let ids = rows_for(&rows, "authors_ids");
        assert_eq!(ids.len(), 1);
        assert_eq!(cell(ids[0], "mag").as_deref(), Some("2208157607"));
        // A number where text is expected degrades to null.
        assert_eq!(cell(ids[0], "scopus"), None);
    }

    #[test]
    fn malformed_children_are_skipped_individually() {
        let author = record(json!({
            "id": "A3",
            "ids": "not-an-object",
            "last_known_institution": "I1",
            "counts_by_year": [
                {"year": 2019, "works_count": 1},
                "garbage",
                {"works_count": 3},
                {"year": 2021, "oa_works_count": 2},
            ],
        }));
        let rows = flatten(&author);

        assert!(rows_for(&rows, "authors_ids").is_empty());
        assert_eq!(cell(rows_for(&rows, "authors")[0], "last_known_institution"), None);
        let years: Vec<_> = rows_for(&rows, "authors_counts_by_year")
            .iter()
            .map(|r| cell(r, "year"))
            .collect();
        assert_eq!(years, vec![Some("2019".into()), Some("2021".into())]);
    }

    #[test]
    fn flattening_is_deterministic() {
        let author = record(json!({
            "id": "A4",
            "display_name_alternatives": {"b": 1, "a": [true, null]},
            "counts_by_year": [{"year": 2020}, {"year": 2021}],
        }));
        assert_eq!(flatten(&author), flatten(&author));
    }
}
