use std::borrow::Cow;

use serde_json::{Number, Value};

use crate::schema::RowSchema;

/// One cell of an output row. Borrows from the record it was extracted from.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'a> {
    Null,
    Text(Cow<'a, str>),
    Number(Number),
    Bool(bool),
    /// Opaque substructure, written out as JSON text.
    Json(&'a Value),
}

impl<'a> Field<'a> {
    pub fn json(value: Option<&'a Value>) -> Self {
        value.map_or(Field::Null, Field::Json)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}

impl<'a> From<&'a str> for Field<'a> {
    fn from(value: &'a str) -> Self {
        Field::Text(Cow::Borrowed(value))
    }
}

impl<'a> From<Option<&'a str>> for Field<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Field::Null, Field::from)
    }
}

impl<'a> From<Option<String>> for Field<'a> {
    fn from(value: Option<String>) -> Self {
        value.map_or(Field::Null, |s| Field::Text(Cow::Owned(s)))
    }
}

impl<'a> From<Option<&'a Number>> for Field<'a> {
    fn from(value: Option<&'a Number>) -> Self {
        value.map_or(Field::Null, |n| Field::Number(n.clone()))
    }
}

impl<'a> From<Option<Number>> for Field<'a> {
    fn from(value: Option<Number>) -> Self {
        value.map_or(Field::Null, Field::Number)
    }
}

impl<'a> From<Option<bool>> for Field<'a> {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Field::Null, Field::Bool)
    }
}

/// A flattened row bound to the table it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    pub schema: &'static RowSchema,
    pub fields: Vec<Field<'a>>,
}

impl<'a> Row<'a> {
    pub fn new(schema: &'static RowSchema, fields: Vec<Field<'a>>) -> Self {
        debug_assert_eq!(
            fields.len(),
            schema.arity(),
            "row arity mismatch for {}",
            schema.table
        );
        Self { schema, fields }
    }

    pub fn table(&self) -> &'static str {
        self.schema.table
    }

    /// Cell by column name, mostly useful in tests.
    pub fn get(&self, column: &str) -> Option<&Field<'a>> {
        self.schema
            .columns
            .iter()
            .position(|c| c.name == column)
            .and_then(|i| self.fields.get(i))
    }
}

/// Builds a `Row` for `$schema`, converting each value with `Field::from`.
#[macro_export]
macro_rules! row {
    ($schema:expr; $($value:expr),* $(,)?) => {
        $crate::row::Row::new(&$schema, vec![$($crate::row::Field::from($value),)*])
    };
}
