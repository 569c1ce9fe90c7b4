use pagesight_core::filter::{Condition, Predicate};

/// A predicate rendered to SQL: `AND`-prefixed clauses plus the owned
/// parameter values, numbered from `first_index`.
pub(crate) struct SqlPredicate {
    pub clauses: String,
    pub params: Vec<Box<dyn duckdb::types::ToSql>>,
}

/// Render compiled filter conditions to parameterized WHERE clauses.
///
/// `column_prefix` qualifies event columns in joined queries (`"e."`);
/// pass `""` for single-table queries. Values always travel as bind
/// parameters, never interpolated into the SQL text.
pub(crate) fn render(predicate: &Predicate, first_index: usize, column_prefix: &str) -> SqlPredicate {
    let mut clauses = String::new();
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = first_index;

    for condition in predicate.conditions() {
        match condition {
            Condition::ReferrerIsNull => {
                clauses.push_str(&format!(" AND {column_prefix}referrer IS NULL"));
            }
            Condition::ReferrerStartsWith(value) => {
                clauses.push_str(&format!(" AND {column_prefix}referrer LIKE ?{idx}"));
                params.push(Box::new(format!("{value}%")));
                idx += 1;
            }
            Condition::HrefEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}href = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::CountryEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}country = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::RegionEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}region = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::CityEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}city = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::BrowserEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}browser = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::OsEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}os = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::DeviceEquals(value) => {
                clauses.push_str(&format!(" AND {column_prefix}device = ?{idx}"));
                params.push(Box::new(value.clone()));
                idx += 1;
            }
            Condition::ExcludeBots => {
                clauses.push_str(&format!(" AND {column_prefix}bot = FALSE"));
            }
        }
    }

    SqlPredicate { clauses, params }
}
