use serde_json::Value;

use crate::collections::CollectionDescriptor;

/// Latest stored date to cut the next fetch at, or `None` for no cutoff.
///
/// Either side may be a single row or an array sorted newest first, in which
/// case the first row is used. The stored date is returned only when it is
/// strictly earlier than the fetched one; a missing or non-integer date on
/// either side means no cutoff.
pub fn resolve_fetch_cutoff(date_field: &str, stored: &Value, fetched: &Value) -> Option<i64> {
    let stored = newest_date(date_field, stored)?;
    let fetched = newest_date(date_field, fetched)?;
    (stored < fetched).then_some(stored)
}

/// [`resolve_fetch_cutoff`] on the collection's date field.
pub fn cutoff_for_collection(
    descriptor: &CollectionDescriptor,
    stored: &Value,
    fetched: &Value,
) -> Option<i64> {
    let field = descriptor.date_field_name.as_deref()?;
    resolve_fetch_cutoff(field, stored, fetched)
}

fn newest_date(field: &str, value: &Value) -> Option<i64> {
    let row = match value {
        Value::Array(rows) => rows.first()?,
        row => row,
    };
    row.get(field)?.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn earlier_stored_date_is_the_cutoff() {
        assert_eq!(resolve_fetch_cutoff("mts", &json!({"mts": 100}), &json!({"mts": 150})), Some(100));
        assert_eq!(resolve_fetch_cutoff("mts", &json!({"mts": 150}), &json!({"mts": 100})), None);
        assert_eq!(resolve_fetch_cutoff("mts", &json!({"mts": 100}), &json!({"mts": 100})), None);
    }

    #[test]
    fn arrays_use_their_first_row() {
        let stored = json!([{"mts": 90}, {"mts": 10}]);
        let fetched = json!([{"mts": 120}, {"mts": 95}]);
        assert_eq!(resolve_fetch_cutoff("mts", &stored, &fetched), Some(90));
        assert_eq!(resolve_fetch_cutoff("mts", &json!([]), &fetched), None);
    }

    #[test]
    fn missing_or_non_integer_dates_mean_no_cutoff() {
        assert_eq!(resolve_fetch_cutoff("mts", &json!({}), &json!({"mts": 1})), None);
        assert_eq!(resolve_fetch_cutoff("mts", &json!({"mts": "1"}), &json!({"mts": 2})), None);
        assert_eq!(resolve_fetch_cutoff("mts", &Value::Null, &json!({"mts": 2})), None);
    }
}
