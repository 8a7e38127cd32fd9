//! Driver rows as plain JSON maps.
//!
//! Repositories decode every query result through [`iter_rows`], so record
//! types deserialize from one uniform shape whatever storage class `SQLite`
//! picked for a value.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::domain::errors::DomainResult;

/// Column name to value.
pub type RowMap = Map<String, Value>;

/// Lazily convert `rows` to [`RowMap`]s. Calling again restarts from the first row.
pub fn iter_rows(rows: &[SqliteRow]) -> impl Iterator<Item = DomainResult<RowMap>> + '_ {
    rows.iter().map(row_to_map)
}

pub fn row_to_map(row: &SqliteRow) -> DomainResult<RowMap> {
    let mut map = RowMap::new();
    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn column_value(row: &SqliteRow, index: usize, declared: &str) -> DomainResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    // The storage class of the value decides how to read it; the declared
    // column type only distinguishes booleans from integers.
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => {
            let n: i64 = row.try_get_unchecked(index)?;
            if declared.eq_ignore_ascii_case("BOOLEAN") {
                Value::Bool(n != 0)
            } else {
                Value::from(n)
            }
        }
        "REAL" | "NUMERIC" => Value::from(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// Deserialize a record from a row map.
pub fn decode<R: DeserializeOwned>(map: RowMap) -> DomainResult<R> {
    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Replace a JSON-text column with the array it encodes.
pub fn expand_json_column(map: &mut RowMap, column: &str) -> DomainResult<()> {
    if let Some(Value::String(text)) = map.get(column) {
        let parsed: Value = if text.trim().is_empty() {
            Value::Array(Vec::new())
        } else {
            serde_json::from_str(text)?
        };
        map.insert(column.to_string(), parsed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;

    #[tokio::test]
    async fn test_rows_become_maps() {
        let pool = create_test_pool().await.unwrap();
        sqlx::query("CREATE TABLE t (id TEXT, flag BOOLEAN, n INTEGER, x REAL, note TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t VALUES ('a', 1, 7, 0.5, NULL), ('b', 0, -2, 2.0, 'hi')")
            .execute(&pool)
            .await
            .unwrap();

        let rows = sqlx::query("SELECT * FROM t ORDER BY id").fetch_all(&pool).await.unwrap();
        let maps: Vec<RowMap> = iter_rows(&rows).collect::<DomainResult<_>>().unwrap();

        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0]["id"], "a");
        assert_eq!(maps[0]["flag"], true);
        assert_eq!(maps[0]["n"], 7);
        assert_eq!(maps[0]["x"], 0.5);
        assert_eq!(maps[0]["note"], Value::Null);
        assert_eq!(maps[1]["flag"], false);
        assert_eq!(maps[1]["note"], "hi");

        // Restartable: a second pass yields the same rows.
        assert_eq!(iter_rows(&rows).count(), 2);
    }

    #[tokio::test]
    async fn test_expressions_without_declared_type() {
        let pool = create_test_pool().await.unwrap();
        let rows = sqlx::query("SELECT COUNT(*) AS n, 'x' AS s FROM (SELECT 1 WHERE 0)")
            .fetch_all(&pool)
            .await
            .unwrap();
        let map = iter_rows(&rows).next().unwrap().unwrap();
        assert_eq!(map["n"], 0);
        assert_eq!(map["s"], "x");
    }

    #[test]
    fn test_expand_json_column() {
        let mut map = RowMap::new();
        map.insert("ids".to_string(), Value::from(r#"["a","b"]"#));
        map.insert("empty".to_string(), Value::from(""));
        expand_json_column(&mut map, "ids").unwrap();
        expand_json_column(&mut map, "empty").unwrap();
        assert_eq!(map["ids"], serde_json::json!(["a", "b"]));
        assert_eq!(map["empty"], serde_json::json!([]));
    }
}
