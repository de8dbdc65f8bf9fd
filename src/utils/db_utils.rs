use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

/// A JSON value converted to something sqlx can bind.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(key: &str, value: &Value) -> Result<SqlValue, actix_web::Error> {
    Ok(match value {
        Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => SqlValue::Date(d),
            Err(_) => SqlValue::String(s.clone()),
        },
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::I64(i),
            None => SqlValue::F64(
                n.as_f64()
                    .ok_or_else(|| ErrorBadRequest(format!("Invalid number for {key}")))?,
            ),
        },
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(ErrorBadRequest(format!("Unsupported value for {key}"))),
    })
}

/// Builds `UPDATE table SET a = ?, b = ? WHERE id = ?` from a partial JSON
/// object. Only columns listed in `allowed` may be set; column names never
/// come from the request.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&'static str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = allowed
            .iter()
            .find(|c| **c == key.as_str())
            .ok_or_else(|| ErrorBadRequest(format!("Field {key} cannot be updated")))?;
        columns.push(format!("{column} = ?"));
        values.push(to_sql_value(key, value)?);
    }

    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate {
        sql: format!("UPDATE {table} SET {} WHERE {id_column} = ?", columns.join(", ")),
        values,
    })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["first_name", "hire_date", "base_salary", "phone"];

    #[test]
    fn builds_update_for_allowed_columns() {
        let update = build_update_sql(
            "employees",
            &json!({"base_salary": 31000.5, "first_name": "Meera", "hire_date": "2022-06-01", "phone": null}),
            COLUMNS,
            "id",
            7,
        )
        .unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.values.len(), 5);
        assert!(update.values.contains(&SqlValue::F64(31000.5)));
        assert!(update.values.contains(&SqlValue::Date(NaiveDate::from_ymd_opt(2022, 6, 1).unwrap())));
        assert!(update.values.contains(&SqlValue::Null));
        assert_eq!(update.values.last(), Some(&SqlValue::I64(7)));
    }

    #[test]
    fn rejects_unknown_columns_and_empty_payloads() {
        assert!(build_update_sql("employees", &json!({"id": 1}), COLUMNS, "id", 7).is_err());
        assert!(build_update_sql("employees", &json!({"x = 1; --": 1}), COLUMNS, "id", 7).is_err());
        assert!(build_update_sql("employees", &json!({}), COLUMNS, "id", 7).is_err());
        assert!(build_update_sql("employees", &json!([1]), COLUMNS, "id", 7).is_err());
    }
}
