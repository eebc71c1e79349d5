use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{StoreError, UpdateOutcome, User};

/// Point reads and writes against the `users` table.
///
/// Every statement binds its arguments; no caller-supplied value is ever
/// spliced into SQL text.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Empty when no row matches.
    async fn find_user_by_id(&self, id: i64) -> Result<Vec<User>, StoreError>;

    /// `rows_affected == 0` means the id does not exist.
    async fn update_user_email(&self, id: i64, email: &str) -> Result<UpdateOutcome, StoreError>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_user_by_id(&self, id: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_user_email(&self, id: i64, email: &str) -> Result<UpdateOutcome, StoreError> {
        let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(UpdateOutcome {
            rows_affected: result.rows_affected(),
        })
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let mut user = User {
        id: 0,
        email: None,
        columns: Map::new(),
    };

    for column in row.columns() {
        let name = column.name();
        match name {
            "id" => user.id = decode(row, name, column.ordinal())?,
            "email" => user.email = decode(row, name, column.ordinal())?,
            _ => {
                let value = column_value(row, name, column.ordinal())?;
                user.columns.insert(name.to_string(), value);
            }
        }
    }

    Ok(user)
}

fn decode<'r, T>(row: &'r SqliteRow, name: &str, ordinal: usize) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(ordinal).map_err(|source| StoreError::Decode {
        column: name.to_string(),
        source,
    })
}

/// SQLite columns are dynamically typed, so the JSON shape follows the
/// storage class of the stored value rather than the declared column type.
fn column_value(row: &SqliteRow, name: &str, ordinal: usize) -> Result<Value, StoreError> {
    let raw = row.try_get_raw(ordinal).map_err(|source| StoreError::Decode {
        column: name.to_string(),
        source,
    })?;

    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage_class = raw.type_info().name().to_ascii_uppercase();

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(decode::<i64>(row, name, ordinal)?),
        "REAL" => Value::from(decode::<f64>(row, name, ordinal)?),
        "BLOB" => Value::from(decode::<Vec<u8>>(row, name, ordinal)?),
        _ => Value::from(decode::<String>(row, name, ordinal)?),
    };

    Ok(value)
}
