use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row};

use crate::tenant::TenantError;

use super::backend::EntityBackend;
use super::entity::TenantAwareEntity;
use super::error::StoreError;
use super::scope::Scope;
use super::{is_valid_identifier, quote_identifier};

const ID_COLUMN: &str = "id";
const TENANT_COLUMN: &str = "tenant_id";
const CREATED_COLUMN: &str = "created_at";
const CREATED_BY_COLUMN: &str = "created_by";

/// Columns an update must never rewrite
const IMMUTABLE_COLUMNS: [&str; 4] = [ID_COLUMN, TENANT_COLUMN, CREATED_COLUMN, CREATED_BY_COLUMN];

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// PostgreSQL backend storing every tenant's rows of `T` in one shared table
/// discriminated by `tenant_id`.
///
/// Rows are mapped through JSON: reads select `row_to_json(t)` and
/// writes go through `jsonb_populate_record`, so any serde-serializable
/// entity whose fields match the table's columns can be stored.
pub struct PgBackend<T> {
    pool: PgPool,
    table: String,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> PgBackend<T>
where
    T: TenantAwareEntity + Serialize + DeserializeOwned,
{
    pub fn new(pool: PgPool) -> Result<Self, StoreError> {
        Self::with_table(pool, T::ENTITY)
    }

    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(StoreError::InvalidIdentifier(table));
        }
        Ok(Self {
            pool,
            table,
            _phantom: PhantomData,
        })
    }

    /// `[{"id": ..}, ..]`, decoded server-side into the id column's own type
    fn ids_param(ids: &[T::Id]) -> Result<Value, StoreError> {
        let ids = ids
            .iter()
            .map(id_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(ids))
    }

    fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<T>, StoreError> {
        rows.into_iter().map(|row| Self::decode_row(&row)).collect()
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<T, StoreError> {
        let value: Value = row.try_get("row")?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl<T> EntityBackend<T> for PgBackend<T>
where
    T: TenantAwareEntity + Serialize + DeserializeOwned,
{
    async fn find_all(&self, scope: &Scope) -> Result<Vec<T>, StoreError> {
        let sql = select_sql(&self.table, scope, false);
        let rows = bind_all(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        Self::decode_rows(rows)
    }

    async fn find_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut sql = select_sql(&self.table, scope, true);
        sql.params.push(Self::ids_param(ids)?);
        let rows = bind_all(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        Self::decode_rows(rows)
    }

    async fn count(&self, scope: &Scope) -> Result<u64, StoreError> {
        let sql = count_sql(&self.table, scope);
        let row = bind_all(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn owner_of(&self, id: &T::Id) -> Result<Option<String>, StoreError> {
        let sql = owner_sql(&self.table);
        let row = sqlx::query(&sql)
            .bind(id_record(id)?)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("owner")?),
            None => Ok(None),
        }
    }

    /// Rows whose id is stored are updated under an owner guard; every other
    /// row is inserted with a server-generated id, whatever the caller sent.
    async fn upsert_all(&self, entities: Vec<T>) -> Result<Vec<T>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(entities.len());

        for entity in &entities {
            let record = match serde_json::to_value(entity)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Backend(format!(
                        "{} does not serialize to an object",
                        T::ENTITY
                    )))
                }
            };

            if let Some(id) = entity.id() {
                let sql = update_sql(&self.table, record.clone())?;
                let updated = bind_all(sqlx::query(&sql.query), &sql.params)
                    .fetch_optional(&mut *tx)
                    .await?;
                if let Some(row) = updated {
                    saved.push(Self::decode_row(&row)?);
                    continue;
                }

                let owner: Option<Option<String>> = sqlx::query_scalar(&owner_sql(&self.table))
                    .bind(id_record(id)?)
                    .fetch_optional(&mut *tx)
                    .await?;
                if owner.is_some() {
                    // the row exists under another owner
                    return Err(TenantError::violation(T::ENTITY).into());
                }
            }

            let sql = insert_sql(&self.table, record)?;
            let row = bind_all(sqlx::query(&sql.query), &sql.params)
                .fetch_one(&mut *tx)
                .await?;
            saved.push(Self::decode_row(&row)?);
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut sql = delete_sql(&self.table, scope);
        sql.params.push(Self::ids_param(ids)?);
        let result = bind_all(sqlx::query(&sql.query), &sql.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn id_record<Id: Serialize>(id: &Id) -> Result<Value, StoreError> {
    let mut record = Map::new();
    record.insert(ID_COLUMN.to_string(), serde_json::to_value(id)?);
    Ok(Value::Object(record))
}

/// Ids are decoded through the table's row type so the comparison is typed
/// and can use the primary key index.
fn ids_condition(table: &str, param_index: usize) -> String {
    format!(
        "{id} IN (SELECT {id} FROM jsonb_populate_recordset(NULL::{table}, ${n}::jsonb))",
        id = quote_identifier(ID_COLUMN),
        table = quote_identifier(table),
        n = param_index
    )
}

pub fn select_sql(table: &str, scope: &Scope, by_ids: bool) -> SqlResult {
    let (mut condition, params) = scope.to_sql(TENANT_COLUMN, 1);
    if by_ids {
        condition = format!("({}) AND {}", condition, ids_condition(table, params.len() + 1));
    }
    SqlResult {
        query: format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {}) t",
            quote_identifier(table),
            condition
        ),
        params,
    }
}

pub fn count_sql(table: &str, scope: &Scope) -> SqlResult {
    let (condition, params) = scope.to_sql(TENANT_COLUMN, 1);
    SqlResult {
        query: format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {}",
            quote_identifier(table),
            condition
        ),
        params,
    }
}

pub fn delete_sql(table: &str, scope: &Scope) -> SqlResult {
    let (condition, params) = scope.to_sql(TENANT_COLUMN, 1);
    SqlResult {
        query: format!(
            "DELETE FROM {} WHERE ({}) AND {}",
            quote_identifier(table),
            condition,
            ids_condition(table, params.len() + 1)
        ),
        params,
    }
}

/// Stored owner of the row with the id in `$1` (`{"id": ..}`)
pub fn owner_sql(table: &str) -> String {
    format!(
        "SELECT {tenant} AS owner FROM {table} WHERE {id} = (SELECT {id} FROM jsonb_populate_record(NULL::{table}, $1::jsonb))",
        tenant = quote_identifier(TENANT_COLUMN),
        table = quote_identifier(table),
        id = quote_identifier(ID_COLUMN),
    )
}

fn check_columns(record: &Map<String, Value>) -> Result<(), StoreError> {
    match record.keys().find(|key| !is_valid_identifier(key)) {
        Some(bad) => Err(StoreError::InvalidIdentifier(bad.clone())),
        None => Ok(()),
    }
}

/// Update of one serialized record that only matches when the stored owner
/// equals the record's owner; otherwise no row is returned.
pub fn update_sql(table: &str, record: Map<String, Value>) -> Result<SqlResult, StoreError> {
    check_columns(&record)?;

    let table_ident = quote_identifier(table);
    let mut updates: Vec<String> = record
        .keys()
        .filter(|key| !IMMUTABLE_COLUMNS.contains(&key.as_str()))
        .map(|key| format!("{0} = src.{0}", quote_identifier(key)))
        .collect();
    if updates.is_empty() {
        updates.push(format!("{0} = {1}.{0}", quote_identifier(TENANT_COLUMN), table_ident));
    }

    Ok(SqlResult {
        query: format!(
            "UPDATE {table} SET {updates} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS src \
             WHERE {table}.{id} = src.{id} AND {table}.{tenant} = src.{tenant} RETURNING row_to_json({table}.*) AS row",
            table = table_ident,
            updates = updates.join(", "),
            id = quote_identifier(ID_COLUMN),
            tenant = quote_identifier(TENANT_COLUMN),
        ),
        params: vec![Value::Object(record)],
    })
}

/// Insert of one serialized record. The id column is left to its default.
pub fn insert_sql(table: &str, mut record: Map<String, Value>) -> Result<SqlResult, StoreError> {
    record.remove(ID_COLUMN);
    check_columns(&record)?;

    let table_ident = quote_identifier(table);
    let columns = record
        .keys()
        .map(|key| quote_identifier(key))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(SqlResult {
        query: format!(
            "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) \
             RETURNING row_to_json({table}.*) AS row",
            table = table_ident,
            columns = columns,
        ),
        params: vec![Value::Object(record)],
    })
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::String(s) => query.bind(s.as_str()),
            Value::Bool(b) => query.bind(*b),
            Value::Null => query.bind(Option::<String>::None),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::Array(_) | Value::Object(_) => query.bind(param),
        };
    }
    query
}
