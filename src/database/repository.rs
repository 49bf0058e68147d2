use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::query::sql::SqlRenderer;
use crate::query::{Condition, QuerySpec, SqlQuery};
use crate::validate::{self, FieldRule};

/// Entity descriptor: ties a typed row to its table, the columns clients may
/// address, the columns payloads may write, and the validation rules applied
/// on create, replace and patch.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin {
    const TABLE: &'static str;

    /// Columns exposed to filtering, sorting and projection. Includes the
    /// `revision` bookkeeping column; excludes secrets like password hashes.
    const COLUMNS: &'static [&'static str];

    /// Columns accepted from request payloads
    const WRITABLE: &'static [&'static str];

    /// Columns holding numbers. Range comparisons against these bind
    /// numerically; every other column compares its text form.
    const NUMERIC: &'static [&'static str] = &[];

    fn rules() -> &'static [FieldRule];

    /// Default list projection: every public column except `revision`
    fn default_projection() -> Vec<&'static str> {
        Self::COLUMNS
            .iter()
            .filter(|c| **c != "revision")
            .copied()
            .collect()
    }
}

/// Related rows embedded into a single-document read, e.g. a tour's reviews
#[derive(Debug, Clone, Copy)]
pub struct Expand {
    pub table: &'static str,
    pub foreign_key: &'static str,
    pub columns: &'static [&'static str],
}

/// The five generic repository operations, parameterized over an [`Entity`].
/// Entity-specific controllers bind these to concrete types; nothing in here
/// knows about tours or users.
pub struct Repository<T> {
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Validates and persists a new document; 201 semantics belong to the
    /// handler. Uniqueness violations surface as validation errors through
    /// the `From<sqlx::Error>` mapping.
    pub async fn create(&self, payload: &Map<String, Value>) -> Result<T, ApiError> {
        validate::validate(T::rules(), payload)?;

        let present = self.present_columns(payload);
        if present.is_empty() {
            return Err(ApiError::bad_request("Document payload is empty"));
        }

        // jsonb_populate_record converts JSON values into the column types
        // declared by the table, so arrays, timestamps and nested JSON all
        // bind through a single parameter. Absent columns keep their
        // table-declared defaults.
        let column_list = quote_list(&present);
        let record_fields = record_list("r", &present);
        let sql = format!(
            "INSERT INTO \"{table}\" ({column_list}) \
             SELECT {record_fields} FROM jsonb_populate_record(NULL::\"{table}\", $1) AS r \
             RETURNING *",
            table = T::TABLE,
        );

        let row = sqlx::query_as::<_, T>(&sql)
            .bind(Value::Object(payload.clone()))
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Read one by id; missing ids are always a 404, never a null success
    pub async fn find_by_id(&self, id: Uuid) -> Result<T, ApiError> {
        let sql = format!("SELECT * FROM \"{}\" WHERE id = $1", T::TABLE);
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Document not found"))
    }

    /// Read one matching the given conditions (used for implicit scopes such
    /// as hiding deactivated users); 404 when nothing matches
    pub async fn find_one(&self, conditions: &[Condition]) -> Result<T, ApiError> {
        self.try_find_one(conditions)
            .await?
            .ok_or_else(|| ApiError::not_found("Document not found"))
    }

    pub async fn try_find_one(&self, conditions: &[Condition]) -> Result<Option<T>, ApiError> {
        let renderer = self.renderer();
        let where_sql = renderer.render_where(conditions, 0)?;
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE {} LIMIT 1",
            T::TABLE,
            where_sql.sql
        );
        let row = bind_params(sqlx::query_as::<_, T>(&sql), &where_sql.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Read one by id and embed related rows fetched by foreign key
    pub async fn find_by_id_expanded(&self, id: Uuid, expand: &Expand) -> Result<Value, ApiError> {
        let related_sql = format!(
            "SELECT row_to_json(t) AS doc FROM (SELECT {} FROM \"{}\" WHERE \"{}\" = $1) t",
            quote_list(expand.columns),
            expand.table,
            expand.foreign_key,
        );

        let (document, related_rows) = futures::future::try_join(
            self.find_by_id(id),
            async {
                let rows = sqlx::query(&related_sql)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?;
                Ok::<_, ApiError>(rows)
            },
        )
        .await?;

        let related: Vec<Value> = related_rows
            .iter()
            .map(|row| row.try_get::<Value, _>("doc"))
            .collect::<Result<_, _>>()
            .map_err(ApiError::from)?;

        let mut doc = serde_json::to_value(&document).map_err(|e| {
            tracing::error!("Failed to serialize document: {}", e);
            ApiError::internal_server_error("Failed to format response")
        })?;
        doc[expand.table] = Value::Array(related);
        Ok(doc)
    }

    /// Read many. Scope conditions (nested-resource parents, soft-delete
    /// flags) merge into the filter stage ahead of the translated ones. When
    /// the client asked for a page explicitly, the matching rows are counted
    /// first and an offset at or past the count is a 404.
    pub async fn find_all(
        &self,
        spec: &QuerySpec,
        scope: &[Condition],
    ) -> Result<Vec<Value>, ApiError> {
        let renderer = self.renderer();

        let mut conditions: Vec<Condition> = scope.to_vec();
        conditions.extend(spec.conditions.iter().cloned());

        let where_sql = renderer.render_where(&conditions, 0)?;

        if spec.page_requested {
            let total = self.count_where(&where_sql).await?;
            if spec.offset >= total {
                return Err(ApiError::page_out_of_range(
                    "Page selected exceeds the amount of results",
                ));
            }
        }

        let select = renderer.render_select(&spec.fields)?;
        let order = renderer.render_order(&spec.sort)?;
        let limit = renderer.render_limit(spec);

        let sql = format!(
            "SELECT row_to_json(t) AS doc FROM \
             (SELECT {select} FROM \"{table}\" WHERE {where_clause} {order} {limit}) t",
            table = T::TABLE,
            where_clause = where_sql.sql,
        );

        let rows = bind_params_raw(sqlx::query(&sql), &where_sql.params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Value, _>("doc").map_err(ApiError::from))
            .collect()
    }

    /// Full-document replace with return-after semantics: writable columns
    /// absent from the payload reset to their table defaults, validators run
    /// as they would on create
    pub async fn replace(&self, id: Uuid, payload: &Map<String, Value>) -> Result<T, ApiError> {
        validate::validate(T::rules(), payload)?;

        let present = self.present_columns(payload);
        let absent: Vec<&str> = T::WRITABLE
            .iter()
            .filter(|c| !payload.contains_key(**c))
            .copied()
            .collect();

        let mut assignments = vec!["\"revision\" = \"revision\" + 1".to_string()];
        if !present.is_empty() {
            assignments.push(format!(
                "({}) = (SELECT {} FROM jsonb_populate_record(NULL::\"{}\", $2) AS r)",
                quote_list(&present),
                record_list("r", &present),
                T::TABLE,
            ));
        }
        for column in &absent {
            assignments.push(format!("\"{}\" = DEFAULT", column));
        }

        let sql = format!(
            "UPDATE \"{table}\" SET {assignments} WHERE id = $1 RETURNING *",
            table = T::TABLE,
            assignments = assignments.join(", "),
        );

        let mut query = sqlx::query_as::<_, T>(&sql).bind(id);
        if !present.is_empty() {
            query = query.bind(Value::Object(payload.clone()));
        }
        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Document not found"))
    }

    /// Partial merge-update: the stored document is fetched, the patch is
    /// merged over it and the full rule set reruns against the result, so an
    /// update can never sneak past constraints creation enforces
    pub async fn update(&self, id: Uuid, payload: &Map<String, Value>) -> Result<T, ApiError> {
        let existing = self.find_by_id(id).await?;
        let existing_doc = serde_json::to_value(&existing)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        validate::validate_patch(T::rules(), &existing_doc, payload)?;

        let present = self.present_columns(payload);
        if present.is_empty() {
            return Ok(existing);
        }

        let sql = format!(
            "UPDATE \"{table}\" SET \"revision\" = \"revision\" + 1, \
             ({columns}) = (SELECT {fields} FROM jsonb_populate_record(NULL::\"{table}\", $2) AS r) \
             WHERE id = $1 RETURNING *",
            table = T::TABLE,
            columns = quote_list(&present),
            fields = record_list("r", &present),
        );

        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .bind(Value::Object(payload.clone()))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Document not found"))
    }

    /// Delete by id; repeat deletes are 404s, success carries no body
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = $1 RETURNING id", T::TABLE);
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("Document not found"))
    }

    async fn count_where(&self, where_sql: &SqlQuery) -> Result<i64, ApiError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
            T::TABLE,
            where_sql.sql
        );
        let row = bind_params_raw(sqlx::query(&sql), &where_sql.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count").map_err(ApiError::from)?;
        Ok(count)
    }

    fn renderer(&self) -> SqlRenderer<'static> {
        SqlRenderer::new(T::COLUMNS, T::NUMERIC, T::default_projection())
    }

    fn present_columns(&self, payload: &Map<String, Value>) -> Vec<&'static str> {
        T::WRITABLE
            .iter()
            .filter(|c| payload.contains_key(**c))
            .copied()
            .collect()
    }
}

fn quote_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_list(alias: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{}.\"{}\"", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_params<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    for p in params {
        q = match p {
            Value::Null => q.bind(None::<String>),
            Value::Bool(b) => q.bind(*b),
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    q.bind(f)
                } else {
                    q.bind(n.to_string())
                }
            }
            Value::String(s) => q.bind(s),
            other => q.bind(other.clone()),
        };
    }
    q
}

fn bind_params_raw<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for p in params {
        q = match p {
            Value::Null => q.bind(None::<String>),
            Value::Bool(b) => q.bind(*b),
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    q.bind(f)
                } else {
                    q.bind(n.to_string())
                }
            }
            Value::String(s) => q.bind(s),
            other => q.bind(other.clone()),
        };
    }
    q
}
