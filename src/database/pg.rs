use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Credentials, Resource, User, UserAccount};
use crate::database::query_builder::{bind_cells, Cell, QueryBuilder};
use crate::database::store::{ResourceStore, UserStore};
use crate::filter::{Filter, QuerySpec};

/// Credential columns stored beside the user document, in binding order
const CREDENTIAL_COLUMNS: [&str; 4] = [
    "password_hash",
    "password_changed_at",
    "password_reset_token",
    "password_reset_expires",
];

/// PostgreSQL-backed collection
pub struct PgStore<R> {
    pool: PgPool,
    queries: QueryBuilder,
    _phantom: PhantomData<fn() -> R>,
}

impl<R: Resource> PgStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            queries: QueryBuilder::new(R::schema()),
            _phantom: PhantomData,
        }
    }
}

fn decode_doc(row: &PgRow) -> Result<Value, DatabaseError> {
    Ok(row.try_get::<Value, _>("doc")?)
}

fn decode<R: Resource>(row: &PgRow) -> Result<R, DatabaseError> {
    Ok(serde_json::from_value(decode_doc(row)?)?)
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for PgStore<R> {
    async fn insert(&self, doc: R) -> Result<R, DatabaseError> {
        let cells = self.queries.cells(&serde_json::to_value(&doc)?)?;
        let sql = self.queries.insert(&[]);
        bind_cells(sqlx::query(&sql), cells).execute(&self.pool).await?;
        Ok(doc)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError> {
        let sql = self.queries.select_by_id();
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(decode::<R>).transpose()
    }

    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = Filter::new(R::schema(), spec).to_sql();
        tracing::debug!("{}", sql_result.query);
        let cells = sql_result.params.into_iter().map(Cell::from);
        let rows = bind_cells(sqlx::query(&sql_result.query), cells)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_doc).collect()
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, DatabaseError> {
        let sql_result = Filter::new(R::schema(), spec).to_count_sql();
        let cells = sql_result.params.into_iter().map(Cell::from);
        let row = bind_cells(sqlx::query(&sql_result.query), cells)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn update(&self, doc: R) -> Result<Option<R>, DatabaseError> {
        let cells = self.queries.cells(&serde_json::to_value(&doc)?)?;
        let sql = self.queries.update();
        let result = bind_cells(sqlx::query(&sql), cells).execute(&self.pool).await?;
        Ok((result.rows_affected() > 0).then_some(doc))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let sql = self.queries.delete_by_id();
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_referencing(&self, field: &str, id: Uuid) -> Result<u64, DatabaseError> {
        let sql = self.queries.delete_where(field)?;
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn credential_cells(credentials: &Credentials) -> [Cell; 4] {
    [
        Cell::Text(Some(credentials.password_hash.clone())),
        Cell::Timestamp(credentials.password_changed_at),
        Cell::Text(credentials.password_reset_token.clone()),
        Cell::Timestamp(credentials.password_reset_expires),
    ]
}

impl PgStore<User> {
    fn account_select(&self, column: &str) -> String {
        let credentials: Vec<String> = CREDENTIAL_COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
        format!(
            "SELECT {} AS doc, {} FROM \"{}\" WHERE \"{}\" = $1",
            Filter::json_object(User::schema().fields.iter()),
            credentials.join(", "),
            User::schema().table,
            column
        )
    }

    fn decode_account(row: &PgRow) -> Result<UserAccount, DatabaseError> {
        Ok(UserAccount {
            user: decode::<User>(row)?,
            credentials: Credentials {
                password_hash: row.try_get("password_hash")?,
                password_changed_at: row.try_get("password_changed_at")?,
                password_reset_token: row.try_get("password_reset_token")?,
                password_reset_expires: row.try_get("password_reset_expires")?,
            },
        })
    }
}

#[async_trait]
impl UserStore for PgStore<User> {
    async fn create_account(&self, account: UserAccount) -> Result<User, DatabaseError> {
        let mut cells = self.queries.cells(&serde_json::to_value(&account.user)?)?;
        cells.extend(credential_cells(&account.credentials));
        let sql = self.queries.insert(&CREDENTIAL_COLUMNS);
        bind_cells(sqlx::query(&sql), cells).execute(&self.pool).await?;
        Ok(account.user)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let sql = self.account_select("id");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode_account).transpose()
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let sql = self.account_select("email");
        let row = sqlx::query(&sql).bind(email.to_lowercase()).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode_account).transpose()
    }

    async fn find_account_by_reset_token(&self, token_hash: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let sql = self.account_select("password_reset_token");
        let row = sqlx::query(&sql).bind(token_hash.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode_account).transpose()
    }

    async fn save_credentials(&self, id: Uuid, credentials: &Credentials) -> Result<(), DatabaseError> {
        let sql = self.queries.update_columns(&CREDENTIAL_COLUMNS);
        let cells = credential_cells(credentials).into_iter().chain([Cell::Uuid(Some(id))]);
        let result = bind_cells(sqlx::query(&sql), cells).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        let sql = self.queries.update_columns(&["active"]);
        let cells = [Cell::Boolean(Some(active)), Cell::Uuid(Some(id))];
        let result = bind_cells(sqlx::query(&sql), cells).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
