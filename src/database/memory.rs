use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Credentials, Resource, User, UserAccount};
use crate::database::store::{ResourceStore, UserStore};
use crate::filter::{Filter, QuerySpec};

struct Row {
    id: Uuid,
    /// Full serialized document, internal fields included
    doc: Value,
    credentials: Option<Credentials>,
}

/// Collection held in process memory, in insertion order. Queries run
/// through the same `Filter` evaluation the SQL rendering is tested against.
pub struct MemoryStore<R> {
    rows: RwLock<Vec<Row>>,
    _phantom: PhantomData<fn() -> R>,
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            _phantom: PhantomData,
        }
    }
}

impl<R: Resource> MemoryStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the first unique constraint `doc` would break
    fn violated_constraint(rows: &[Row], id: Uuid, doc: &Value) -> Option<&'static str> {
        R::schema().unique.iter().find_map(|constraint| {
            let clash = rows.iter().filter(|row| row.id != id).any(|row| {
                constraint
                    .fields
                    .iter()
                    .all(|f| doc.get(*f).is_some() && row.doc.get(*f) == doc.get(*f))
            });
            clash.then_some(constraint.name)
        })
    }

    async fn push(&self, id: Uuid, doc: Value, credentials: Option<Credentials>) -> Result<(), DatabaseError> {
        let mut rows = self.rows.write().await;
        if let Some(constraint) = Self::violated_constraint(&rows, id, &doc) {
            return Err(DatabaseError::Duplicate { constraint: constraint.to_string() });
        }
        if rows.iter().any(|row| row.id == id) {
            return Err(DatabaseError::Duplicate { constraint: format!("{}_pkey", R::schema().table) });
        }
        rows.push(Row { id, doc, credentials });
        Ok(())
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for MemoryStore<R> {
    async fn insert(&self, doc: R) -> Result<R, DatabaseError> {
        self.push(doc.id(), serde_json::to_value(&doc)?, None).await?;
        Ok(doc)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError> {
        let rows = self.rows.read().await;
        rows.iter()
            .find(|row| row.id == id)
            .map(|row| serde_json::from_value(row.doc.clone()).map_err(DatabaseError::from))
            .transpose()
    }

    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>, DatabaseError> {
        let rows = self.rows.read().await;
        let docs = rows.iter().map(|row| row.doc.clone());
        Ok(Filter::new(R::schema(), spec).apply(docs))
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(Filter::new(R::schema(), spec).count(rows.iter().map(|row| &row.doc)))
    }

    async fn update(&self, doc: R) -> Result<Option<R>, DatabaseError> {
        let value = serde_json::to_value(&doc)?;
        let mut rows = self.rows.write().await;
        if let Some(constraint) = Self::violated_constraint(&rows, doc.id(), &value) {
            return Err(DatabaseError::Duplicate { constraint: constraint.to_string() });
        }
        match rows.iter_mut().find(|row| row.id == doc.id()) {
            Some(row) => {
                row.doc = value;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }

    async fn delete_referencing(&self, field: &str, id: Uuid) -> Result<u64, DatabaseError> {
        let target = Value::String(id.to_string());
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.doc.get(field) != Some(&target));
        Ok((before - rows.len()) as u64)
    }
}

impl MemoryStore<User> {
    async fn find_account_where(&self, pred: impl Fn(&Row) -> bool + Send) -> Result<Option<UserAccount>, DatabaseError> {
        let rows = self.rows.read().await;
        let Some(row) = rows.iter().find(|row| pred(row)) else {
            return Ok(None);
        };
        let credentials = row
            .credentials
            .clone()
            .ok_or_else(|| DatabaseError::Decode(format!("user {} has no credentials", row.id)))?;
        Ok(Some(UserAccount {
            user: serde_json::from_value(row.doc.clone())?,
            credentials,
        }))
    }
}

#[async_trait]
impl UserStore for MemoryStore<User> {
    async fn create_account(&self, account: UserAccount) -> Result<User, DatabaseError> {
        let doc = serde_json::to_value(&account.user)?;
        self.push(account.user.id, doc, Some(account.credentials)).await?;
        Ok(account.user)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        self.find_account_where(|row| row.id == id).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let email = email.to_lowercase();
        self.find_account_where(move |row| row.doc.get("email").and_then(Value::as_str) == Some(email.as_str()))
            .await
    }

    async fn find_account_by_reset_token(&self, token_hash: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let token_hash = token_hash.to_string();
        self.find_account_where(move |row| {
            row.credentials
                .as_ref()
                .and_then(|c| c.password_reset_token.as_deref())
                == Some(token_hash.as_str())
        })
        .await
    }

    async fn save_credentials(&self, id: Uuid, credentials: &Credentials) -> Result<(), DatabaseError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        row.credentials = Some(credentials.clone());
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                if let Value::Object(doc) = &mut row.doc {
                    doc.insert("active".to_string(), Value::Bool(active));
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
