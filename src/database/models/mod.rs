pub mod review;
pub mod schema;
pub mod tour;
pub mod user;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub use review::{Review, ReviewInput, ReviewPatch};
pub use schema::{FieldDef, FieldKind, Schema, UniqueConstraint};
pub use tour::{Tour, TourInput, TourPatch};
pub use user::{Credentials, Role, User, UserAccount, UserPatch};

/// Field name → message, reported back as a validation error
pub type FieldErrors = HashMap<String, String>;

/// Contract every document type exposed through the generic handlers fulfils.
///
/// Defaults and derived fields are applied in `build`, so both stores persist
/// exactly what `build` and `apply` produce.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    type Create: DeserializeOwned + Send + 'static;
    type Patch: DeserializeOwned + Send + 'static;

    fn schema() -> &'static Schema;

    fn id(&self) -> Uuid;

    /// Build a new document, reporting required fields that are missing
    fn build(input: Self::Create, id: Uuid, now: DateTime<Utc>) -> Result<Self, FieldErrors>;

    /// Replace the fields named in `patch`
    fn apply(&mut self, patch: Self::Patch);

    /// Model-level constraints
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Collects field errors for `build`/`validate`
#[derive(Debug, Default)]
pub struct Checks {
    errors: FieldErrors,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.fail(field, message);
        }
    }

    /// Unwrap a required input, recording an error when it is absent
    pub fn require<T>(&mut self, value: Option<T>, field: &str, message: &str) -> Option<T> {
        if value.is_none() {
            self.fail(field, message);
        }
        value
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
