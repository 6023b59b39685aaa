use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{FieldDef, FieldKind, Schema, UniqueConstraint};
use super::{Checks, FieldErrors, Resource};

static FIELDS: [FieldDef; 6] = [
    FieldDef::new("id", "id", FieldKind::Uuid),
    FieldDef::new("review", "review", FieldKind::Text),
    FieldDef::new("rating", "rating", FieldKind::Float),
    FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    FieldDef::new("tour", "tour", FieldKind::Uuid),
    FieldDef::new("user", "user", FieldKind::Uuid),
];

pub static REVIEW_SCHEMA: Schema = Schema {
    table: "reviews",
    singular: "review",
    plural: "reviews",
    fields: &FIELDS,
    unique: &[UniqueConstraint { name: "reviews_tour_user_key", fields: &["tour", "user"] }],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub tour: Uuid,
    pub user: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub review: Option<String>,
    pub rating: Option<f64>,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    pub review: Option<String>,
    pub rating: Option<f64>,
}

impl Resource for Review {
    type Create = ReviewInput;
    type Patch = ReviewPatch;

    fn schema() -> &'static Schema {
        &REVIEW_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn build(input: ReviewInput, id: Uuid, now: DateTime<Utc>) -> Result<Self, FieldErrors> {
        let mut checks = Checks::new();
        let review = checks.require(input.review, "review", "Review can not be empty!");
        let rating = checks.require(input.rating, "rating", "A review must have a rating");
        let tour = checks.require(input.tour, "tour", "Review must belong to a tour.");
        let user = checks.require(input.user, "user", "Review must belong to a user.");

        match (review, rating, tour, user) {
            (Some(review), Some(rating), Some(tour), Some(user)) => Ok(Self {
                id,
                review: review.trim().to_string(),
                rating,
                created_at: now,
                tour,
                user,
            }),
            _ => Err(checks.finish().err().unwrap_or_default()),
        }
    }

    fn apply(&mut self, patch: ReviewPatch) {
        if let Some(v) = patch.review { self.review = v.trim().to_string(); }
        if let Some(v) = patch.rating { self.rating = v; }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::new();
        checks.check(!self.review.is_empty(), "review", "Review can not be empty!");
        checks.check((1.0..=5.0).contains(&self.rating), "rating", "Rating must be between 1.0 and 5.0");
        checks.finish()
    }
}
