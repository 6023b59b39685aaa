use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{FieldDef, FieldKind, Schema, UniqueConstraint};
use super::{Checks, FieldErrors, Resource};

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

static FIELDS: [FieldDef; 17] = [
    FieldDef::new("id", "id", FieldKind::Uuid),
    FieldDef::new("name", "name", FieldKind::Text),
    FieldDef::new("slug", "slug", FieldKind::Text),
    FieldDef::new("duration", "duration", FieldKind::Integer),
    FieldDef::new("maxGroupSize", "max_group_size", FieldKind::Integer),
    FieldDef::new("difficulty", "difficulty", FieldKind::Text),
    FieldDef::new("ratingsAverage", "ratings_average", FieldKind::Float),
    FieldDef::new("ratingsQuantity", "ratings_quantity", FieldKind::Integer),
    FieldDef::new("price", "price", FieldKind::Float),
    FieldDef::new("priceDiscount", "price_discount", FieldKind::Float),
    FieldDef::new("summary", "summary", FieldKind::Text),
    FieldDef::new("description", "description", FieldKind::Text),
    FieldDef::new("imageCover", "image_cover", FieldKind::Text).unfilterable(),
    FieldDef::new("images", "images", FieldKind::Json).unfilterable(),
    FieldDef::new("startDates", "start_dates", FieldKind::Json).unfilterable(),
    FieldDef::new("secretTour", "secret_tour", FieldKind::Boolean).internal(),
    FieldDef::new("createdAt", "created_at", FieldKind::Timestamp).internal(),
];

pub static TOUR_SCHEMA: Schema = Schema {
    table: "tours",
    singular: "tour",
    plural: "tours",
    fields: &FIELDS,
    unique: &[UniqueConstraint { name: "tours_name_key", fields: &["name"] }],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i64,
    pub max_group_size: i64,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<i64>,
    pub max_group_size: Option<i64>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPatch {
    pub name: Option<String>,
    pub duration: Option<i64>,
    pub max_group_size: Option<i64>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

/// "The Forest Hiker" -> "the-forest-hiker"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

impl Resource for Tour {
    type Create = TourInput;
    type Patch = TourPatch;

    fn schema() -> &'static Schema {
        &TOUR_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn build(input: TourInput, id: Uuid, now: DateTime<Utc>) -> Result<Self, FieldErrors> {
        let mut checks = Checks::new();
        let name = checks.require(input.name, "name", "A tour must have a name");
        let duration = checks.require(input.duration, "duration", "A tour must have a duration");
        let max_group_size = checks.require(input.max_group_size, "maxGroupSize", "A tour must have a group size");
        let difficulty = checks.require(input.difficulty, "difficulty", "A tour must have a difficulty");
        let price = checks.require(input.price, "price", "A tour must have a price");
        let summary = checks.require(input.summary, "summary", "A tour must have a summary");
        let image_cover = checks.require(input.image_cover, "imageCover", "A tour must have a cover image");

        match (name, duration, max_group_size, difficulty, price, summary, image_cover) {
            (
                Some(name),
                Some(duration),
                Some(max_group_size),
                Some(difficulty),
                Some(price),
                Some(summary),
                Some(image_cover),
            ) => {
                let name = name.trim().to_string();
                Ok(Self {
                    id,
                    slug: slugify(&name),
                    name,
                    duration,
                    max_group_size,
                    difficulty,
                    ratings_average: input.ratings_average.unwrap_or(4.5),
                    ratings_quantity: input.ratings_quantity.unwrap_or(0),
                    price,
                    price_discount: input.price_discount,
                    summary: summary.trim().to_string(),
                    description: input.description.map(|d| d.trim().to_string()),
                    image_cover,
                    images: input.images.unwrap_or_default(),
                    start_dates: input.start_dates.unwrap_or_default(),
                    secret_tour: input.secret_tour.unwrap_or(false),
                    created_at: now,
                })
            }
            _ => Err(checks.finish().err().unwrap_or_default()),
        }
    }

    fn apply(&mut self, patch: TourPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
            self.slug = slugify(&self.name);
        }
        if let Some(v) = patch.duration { self.duration = v; }
        if let Some(v) = patch.max_group_size { self.max_group_size = v; }
        if let Some(v) = patch.difficulty { self.difficulty = v; }
        if let Some(v) = patch.ratings_average { self.ratings_average = v; }
        if let Some(v) = patch.ratings_quantity { self.ratings_quantity = v; }
        if let Some(v) = patch.price { self.price = v; }
        if let Some(v) = patch.price_discount { self.price_discount = Some(v); }
        if let Some(v) = patch.summary { self.summary = v.trim().to_string(); }
        if let Some(v) = patch.description { self.description = Some(v.trim().to_string()); }
        if let Some(v) = patch.image_cover { self.image_cover = v; }
        if let Some(v) = patch.images { self.images = v; }
        if let Some(v) = patch.start_dates { self.start_dates = v; }
        if let Some(v) = patch.secret_tour { self.secret_tour = v; }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::new();
        let len = self.name.chars().count();
        checks.check(len >= 10, "name", "A tour name must have more or equal then 10 characters");
        checks.check(len <= 40, "name", "A tour name must have less or equal then 40 characters");
        checks.check(self.duration > 0, "duration", "Duration must be positive");
        checks.check(self.max_group_size > 0, "maxGroupSize", "Group size must be positive");
        checks.check(
            DIFFICULTIES.contains(&self.difficulty.as_str()),
            "difficulty",
            "Difficulty is either: easy, medium, difficult",
        );
        checks.check(
            (1.0..=5.0).contains(&self.ratings_average),
            "ratingsAverage",
            "Rating must be between 1.0 and 5.0",
        );
        checks.check(self.ratings_quantity >= 0, "ratingsQuantity", "Ratings quantity cannot be negative");
        checks.check(self.price >= 0.0, "price", "Price cannot be negative");
        if let Some(discount) = self.price_discount {
            checks.check(
                discount < self.price,
                "priceDiscount",
                format!("Discount price ({}) should be below regular price", discount),
            );
        }
        checks.check(!self.summary.is_empty(), "summary", "A tour must have a summary");
        checks.check(!self.image_cover.trim().is_empty(), "imageCover", "A tour must have a cover image");
        checks.finish()
    }
}
