use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{FieldDef, FieldKind, Schema, UniqueConstraint};
use super::{Checks, FieldErrors, Resource};

static FIELDS: [FieldDef; 7] = [
    FieldDef::new("id", "id", FieldKind::Uuid),
    FieldDef::new("name", "name", FieldKind::Text),
    FieldDef::new("email", "email", FieldKind::Text),
    FieldDef::new("photo", "photo", FieldKind::Text).unfilterable(),
    FieldDef::new("role", "role", FieldKind::Text),
    FieldDef::new("active", "active", FieldKind::Boolean).internal(),
    FieldDef::new("createdAt", "created_at", FieldKind::Timestamp).internal(),
];

pub static USER_SCHEMA: Schema = Schema {
    table: "users",
    singular: "user",
    plural: "users",
    fields: &FIELDS,
    unique: &[UniqueConstraint { name: "users_email_key", fields: &["email"] }],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Body accepted by signup and by the admin create route
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Profile fields an admin may change. Passwords never travel through here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
}

/// Credential data stored beside a user, never serialized to clients
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(password_hash: String) -> Self {
        Self {
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
        }
    }

    /// True when the password changed after a token issued at `issued_at` (unix seconds)
    pub fn changed_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > issued_at)
            .unwrap_or(false)
    }

    /// Store a new hash and drop any pending reset. The change is recorded one
    /// second early so a token issued in the same second stays valid.
    pub fn change_password(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.password_changed_at = Some(now - Duration::seconds(1));
        self.clear_reset();
    }

    pub fn start_reset(&mut self, token_hash: String, expires: DateTime<Utc>) {
        self.password_reset_token = Some(token_hash);
        self.password_reset_expires = Some(expires);
    }

    pub fn clear_reset(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    pub fn reset_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.password_reset_expires.map(|exp| exp > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user: User,
    pub credentials: Credentials,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

impl Resource for User {
    type Create = UserInput;
    type Patch = UserPatch;

    fn schema() -> &'static Schema {
        &USER_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    /// Credentials are handled by the auth flow; only the profile is built here.
    fn build(input: UserInput, id: Uuid, now: DateTime<Utc>) -> Result<Self, FieldErrors> {
        let mut checks = Checks::new();
        let name = checks.require(input.name, "name", "Please tell us your name!");
        let email = checks.require(input.email, "email", "Please provide your email");

        match (name, email) {
            (Some(name), Some(email)) => Ok(Self {
                id,
                name: name.trim().to_string(),
                email: normalize_email(&email),
                photo: input.photo.unwrap_or_else(|| "default.jpg".to_string()),
                role: input.role.unwrap_or_default(),
                active: true,
                created_at: now,
            }),
            _ => Err(checks.finish().err().unwrap_or_default()),
        }
    }

    fn apply(&mut self, patch: UserPatch) {
        if let Some(v) = patch.name { self.name = v.trim().to_string(); }
        if let Some(v) = patch.email { self.email = normalize_email(&v); }
        if let Some(v) = patch.photo { self.photo = v; }
        if let Some(v) = patch.role { self.role = v; }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::new();
        checks.check(!self.name.is_empty(), "name", "Please tell us your name!");
        checks.check(is_valid_email(&self.email), "email", "Please provide a valid email");
        checks.finish()
    }
}
