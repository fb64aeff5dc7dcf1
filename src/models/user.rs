//! User model
//!
//! This module defines the User entity, its plan, and the profile update
//! input accepted by `PUT /v1/profile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// The password hash is loaded from the database but never serialized.
/// Profile columns keep their snake_case names on the wire; timestamps are
/// camelCase like every other entity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 hash; `None` until a password has been set
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub password_set: bool,
    #[sqlx(try_from = "String")]
    pub plan: UserPlanKind,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub gender: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub program: Option<String>,
    pub year_of_study: Option<String>,
    pub research_area: Option<String>,
    pub research_interests: Option<String>,
    pub publications: Option<String>,
    pub linkedin_url: Option<String>,
    pub google_scholar_url: Option<String>,
    pub orcid_id: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_pro(&self) -> bool {
        self.plan == UserPlanKind::Pro
    }
}

/// Subscription tier stored on the user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserPlanKind {
    #[default]
    Free,
    Pro,
}

impl UserPlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserPlanKind::Free => "free",
            UserPlanKind::Pro => "pro",
        }
    }
}

impl fmt::Display for UserPlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserPlanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(UserPlanKind::Free),
            "pro" => Ok(UserPlanKind::Pro),
            other => Err(format!("Unknown plan: {}", other)),
        }
    }
}

impl TryFrom<String> for UserPlanKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Values accepted for `users.gender`
pub const GENDERS: &[&str] = &["Male", "Female", "Other"];

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    /// Already hashed
    pub password_hash: String,
}

/// Partial profile update. Only fields present in the request body are
/// written; unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub gender: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub program: Option<String>,
    pub year_of_study: Option<String>,
    pub research_area: Option<String>,
    pub research_interests: Option<String>,
    pub publications: Option<String>,
    pub linkedin_url: Option<String>,
    pub google_scholar_url: Option<String>,
    pub orcid_id: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
}

impl UpdateProfileInput {
    /// Column/value pairs for every field that was supplied, in a fixed order
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        let fields: [(&'static str, &Option<String>); 17] = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone_number", &self.phone_number),
            ("profile_image", &self.profile_image),
            ("gender", &self.gender),
            ("university", &self.university),
            ("department", &self.department),
            ("program", &self.program),
            ("year_of_study", &self.year_of_study),
            ("research_area", &self.research_area),
            ("research_interests", &self.research_interests),
            ("publications", &self.publications),
            ("linkedin_url", &self.linkedin_url),
            ("google_scholar_url", &self.google_scholar_url),
            ("orcid_id", &self.orcid_id),
            ("bio", &self.bio),
            ("skills", &self.skills),
        ];

        fields
            .into_iter()
            .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }
}
