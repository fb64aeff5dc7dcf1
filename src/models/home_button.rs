//! Home page button model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label shown in the landing page header or footer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HomeButton {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values accepted for `position`
pub const BUTTON_POSITIONS: &[&str] = &["header", "footer"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeButtonInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}
