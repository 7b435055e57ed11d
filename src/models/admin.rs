//! Back-office account allowed to manage the catalogue and orders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,

    pub name: String,

    /// Stored lowercased and trimmed; unique across admins.
    pub email: String,

    /// bcrypt hash. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
