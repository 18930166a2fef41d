use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Store;

/// A spending category. Owns zero or more stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Storage-assigned sequential id; zero until inserted. Never serialized.
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub external_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Populated only by the load-stores operations.
    #[serde(default)]
    pub stores: Vec<Store>,
}

impl Category {
    /// Creates a new, not yet persisted category.
    pub fn new(name: impl Into<String>) -> Self {
        let now = super::now();
        Self {
            id: 0,
            external_id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            stores: Vec::new(),
        }
    }

    /// Renames the category and re-stamps `updated_at`.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = super::now();
    }
}
