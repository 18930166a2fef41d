use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A store belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub external_id: Uuid,
    pub name: String,
    /// Internal id of the owning category.
    #[serde(skip)]
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Store {
    pub fn new(name: impl Into<String>, category_id: i64) -> Self {
        let now = super::now();
        Self {
            id: 0,
            external_id: Uuid::new_v4(),
            name: name.into(),
            category_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = super::now();
    }

    pub fn belongs_to(&self, category_id: i64) -> bool {
        self.category_id == category_id
    }
}
