//! Validated command objects handed to the aggregate operations.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Request to create a category, optionally with nested stores.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[serde(default)]
    #[validate(custom = "store_names")]
    pub stores: Vec<String>,
}

/// Rename of an existing store inside a category update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditStoreRequest {
    #[validate(custom = "not_nil")]
    pub id: Uuid,
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
}

/// Request to rename a category and synchronise its stores.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "distinct_update_names", skip_on_field_errors = false))]
pub struct UpdateCategoryRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[serde(default)]
    #[validate(custom = "store_names")]
    pub added_stores: Vec<String>,
    #[serde(default)]
    #[validate]
    pub edited_stores: Vec<EditStoreRequest>,
    #[serde(default)]
    pub deleted_stores: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    #[validate(custom = "not_nil")]
    pub category_id: Uuid,
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStoreRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpendingRequest {
    #[validate(custom = "positive")]
    pub amount: Decimal,
    #[serde(default)]
    pub remark: String,
    pub spending_date: DateTime<Utc>,
    #[validate(custom = "not_nil")]
    pub category_id: Uuid,
}

/// Books a receipt's total as a spending record.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpendingFromReceiptRequest {
    #[validate(custom = "not_nil")]
    pub receipt_id: Uuid,
    #[validate(custom = "not_nil")]
    pub category_id: Uuid,
    /// Falls back to the receipt's store name when absent or blank.
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptItemRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
}

/// Manually entered receipt. Without `total` the item prices are summed.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub store_name: String,
    pub date: DateTime<Utc>,
    #[validate(custom = "non_negative")]
    pub total: Option<Decimal>,
    #[serde(default)]
    #[validate]
    pub items: Vec<CreateReceiptItemRequest>,
}

/// Receipt produced by a text-extraction client.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReceipt {
    #[validate(length(max = 255), custom = "not_blank")]
    pub store_name: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    #[validate]
    pub items: Vec<CreateReceiptItemRequest>,
}

impl ExtractedReceipt {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn not_nil(value: &Uuid) -> Result<(), ValidationError> {
    if value.is_nil() {
        return Err(ValidationError::new("nil_id"));
    }
    Ok(())
}

/// Money columns are `NUMERIC(12, 2)`.
const MONEY_SCALE: u32 = 2;
const MONEY_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("not_positive"));
    }
    storable_money(value)
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative"));
    }
    storable_money(value)
}

pub(crate) fn storable_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ValidationError::new("too_many_decimal_places"));
    }
    if value.abs() >= MONEY_LIMIT {
        return Err(ValidationError::new("amount_out_of_range"));
    }
    Ok(())
}

fn store_names(names: &[String]) -> Result<(), ValidationError> {
    if names.iter().any(|name| name.trim().is_empty() || name.len() > 255) {
        return Err(ValidationError::new("invalid_store_name"));
    }
    if first_duplicate(names.iter().map(String::as_str)).is_some() {
        return Err(ValidationError::new("duplicate_store_name"));
    }
    Ok(())
}

fn distinct_update_names(request: &UpdateCategoryRequest) -> Result<(), ValidationError> {
    let names = request
        .added_stores
        .iter()
        .map(String::as_str)
        .chain(request.edited_stores.iter().map(|edit| edit.name.as_str()));
    if first_duplicate(names).is_some() {
        return Err(ValidationError::new("duplicate_store_name"));
    }

    let mut touched = HashSet::new();
    let repeated = request
        .edited_stores
        .iter()
        .map(|edit| edit.id)
        .chain(request.deleted_stores.iter().copied())
        .any(|id| !touched.insert(id));
    if repeated {
        return Err(ValidationError::new("store_touched_twice"));
    }
    Ok(())
}

/// First name that appears twice once surrounding whitespace is ignored.
pub(crate) fn first_duplicate<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(str::trim)
        .find(|name| !seen.insert(*name))
}
