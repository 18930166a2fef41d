use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::commands::{CreateCategoryRequest, UpdateCategoryRequest};
use crate::error::{AppError, Result};
use crate::models::{Category, Store};
use crate::repositories::{CategoryRepository, StoreRepository, UnitOfWork};

/// Aggregate operations on a category and its stores.
#[derive(Clone)]
pub struct CategoryService {
    uow: UnitOfWork,
    category_repo: CategoryRepository,
    store_repo: StoreRepository,
}

impl CategoryService {
    pub fn new(pool: PgPool) -> Self {
        let store_repo = StoreRepository::new(pool.clone());
        Self {
            uow: UnitOfWork::new(pool.clone()),
            category_repo: CategoryRepository::new(pool, store_repo.clone()),
            store_repo,
        }
    }

    /// Creates a category and its nested stores atomically.
    #[instrument(name = "service.category.create", skip_all)]
    pub async fn create_category(&self, request: CreateCategoryRequest) -> Result<Category> {
        request.validate()?;

        let category_repo = self.category_repo.clone();
        let store_repo = self.store_repo.clone();

        let category = self
            .uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let name = request.name.trim();
                    if category_repo.get_by_name(Some(&mut *tx), name).await?.is_some() {
                        return Err(AppError::Conflict(format!(
                            "category '{}' already exists",
                            name
                        )));
                    }

                    let mut category = category_repo
                        .insert(Some(&mut *tx), &Category::new(name))
                        .await?;

                    if !request.stores.is_empty() {
                        let stores: Vec<Store> = request
                            .stores
                            .iter()
                            .map(|store_name| Store::new(store_name.trim(), category.id))
                            .collect();
                        category.stores = store_repo.insert_many(Some(&mut *tx), &stores).await?;
                    }

                    Ok(category)
                })
            })
            .await?;

        info!(
            category_id = %category.external_id,
            stores = category.stores.len(),
            "Category created"
        );
        Ok(category)
    }

    /// Renames a category and applies store additions, edits and deletions in
    /// one transaction. Any failing step leaves the category untouched.
    #[instrument(name = "service.category.update", skip_all, fields(category_id = %external_id))]
    pub async fn update_category(
        &self,
        external_id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<Category> {
        request.validate()?;

        let category_repo = self.category_repo.clone();
        let store_repo = self.store_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let name = request.name.trim();
                    if let Some(holder) = category_repo.get_by_name(Some(&mut *tx), name).await? {
                        if holder.external_id != external_id {
                            return Err(AppError::Conflict(format!(
                                "category '{}' already exists",
                                name
                            )));
                        }
                    }

                    let mut category = category_repo
                        .get_by_external_id(Some(&mut *tx), external_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("category {} not found", external_id))
                        })?;

                    category.rename(name);
                    if !category_repo.update(Some(&mut *tx), &category).await? {
                        return Err(AppError::NotFound(format!(
                            "category {} not found",
                            external_id
                        )));
                    }

                    let mut current: HashMap<Uuid, Store> = store_repo
                        .get_by_category_id(Some(&mut *tx), category.id)
                        .await?
                        .into_iter()
                        .map(|store| (store.external_id, store))
                        .collect();

                    if let Some(taken) = request
                        .added_stores
                        .iter()
                        .map(|n| n.trim())
                        .find(|n| current.values().any(|store| store.name == *n))
                    {
                        return Err(AppError::Conflict(format!(
                            "store '{}' already exists in this category",
                            taken
                        )));
                    }

                    let added: Vec<Store> = request
                        .added_stores
                        .iter()
                        .map(|store_name| Store::new(store_name.trim(), category.id))
                        .collect();
                    store_repo.insert_many(Some(&mut *tx), &added).await?;

                    for edit in &request.edited_stores {
                        let mut store = store_repo
                            .get_by_external_id(Some(&mut *tx), edit.id)
                            .await?
                            .filter(|store| store.belongs_to(category.id))
                            .ok_or_else(|| {
                                AppError::NotFound(format!(
                                    "store {} not found in this category",
                                    edit.id
                                ))
                            })?;

                        let new_name = edit.name.trim();
                        let collides = current
                            .values()
                            .any(|other| other.id != store.id && other.name == new_name);
                        if collides {
                            return Err(AppError::Conflict(format!(
                                "store '{}' already exists in this category",
                                new_name
                            )));
                        }

                        store.rename(new_name);
                        store_repo.update(Some(&mut *tx), &store).await?;
                        // Later edits may take the name this one released
                        current.insert(store.external_id, store);
                    }

                    if let Some(missing) = request
                        .deleted_stores
                        .iter()
                        .find(|id| !current.contains_key(*id))
                    {
                        return Err(AppError::NotFound(format!(
                            "store {} not found in this category",
                            missing
                        )));
                    }
                    store_repo
                        .delete_many(Some(&mut *tx), &request.deleted_stores)
                        .await?;

                    category_repo.load_stores(Some(&mut *tx), &mut category).await?;
                    Ok(category)
                })
            })
            .await
    }

    /// Returns the category with its active stores.
    #[instrument(name = "service.category.get", skip_all, fields(category_id = %external_id))]
    pub async fn get_category(&self, external_id: Uuid) -> Result<Category> {
        let mut category = self
            .category_repo
            .get_by_external_id(None, external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("category {} not found", external_id)))?;

        self.category_repo.load_stores(None, &mut category).await?;
        Ok(category)
    }

    /// Lists active categories with their stores, loaded in one batch.
    #[instrument(name = "service.category.list", skip_all)]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.category_repo.list(None).await?;
        self.category_repo
            .load_stores_for_many(None, &mut categories)
            .await?;
        Ok(categories)
    }

    /// Soft-deletes a category. Its stores stay active unless `cascade_stores`
    /// is set, in which case they are deleted in the same transaction.
    #[instrument(name = "service.category.delete", skip_all, fields(category_id = %external_id, cascade_stores = cascade_stores))]
    pub async fn delete_category(&self, external_id: Uuid, cascade_stores: bool) -> Result<()> {
        let category_repo = self.category_repo.clone();
        let store_repo = self.store_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let category = category_repo
                        .get_by_external_id(Some(&mut *tx), external_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("category {} not found", external_id))
                        })?;

                    if cascade_stores {
                        let removed = store_repo
                            .delete_by_category_id(Some(&mut *tx), category.id)
                            .await?;
                        info!(stores = removed, "Cascaded store deletion");
                    }

                    if !category_repo.delete(Some(&mut *tx), external_id).await? {
                        return Err(AppError::NotFound(format!(
                            "category {} not found",
                            external_id
                        )));
                    }
                    Ok(())
                })
            })
            .await
    }
}
