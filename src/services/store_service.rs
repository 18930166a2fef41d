use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::commands::{CreateStoreRequest, UpdateStoreRequest};
use crate::error::{AppError, Result};
use crate::models::Store;
use crate::repositories::{CategoryRepository, StoreRepository, UnitOfWork};

/// Store operations outside of a category update.
#[derive(Clone)]
pub struct StoreService {
    uow: UnitOfWork,
    category_repo: CategoryRepository,
    store_repo: StoreRepository,
}

impl StoreService {
    pub fn new(pool: PgPool) -> Self {
        let store_repo = StoreRepository::new(pool.clone());
        Self {
            uow: UnitOfWork::new(pool.clone()),
            category_repo: CategoryRepository::new(pool, store_repo.clone()),
            store_repo,
        }
    }

    #[instrument(name = "service.store.create", skip_all, fields(category_id = %request.category_id))]
    pub async fn create_store(&self, request: CreateStoreRequest) -> Result<Store> {
        request.validate()?;

        let category_repo = self.category_repo.clone();
        let store_repo = self.store_repo.clone();

        let store = self
            .uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let category = category_repo
                        .get_by_external_id(Some(&mut *tx), request.category_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!(
                                "category {} not found",
                                request.category_id
                            ))
                        })?;

                    let name = request.name.trim();
                    if store_repo
                        .get_by_category_and_name(Some(&mut *tx), category.id, name)
                        .await?
                        .is_some()
                    {
                        return Err(AppError::Conflict(format!(
                            "store '{}' already exists in this category",
                            name
                        )));
                    }

                    store_repo
                        .insert(Some(&mut *tx), &Store::new(name, category.id))
                        .await
                })
            })
            .await?;

        info!(store_id = %store.external_id, "Store created");
        Ok(store)
    }

    #[instrument(name = "service.store.update", skip_all, fields(store_id = %external_id))]
    pub async fn update_store(&self, external_id: Uuid, request: UpdateStoreRequest) -> Result<Store> {
        request.validate()?;

        let store_repo = self.store_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut store = store_repo
                        .get_by_external_id(Some(&mut *tx), external_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("store {} not found", external_id)))?;

                    let name = request.name.trim();
                    if let Some(holder) = store_repo
                        .get_by_category_and_name(Some(&mut *tx), store.category_id, name)
                        .await?
                    {
                        if holder.id != store.id {
                            return Err(AppError::Conflict(format!(
                                "store '{}' already exists in this category",
                                name
                            )));
                        }
                    }

                    store.rename(name);
                    if !store_repo.update(Some(&mut *tx), &store).await? {
                        return Err(AppError::NotFound(format!("store {} not found", external_id)));
                    }
                    Ok(store)
                })
            })
            .await
    }

    #[instrument(name = "service.store.get", skip_all, fields(store_id = %external_id))]
    pub async fn get_store(&self, external_id: Uuid) -> Result<Store> {
        self.store_repo
            .get_by_external_id(None, external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("store {} not found", external_id)))
    }

    #[instrument(name = "service.store.list", skip_all)]
    pub async fn list_stores(&self) -> Result<Vec<Store>> {
        self.store_repo.list(None).await
    }

    /// Active stores of a category, NotFound when the category itself is gone.
    #[instrument(name = "service.store.list_for_category", skip_all, fields(category_id = %category_id))]
    pub async fn list_stores_for_category(&self, category_id: Uuid) -> Result<Vec<Store>> {
        let category = self
            .category_repo
            .get_by_external_id(None, category_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("category {} not found", category_id)))?;

        self.store_repo.get_by_category_id(None, category.id).await
    }

    #[instrument(name = "service.store.delete", skip_all, fields(store_id = %external_id))]
    pub async fn delete_store(&self, external_id: Uuid) -> Result<()> {
        let store_repo = self.store_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if !store_repo.delete(Some(&mut *tx), external_id).await? {
                        return Err(AppError::NotFound(format!("store {} not found", external_id)));
                    }
                    Ok(())
                })
            })
            .await
    }
}
