use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::commands::{CreateSpendingFromReceiptRequest, CreateSpendingRequest};
use crate::error::{AppError, Result};
use crate::models::SpendingRecord;
use crate::repositories::{
    CategoryRepository, ReceiptItemRepository, ReceiptRepository, SpendingRepository,
    StoreRepository, UnitOfWork,
};

/// Spending record operations.
#[derive(Clone)]
pub struct SpendingService {
    uow: UnitOfWork,
    category_repo: CategoryRepository,
    spending_repo: SpendingRepository,
    receipt_repo: ReceiptRepository,
}

impl SpendingService {
    pub fn new(pool: PgPool) -> Self {
        let category_repo =
            CategoryRepository::new(pool.clone(), StoreRepository::new(pool.clone()));
        Self {
            uow: UnitOfWork::new(pool.clone()),
            spending_repo: SpendingRepository::new(pool.clone(), category_repo.clone()),
            receipt_repo: ReceiptRepository::new(pool.clone(), ReceiptItemRepository::new(pool)),
            category_repo,
        }
    }

    /// Books a spending record against an existing category. The category
    /// lookup and the insert share one transaction.
    #[instrument(name = "service.spending.create", skip_all, fields(category_id = %request.category_id))]
    pub async fn create_spending(&self, request: CreateSpendingRequest) -> Result<SpendingRecord> {
        request.validate()?;

        let category_repo = self.category_repo.clone();
        let spending_repo = self.spending_repo.clone();

        let record = self
            .uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let category = category_repo
                        .get_by_external_id(Some(&mut *tx), request.category_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::InvalidReference(format!(
                                "category {} does not exist",
                                request.category_id
                            ))
                        })?;

                    let record = SpendingRecord::new(
                        request.amount,
                        request.remark.trim(),
                        request.spending_date,
                        category.id,
                    );
                    let mut created = spending_repo.insert(Some(&mut *tx), &record).await?;
                    created.category = Some(category);
                    Ok(created)
                })
            })
            .await?;

        info!(spending_id = %record.external_id, amount = %record.amount, "Spending recorded");
        Ok(record)
    }

    /// Converts a stored receipt into a spending record for its total.
    #[instrument(name = "service.spending.create_from_receipt", skip_all, fields(receipt_id = %request.receipt_id))]
    pub async fn create_spending_from_receipt(
        &self,
        request: CreateSpendingFromReceiptRequest,
    ) -> Result<SpendingRecord> {
        request.validate()?;

        let category_repo = self.category_repo.clone();
        let spending_repo = self.spending_repo.clone();
        let receipt_repo = self.receipt_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let receipt = receipt_repo
                        .get_by_external_id(Some(&mut *tx), request.receipt_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("receipt {} not found", request.receipt_id))
                        })?;

                    let category = category_repo
                        .get_by_external_id(Some(&mut *tx), request.category_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::InvalidReference(format!(
                                "category {} does not exist",
                                request.category_id
                            ))
                        })?;

                    if receipt.total <= Decimal::ZERO {
                        return Err(AppError::InvalidInput(
                            "receipt total must be greater than zero".to_string(),
                        ));
                    }

                    let remark = request
                        .remark
                        .as_deref()
                        .map(str::trim)
                        .filter(|remark| !remark.is_empty())
                        .unwrap_or(receipt.store_name.as_str());

                    let record =
                        SpendingRecord::new(receipt.total, remark, receipt.date, category.id);
                    let mut created = spending_repo.insert(Some(&mut *tx), &record).await?;
                    created.category = Some(category);
                    Ok(created)
                })
            })
            .await
    }

    #[instrument(name = "service.spending.get", skip_all, fields(spending_id = %external_id))]
    pub async fn get_spending(&self, external_id: Uuid) -> Result<SpendingRecord> {
        let mut record = self
            .spending_repo
            .get_by_external_id(None, external_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("spending record {} not found", external_id))
            })?;

        self.spending_repo.load_category(None, &mut record).await?;
        Ok(record)
    }

    /// Active records, most recent first, each with its category.
    #[instrument(name = "service.spending.list", skip_all)]
    pub async fn list_spending(&self) -> Result<Vec<SpendingRecord>> {
        let mut records = self.spending_repo.list(None).await?;
        self.spending_repo
            .load_categories(None, &mut records)
            .await?;
        Ok(records)
    }

    #[instrument(name = "service.spending.delete", skip_all, fields(spending_id = %external_id))]
    pub async fn delete_spending(&self, external_id: Uuid) -> Result<()> {
        let spending_repo = self.spending_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if !spending_repo.delete(Some(&mut *tx), external_id).await? {
                        return Err(AppError::NotFound(format!(
                            "spending record {} not found",
                            external_id
                        )));
                    }
                    Ok(())
                })
            })
            .await
    }
}
