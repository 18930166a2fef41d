use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::commands::{
    storable_money, CreateReceiptItemRequest, CreateReceiptRequest, ExtractedReceipt,
};
use crate::error::{AppError, Result};
use crate::models::{Receipt, ReceiptItem};
use crate::repositories::{ReceiptItemRepository, ReceiptRepository, UnitOfWork};

/// Receipt persistence for manual entry and extracted receipts alike.
#[derive(Clone)]
pub struct ReceiptService {
    uow: UnitOfWork,
    receipt_repo: ReceiptRepository,
    item_repo: ReceiptItemRepository,
}

impl ReceiptService {
    pub fn new(pool: PgPool) -> Self {
        let item_repo = ReceiptItemRepository::new(pool.clone());
        Self {
            uow: UnitOfWork::new(pool.clone()),
            receipt_repo: ReceiptRepository::new(pool, item_repo.clone()),
            item_repo,
        }
    }

    #[instrument(name = "service.receipt.create", skip_all)]
    pub async fn create_receipt(&self, request: CreateReceiptRequest) -> Result<Receipt> {
        request.validate()?;

        let total = request
            .total
            .unwrap_or_else(|| request.items.iter().map(|item| item.price).sum());
        self.persist(request.store_name, request.date, total, request.items)
            .await
    }

    /// Stores the output of a text-extraction client. The total is the sum of
    /// the extracted item prices.
    #[instrument(name = "service.receipt.import_extracted", skip_all)]
    pub async fn import_extracted(&self, extracted: ExtractedReceipt) -> Result<Receipt> {
        extracted.validate()?;

        let total = extracted.total();
        self.persist(extracted.store_name, extracted.date, total, extracted.items)
            .await
    }

    async fn persist(
        &self,
        store_name: String,
        date: DateTime<Utc>,
        total: Decimal,
        items: Vec<CreateReceiptItemRequest>,
    ) -> Result<Receipt> {
        storable_money(&total).map_err(|_| {
            AppError::InvalidInput(format!("receipt total {} cannot be stored", total))
        })?;

        let receipt_repo = self.receipt_repo.clone();
        let item_repo = self.item_repo.clone();

        let receipt = self
            .uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut receipt = receipt_repo
                        .insert(Some(&mut *tx), &Receipt::new(store_name.trim(), total, date))
                        .await?;

                    let lines: Vec<ReceiptItem> = items
                        .iter()
                        .map(|item| ReceiptItem::new(receipt.id, item.name.trim(), item.price))
                        .collect();
                    receipt.items = item_repo.insert_many(Some(&mut *tx), &lines).await?;
                    Ok(receipt)
                })
            })
            .await?;

        info!(
            receipt_id = %receipt.external_id,
            items = receipt.items.len(),
            total = %receipt.total,
            "Receipt stored"
        );
        Ok(receipt)
    }

    #[instrument(name = "service.receipt.get", skip_all, fields(receipt_id = %external_id))]
    pub async fn get_receipt(&self, external_id: Uuid) -> Result<Receipt> {
        let mut receipt = self
            .receipt_repo
            .get_by_external_id(None, external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("receipt {} not found", external_id)))?;

        self.receipt_repo.load_items(None, &mut receipt).await?;
        Ok(receipt)
    }

    #[instrument(name = "service.receipt.list", skip_all)]
    pub async fn list_receipts(&self) -> Result<Vec<Receipt>> {
        let mut receipts = self.receipt_repo.list(None).await?;
        self.receipt_repo
            .load_items_for_many(None, &mut receipts)
            .await?;
        Ok(receipts)
    }

    /// Soft-deletes a receipt together with its items.
    #[instrument(name = "service.receipt.delete", skip_all, fields(receipt_id = %external_id))]
    pub async fn delete_receipt(&self, external_id: Uuid) -> Result<()> {
        let receipt_repo = self.receipt_repo.clone();
        let item_repo = self.item_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let receipt = receipt_repo
                        .get_by_external_id(Some(&mut *tx), external_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("receipt {} not found", external_id))
                        })?;

                    item_repo
                        .delete_by_receipt_id(Some(&mut *tx), receipt.id)
                        .await?;
                    if !receipt_repo.delete(Some(&mut *tx), external_id).await? {
                        return Err(AppError::NotFound(format!(
                            "receipt {} not found",
                            external_id
                        )));
                    }
                    Ok(())
                })
            })
            .await
    }

    #[instrument(name = "service.receipt.delete_item", skip_all, fields(item_id = %external_id))]
    pub async fn delete_receipt_item(&self, external_id: Uuid) -> Result<()> {
        let item_repo = self.item_repo.clone();

        self.uow
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if !item_repo.delete(Some(&mut *tx), external_id).await? {
                        return Err(AppError::NotFound(format!(
                            "receipt item {} not found",
                            external_id
                        )));
                    }
                    Ok(())
                })
            })
            .await
    }
}
